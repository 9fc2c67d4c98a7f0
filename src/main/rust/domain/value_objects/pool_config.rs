use crate::domain::errors::{DomainError, Result};

pub const DEFAULT_MAX_CONNECTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    max_connections: usize,
}

impl PoolConfig {
    pub fn new(max_connections: usize) -> Result<Self> {
        if max_connections == 0 {
            return Err(DomainError::InvalidCapacity);
        }
        Ok(Self { max_connections })
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}
