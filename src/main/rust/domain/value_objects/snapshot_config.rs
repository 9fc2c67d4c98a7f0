use std::path::PathBuf;
use std::time::Duration;

use crate::domain::errors::{DomainError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotConfig {
    interval: Duration,
    quality: u8,
    mirror_path: Option<PathBuf>,
}

impl SnapshotConfig {
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(DomainError::InvalidInterval);
        }
        Ok(Self {
            interval,
            quality: 85,
            mirror_path: None,
        })
    }

    pub fn with_quality(mut self, quality: u8) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(DomainError::InvalidQuality(quality));
        }
        self.quality = quality;
        Ok(self)
    }

    /// Also persist each snapshot to this file
    pub fn with_mirror_path(mut self, path: Option<PathBuf>) -> Self {
        self.mirror_path = path;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn mirror_path(&self) -> Option<&PathBuf> {
        self.mirror_path.as_ref()
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            quality: 85,
            mirror_path: None,
        }
    }
}
