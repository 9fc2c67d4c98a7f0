use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    #[error("Path is not a file: {0}")]
    PathNotFile(PathBuf),

    #[error("Invalid port: port cannot be zero")]
    InvalidPort,

    #[error("Invalid resolution: {0} (expected WIDTHxHEIGHT)")]
    InvalidResolution(String),

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(u32),

    #[error("Invalid codec identifier: {0} (expected kind/name, e.g. video/H264)")]
    InvalidCodec(String),

    #[error("Max connections must be at least 1")]
    InvalidCapacity,

    #[error("Snapshot interval must be greater than zero")]
    InvalidInterval,

    #[error("Snapshot quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("Invalid offer: {0}")]
    InvalidOffer(String),

    #[error("No codec in the capability set matches preferred codec {0}")]
    NoMatchingCodec(String),

    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Capture source could not be opened: {0}")]
    CaptureOpenFailed(String),

    #[error("Snapshot encoding failed: {0}")]
    SnapshotEncodeFailed(String),

    #[error("Snapshot write failed: {0}")]
    SnapshotWriteFailed(String),

    #[error("No snapshot available yet")]
    SnapshotUnavailable,

    #[error("Session close failed: {0}")]
    SessionClose(String),
}

impl DomainError {
    /// True when the failure was caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidOffer(_))
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
