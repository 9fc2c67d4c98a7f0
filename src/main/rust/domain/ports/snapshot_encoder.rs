use bytes::Bytes;

use crate::domain::errors::Result;
use crate::domain::value_objects::VideoFrame;

/// Port for still-image encoders
pub trait SnapshotEncoder: Send + Sync {
    fn encode(&self, frame: &VideoFrame) -> Result<Bytes>;

    /// HTTP content type of the encoded bytes
    fn content_type(&self) -> &'static str;
}
