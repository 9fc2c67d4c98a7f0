use crate::domain::entities::FrameSource;
use crate::domain::errors::Result;
use crate::domain::value_objects::CaptureSpec;

/// Port for capture/decode pipeline implementations
pub trait CaptureBackend: Send + Sync {
    /// Open the device or file and start producing frames.
    /// May block while the device initializes.
    fn open(&self, spec: &CaptureSpec) -> Result<FrameSource>;
}
