mod capture_spec;
mod codec;
mod connection_state;
mod media_frame;
mod pool_config;
mod session_description;
mod snapshot_config;

pub use capture_spec::{CaptureBackendKind, CaptureSpec, Resolution, SourceKind};
pub use codec::{CodecCapability, CodecPreference, MediaKind};
pub use connection_state::ConnectionState;
pub use media_frame::{AudioFrame, VideoFrame};
pub use pool_config::PoolConfig;
pub use session_description::{SdpType, SessionDescription};
pub use snapshot_config::SnapshotConfig;
