mod frame_tap;
mod session_pool;
mod signaling_service;
mod snapshot_store;
mod source_broadcaster;

#[cfg(test)]
pub(crate) mod test_support;

pub use frame_tap::FrameTap;
pub use session_pool::SessionPool;
pub use signaling_service::SignalingService;
pub use snapshot_store::SnapshotStore;
pub use source_broadcaster::{MediaTracks, SourceBroadcaster};
