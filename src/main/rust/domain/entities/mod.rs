mod frame_source;
mod peer_session;

pub use frame_source::{FrameSource, Subscription};
pub use peer_session::PeerSession;
