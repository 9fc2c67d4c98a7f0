mod codecs;
mod engine;
mod peer;

pub use engine::{IceTimeouts, WebRtcEngine, WebRtcSettings};
pub use peer::WebRtcPeer;
