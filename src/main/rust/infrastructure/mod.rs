pub mod gstreamer;
pub mod http;
pub mod metrics;
pub mod snapshot;
pub mod webrtc;
