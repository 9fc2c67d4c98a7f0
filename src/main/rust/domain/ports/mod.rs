mod capture_backend;
mod metrics_reporter;
mod peer_transport;
mod snapshot_encoder;

pub use capture_backend::CaptureBackend;
pub use metrics_reporter::MetricsReporter;
pub use peer_transport::{FrameStream, ListenerFuture, PeerTransport, StateListener, TransportEngine};
pub use snapshot_encoder::SnapshotEncoder;
