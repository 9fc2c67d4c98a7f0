pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-exports for convenience
pub use application::services::{
    FrameTap, MediaTracks, SessionPool, SignalingService, SnapshotStore, SourceBroadcaster,
};
pub use config::Config;
pub use domain::entities::{FrameSource, PeerSession, Subscription};
pub use domain::errors::{DomainError, Result};
pub use domain::ports::{
    CaptureBackend, FrameStream, MetricsReporter, PeerTransport, SnapshotEncoder, StateListener,
    TransportEngine,
};
pub use domain::value_objects::{
    AudioFrame, CaptureBackendKind, CaptureSpec, CodecCapability, CodecPreference,
    ConnectionState, MediaKind, PoolConfig, Resolution, SdpType, SessionDescription,
    SnapshotConfig, SourceKind, VideoFrame,
};
pub use infrastructure::gstreamer::{EncoderSettings, GStreamerCapture, PipelineBuilder};
pub use infrastructure::http::{routes, serve_http, HttpContext, TlsFiles};
pub use infrastructure::metrics::{metrics_routes, serve_metrics, PrometheusReporter};
pub use infrastructure::snapshot::JpegSnapshotEncoder;
pub use infrastructure::webrtc::{IceTimeouts, WebRtcEngine, WebRtcSettings};
