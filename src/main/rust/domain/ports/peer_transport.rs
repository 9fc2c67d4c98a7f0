use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::Result;
use crate::domain::value_objects::{
    AudioFrame, CodecCapability, ConnectionState, MediaKind, SessionDescription, VideoFrame,
};

pub type ListenerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Single callback a transport invokes on every connection state transition
pub type StateListener = Arc<dyn Fn(ConnectionState) -> ListenerFuture + Send + Sync>;

/// Pull-based frame sequence handed to a transport
#[async_trait]
pub trait FrameStream<T>: Send {
    async fn next_frame(&mut self) -> Option<T>;
}

/// Port for one real-time peer connection.
///
/// Negotiation methods are called strictly in order by the signaling
/// service: tracks, remote description, answer, local description.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    fn on_state_change(&self, listener: StateListener);

    /// Attach outgoing video. When `codecs` is set, the video transceiver
    /// only offers those entries, in order.
    async fn add_video(
        &self,
        frames: Box<dyn FrameStream<VideoFrame>>,
        codecs: Option<Vec<CodecCapability>>,
    ) -> Result<()>;

    async fn add_audio(&self, frames: Box<dyn FrameStream<AudioFrame>>) -> Result<()>;

    async fn set_remote_description(&self, offer: SessionDescription) -> Result<()>;

    /// Media kinds the applied remote description asked for
    async fn remote_media_kinds(&self) -> Vec<MediaKind>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Apply the answer and return the final local description
    async fn set_local_description(&self, answer: SessionDescription)
        -> Result<SessionDescription>;

    async fn close(&self) -> Result<()>;
}

/// Port for the real-time media engine that creates peer connections
#[async_trait]
pub trait TransportEngine: Send + Sync {
    async fn create_peer(&self) -> Result<Arc<dyn PeerTransport>>;

    fn codec_capabilities(&self, kind: MediaKind) -> Vec<CodecCapability>;
}
