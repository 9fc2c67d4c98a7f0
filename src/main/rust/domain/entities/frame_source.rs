use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::domain::ports::FrameStream;
use crate::domain::value_objects::{AudioFrame, CaptureSpec, VideoFrame};

/// An open capture pipeline with its audio and video branches.
///
/// Frames are fanned out through `tokio::sync::broadcast`, so every
/// subscription observes the same decoded frames without a second device
/// handle. The pipeline handle is released when the last `Arc` drops.
pub struct FrameSource {
    spec: CaptureSpec,
    video: broadcast::Sender<VideoFrame>,
    audio: Option<broadcast::Sender<AudioFrame>>,
    _pipeline: Box<dyn Any + Send + Sync>,
}

impl FrameSource {
    pub fn new(
        spec: CaptureSpec,
        video: broadcast::Sender<VideoFrame>,
        audio: Option<broadcast::Sender<AudioFrame>>,
        pipeline: impl Any + Send + Sync,
    ) -> Self {
        Self {
            spec,
            video,
            audio,
            _pipeline: Box::new(pipeline),
        }
    }

    pub fn spec(&self) -> &CaptureSpec {
        &self.spec
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Live subscriptions on the video branch
    pub fn video_subscribers(&self) -> usize {
        self.video.receiver_count()
    }

    pub fn subscribe_video(self: &Arc<Self>) -> Subscription<VideoFrame> {
        Subscription {
            rx: self.video.subscribe(),
            _source: Arc::clone(self),
        }
    }

    pub fn subscribe_audio(self: &Arc<Self>) -> Option<Subscription<AudioFrame>> {
        self.audio.as_ref().map(|tx| Subscription {
            rx: tx.subscribe(),
            _source: Arc::clone(self),
        })
    }
}

/// Independent consumer handle over one branch of a `FrameSource`.
///
/// Holds the source alive; a slow consumer skips frames instead of
/// stalling the other subscriptions.
pub struct Subscription<T> {
    rx: broadcast::Receiver<T>,
    _source: Arc<FrameSource>,
}

impl<T: Clone + Send> Subscription<T> {
    /// Wait for the next frame; `None` once the source is gone
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Subscription lagging, skipped frames");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
impl<T: Clone + Send + 'static> FrameStream<T> for Subscription<T> {
    async fn next_frame(&mut self) -> Option<T> {
        self.recv().await
    }
}
