use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::entities::{FrameSource, Subscription};
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::CaptureBackend;
use crate::domain::value_objects::{AudioFrame, CaptureSpec, VideoFrame};

/// Media handed to one session
pub struct MediaTracks {
    pub audio: Option<Subscription<AudioFrame>>,
    pub video: Subscription<VideoFrame>,
}

/// Owns the capture pipelines and hands out subscriptions over them.
///
/// Device sources are opened once per distinct `CaptureSpec` and shared by
/// every session; file sources are opened fresh for each caller.
pub struct SourceBroadcaster {
    backend: Arc<dyn CaptureBackend>,
    shared: Mutex<HashMap<CaptureSpec, Arc<FrameSource>>>,
}

impl SourceBroadcaster {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            shared: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, spec: &CaptureSpec) -> Result<MediaTracks> {
        if spec.is_file() {
            let source = Arc::new(self.open(spec).await?);
            tracing::info!(source = %spec, "Opened per-session file source");
            return Ok(MediaTracks {
                audio: source.subscribe_audio(),
                video: source.subscribe_video(),
            });
        }

        let source = self.shared_source(spec).await?;
        Ok(MediaTracks {
            audio: None,
            video: source.subscribe_video(),
        })
    }

    /// Open the shared device source ahead of the first session so a
    /// missing device fails at startup. File specs are left alone.
    pub async fn prime(&self, spec: &CaptureSpec) -> Result<()> {
        if !spec.is_file() {
            self.shared_source(spec).await?;
        }
        Ok(())
    }

    /// Drop the shared source for `spec`; the next acquire reopens it.
    /// Existing subscriptions keep the old pipeline alive until they end.
    pub async fn reset(&self, spec: &CaptureSpec) -> bool {
        let Some(source) = self.shared.lock().await.remove(spec) else {
            return false;
        };
        tracing::info!(
            source = %source.spec(),
            subscribers = source.video_subscribers(),
            "Released shared capture source"
        );
        true
    }

    pub async fn shared_sources(&self) -> usize {
        self.shared.lock().await.len()
    }

    async fn shared_source(&self, spec: &CaptureSpec) -> Result<Arc<FrameSource>> {
        // Held across the open so concurrent first use creates one pipeline
        let mut shared = self.shared.lock().await;
        if let Some(source) = shared.get(spec) {
            return Ok(Arc::clone(source));
        }

        let source = Arc::new(self.open(spec).await?);
        tracing::info!(source = %spec, "Opened shared capture source");
        shared.insert(spec.clone(), Arc::clone(&source));
        Ok(source)
    }

    async fn open(&self, spec: &CaptureSpec) -> Result<FrameSource> {
        let backend = Arc::clone(&self.backend);
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || backend.open(&spec))
            .await
            .map_err(|e| DomainError::CaptureOpenFailed(e.to_string()))?
    }
}
