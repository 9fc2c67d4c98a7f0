use std::sync::Arc;
use std::time::Duration;

use super::{FrameTap, SessionPool, SnapshotStore, SourceBroadcaster};
use crate::domain::entities::PeerSession;
use crate::domain::errors::Result;
use crate::domain::ports::{MetricsReporter, SnapshotEncoder, TransportEngine};
use crate::domain::value_objects::{
    CaptureSpec, CodecCapability, CodecPreference, MediaKind, SessionDescription,
};

/// Application service answering one offer per call (use case)
pub struct SignalingService {
    engine: Arc<dyn TransportEngine>,
    broadcaster: Arc<SourceBroadcaster>,
    pool: Arc<SessionPool>,
    snapshots: Arc<SnapshotStore>,
    encoder: Arc<dyn SnapshotEncoder>,
    metrics: Arc<dyn MetricsReporter>,
    capture: CaptureSpec,
    preferred_codec: Option<CodecPreference>,
    snapshot_interval: Duration,
}

impl SignalingService {
    pub fn new(
        engine: Arc<dyn TransportEngine>,
        broadcaster: Arc<SourceBroadcaster>,
        pool: Arc<SessionPool>,
        snapshots: Arc<SnapshotStore>,
        encoder: Arc<dyn SnapshotEncoder>,
        metrics: Arc<dyn MetricsReporter>,
        capture: CaptureSpec,
    ) -> Self {
        Self {
            engine,
            broadcaster,
            pool,
            snapshots,
            encoder,
            metrics,
            capture,
            preferred_codec: None,
            snapshot_interval: Duration::from_secs(1),
        }
    }

    pub fn with_preferred_codec(mut self, codec: Option<CodecPreference>) -> Self {
        self.preferred_codec = codec;
        self
    }

    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// Video codecs the outgoing transceiver is restricted to, if a
    /// preference is configured. Errors when nothing matches.
    pub fn preferred_video_codecs(&self) -> Result<Option<Vec<CodecCapability>>> {
        match &self.preferred_codec {
            Some(preference) => {
                let capabilities = self.engine.codec_capabilities(MediaKind::Video);
                preference.filter(&capabilities).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Negotiate a new session for `offer` and return the local answer.
    ///
    /// On failure the session is removed and closed before returning, so
    /// nothing stays registered for a request that errored.
    pub async fn handle_offer(&self, offer: SessionDescription) -> Result<SessionDescription> {
        offer.validate_offer()?;

        let transport = self.engine.create_peer().await.inspect_err(|_| {
            self.metrics.report_negotiation_failed();
        })?;
        let session = Arc::new(PeerSession::new(self.pool.next_sequence(), transport));
        self.pool.register(Arc::clone(&session));
        session
            .transport()
            .on_state_change(self.pool.listener_for(&session));

        match self.negotiate(&session, offer).await {
            Ok(answer) => {
                tracing::info!(session_id = %session.id(), "Answer created");
                Ok(answer)
            }
            Err(e) => {
                tracing::error!(session_id = %session.id(), "Negotiation failed: {}", e);
                self.metrics.report_negotiation_failed();
                self.pool.discard(&session).await;
                Err(e)
            }
        }
    }

    async fn negotiate(
        &self,
        session: &PeerSession,
        offer: SessionDescription,
    ) -> Result<SessionDescription> {
        let transport = session.transport();
        let codecs = self.preferred_video_codecs()?;
        let tracks = self.broadcaster.acquire(&self.capture).await?;

        let video = FrameTap::new(
            Box::new(tracks.video),
            Arc::clone(&self.snapshots),
            Arc::clone(&self.encoder),
            self.snapshot_interval,
        )
        .with_metrics(Arc::clone(&self.metrics));
        transport.add_video(Box::new(video), codecs).await?;

        transport.set_remote_description(offer).await?;

        if let Some(audio) = tracks.audio {
            if transport.remote_media_kinds().await.contains(&MediaKind::Audio) {
                transport.add_audio(Box::new(audio)).await?;
            }
        }

        let answer = transport.create_answer().await?;
        transport.set_local_description(answer).await
    }
}
