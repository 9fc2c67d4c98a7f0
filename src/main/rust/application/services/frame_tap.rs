use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::Instant;

use super::SnapshotStore;
use crate::domain::ports::{FrameStream, MetricsReporter, SnapshotEncoder};
use crate::domain::value_objects::VideoFrame;

/// Wraps one video subscription and refreshes the shared snapshot as frames
/// pass through.
///
/// Every tap holds the same `SnapshotStore`, so the rate limit is global
/// across sessions. Snapshot failures are logged and never reach the caller.
pub struct FrameTap {
    upstream: Box<dyn FrameStream<VideoFrame>>,
    snapshots: Arc<SnapshotStore>,
    encoder: Arc<dyn SnapshotEncoder>,
    interval: Duration,
    metrics: Option<Arc<dyn MetricsReporter>>,
}

impl FrameTap {
    pub fn new(
        upstream: Box<dyn FrameStream<VideoFrame>>,
        snapshots: Arc<SnapshotStore>,
        encoder: Arc<dyn SnapshotEncoder>,
        interval: Duration,
    ) -> Self {
        Self {
            upstream,
            snapshots,
            encoder,
            interval,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsReporter>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Next upstream frame, forwarded unchanged
    pub async fn next(&mut self) -> Option<VideoFrame> {
        let frame = self.upstream.next_frame().await?;
        self.snapshot(&frame);
        Some(frame)
    }

    fn snapshot(&self, frame: &VideoFrame) {
        if !self.snapshots.is_due(Instant::now(), self.interval) {
            return;
        }

        let capture = || {
            self.snapshots
                .capture_if_due(Instant::now(), self.interval, || self.encoder.encode(frame))
        };
        // Encoding blocks; hand this worker's other tasks to another thread
        let result = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(capture)
            }
            _ => capture(),
        };

        match result {
            Ok(true) => {
                tracing::debug!(width = frame.width, height = frame.height, "Snapshot updated");
                if let Some(metrics) = &self.metrics {
                    metrics.report_snapshot_written();
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Snapshot failed: {}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.report_snapshot_failed();
                }
            }
        }
    }
}

#[async_trait]
impl FrameStream<VideoFrame> for FrameTap {
    async fn next_frame(&mut self) -> Option<VideoFrame> {
        self.next().await
    }
}
