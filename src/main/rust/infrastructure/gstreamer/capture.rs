use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks};
use tokio::sync::broadcast;

use super::PipelineBuilder;
use crate::domain::entities::FrameSource;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::CaptureBackend;
use crate::domain::value_objects::{AudioFrame, CaptureSpec, SourceKind, VideoFrame};

/// Timeout for bus polling (100ms allows responsive shutdown)
const BUS_POLL_TIMEOUT_MS: u64 = 100;

/// How long `open` waits for the pipeline to reach PLAYING
const STATE_CHANGE_TIMEOUT_SECS: u64 = 5;

const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// Capture backend that decodes devices and files through GStreamer
/// and publishes raw frames from `appsink` elements.
pub struct GStreamerCapture {
    channel_capacity: usize,
}

impl Default for GStreamerCapture {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl GStreamerCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames buffered per subscription before a slow consumer starts skipping
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    fn create_pipeline(spec: &CaptureSpec) -> anyhow::Result<gstreamer::Pipeline> {
        let pipeline_str = PipelineBuilder::build_capture_string(spec);
        tracing::info!("Creating capture pipeline: {}", pipeline_str);

        let pipeline = gstreamer::parse::launch(&pipeline_str)
            .context("Failed to parse pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow::anyhow!("Failed to downcast to Pipeline"))?;

        Ok(pipeline)
    }

    fn app_sink(pipeline: &gstreamer::Pipeline, name: &str) -> Result<AppSink> {
        pipeline
            .by_name(name)
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| DomainError::CaptureOpenFailed(format!("missing appsink '{}'", name)))
    }
}

impl CaptureBackend for GStreamerCapture {
    fn open(&self, spec: &CaptureSpec) -> Result<FrameSource> {
        spec.validate()?;

        let pipeline = Self::create_pipeline(spec)
            .map_err(|e| DomainError::CaptureOpenFailed(format!("{:#}", e)))?;

        let (video_tx, _) = broadcast::channel(self.channel_capacity);
        attach_video_sink(&Self::app_sink(&pipeline, "video")?, video_tx.clone());

        let audio_tx = if spec.is_file() {
            let (audio_tx, _) = broadcast::channel(self.channel_capacity * 8);
            attach_audio_sink(&Self::app_sink(&pipeline, "audio")?, audio_tx.clone());
            Some(audio_tx)
        } else {
            None
        };

        let opened = pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| e.to_string())
            .and_then(|_| {
                pipeline
                    .state(gstreamer::ClockTime::from_seconds(STATE_CHANGE_TIMEOUT_SECS))
                    .0
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = opened {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(DomainError::CaptureOpenFailed(format!("{}: {}", spec, e)));
        }

        tracing::info!(source = %spec, "Capture pipeline playing");
        let looping = matches!(spec.source(), SourceKind::File { looping: true, .. });
        let handle = CapturePipeline::start(pipeline, looping)?;
        Ok(FrameSource::new(spec.clone(), video_tx, audio_tx, handle))
    }
}

fn attach_video_sink(sink: &AppSink, tx: broadcast::Sender<VideoFrame>) {
    sink.set_callbacks(
        AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                let structure = sample
                    .caps()
                    .and_then(|caps| caps.structure(0))
                    .ok_or(gstreamer::FlowError::NotNegotiated)?;
                let width = structure
                    .get::<i32>("width")
                    .map_err(|_| gstreamer::FlowError::NotNegotiated)? as u32;
                let height = structure
                    .get::<i32>("height")
                    .map_err(|_| gstreamer::FlowError::NotNegotiated)? as u32;

                let map = buffer.map_readable().map_err(|_| gstreamer::FlowError::Error)?;
                let data = pack_rgb_rows(map.as_slice(), width, height);
                let mut frame = VideoFrame::rgb(data, width, height, clock_to_duration(buffer.pts()));
                if let Some(duration) = buffer.duration() {
                    frame = frame.with_duration(Duration::from_nanos(duration.nseconds()));
                }

                // No subscribers is not an error
                let _ = tx.send(frame);
                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );
}

fn attach_audio_sink(sink: &AppSink, tx: broadcast::Sender<AudioFrame>) {
    sink.set_callbacks(
        AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                let structure = sample
                    .caps()
                    .and_then(|caps| caps.structure(0))
                    .ok_or(gstreamer::FlowError::NotNegotiated)?;
                let rate = structure
                    .get::<i32>("rate")
                    .map_err(|_| gstreamer::FlowError::NotNegotiated)? as u32;
                let channels = structure
                    .get::<i32>("channels")
                    .map_err(|_| gstreamer::FlowError::NotNegotiated)? as u16;

                let map = buffer.map_readable().map_err(|_| gstreamer::FlowError::Error)?;
                let frame = AudioFrame::s16le(
                    Bytes::copy_from_slice(map.as_slice()),
                    rate,
                    channels,
                    clock_to_duration(buffer.pts()),
                );
                let _ = tx.send(frame);
                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );
}

fn clock_to_duration(time: Option<gstreamer::ClockTime>) -> Duration {
    time.map(|t| Duration::from_nanos(t.nseconds()))
        .unwrap_or_default()
}

/// Copy an RGB buffer into a tightly packed one, dropping the row padding
/// GStreamer adds when `width * 3` is not a multiple of four.
pub(crate) fn pack_rgb_rows(data: &[u8], width: u32, height: u32) -> Bytes {
    let row = width as usize * 3;
    let rows = height as usize;
    if rows == 0 || data.len() == row * rows {
        return Bytes::copy_from_slice(data);
    }
    let stride = data.len() / rows;
    if stride < row {
        return Bytes::copy_from_slice(data);
    }
    let mut packed = Vec::with_capacity(row * rows);
    for chunk in data.chunks(stride).take(rows) {
        packed.extend_from_slice(&chunk[..row.min(chunk.len())]);
    }
    Bytes::from(packed)
}

/// Owns a playing pipeline and its bus watcher; stops both on drop.
struct CapturePipeline {
    pipeline: gstreamer::Pipeline,
    running: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    fn start(pipeline: gstreamer::Pipeline, looping: bool) -> Result<Self> {
        let bus = pipeline
            .bus()
            .ok_or_else(|| DomainError::CaptureOpenFailed("Failed to get bus".to_string()))?;
        let running = Arc::new(AtomicBool::new(true));

        let watcher = {
            let running = Arc::clone(&running);
            let pipeline = pipeline.clone();
            std::thread::Builder::new()
                .name("capture-bus".into())
                .spawn(move || {
                    let timeout = gstreamer::ClockTime::from_mseconds(BUS_POLL_TIMEOUT_MS);
                    while running.load(Ordering::SeqCst) {
                        if let Some(msg) = bus.timed_pop(timeout) {
                            Self::process_bus_message(&msg, &pipeline, looping);
                        }
                    }
                })
                .map_err(|e| DomainError::CaptureOpenFailed(e.to_string()))?
        };

        Ok(Self {
            pipeline,
            running,
            watcher: Some(watcher),
        })
    }

    fn process_bus_message(msg: &gstreamer::Message, pipeline: &gstreamer::Pipeline, looping: bool) {
        match msg.view() {
            gstreamer::MessageView::Eos(_) => {
                if looping {
                    tracing::debug!("End of file, restarting playback");
                    if let Err(e) = pipeline.seek_simple(
                        gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT,
                        gstreamer::ClockTime::ZERO,
                    ) {
                        tracing::warn!("Failed to loop playback: {}", e);
                    }
                } else {
                    tracing::info!("Playback finished");
                }
            }
            gstreamer::MessageView::Error(err) => {
                tracing::error!(
                    "Error from {:?}: {} ({:?})",
                    err.src().map(|s| s.path_string()),
                    err.error(),
                    err.debug()
                );
            }
            gstreamer::MessageView::Warning(warn) => {
                tracing::warn!(
                    "Warning from {:?}: {} ({:?})",
                    warn.src().map(|s| s.path_string()),
                    warn.error(),
                    warn.debug()
                );
            }
            gstreamer::MessageView::StateChanged(state_changed) => {
                if state_changed.src().map(|s| s == pipeline).unwrap_or(false) {
                    tracing::debug!(
                        "Capture pipeline state changed from {:?} to {:?}",
                        state_changed.old(),
                        state_changed.current()
                    );
                }
            }
            _ => {}
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        tracing::debug!("Capture pipeline stopped");
    }
}
