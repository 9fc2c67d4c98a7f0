use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks, AppSrc};
use tokio::sync::mpsc;

use super::pipeline_builder::{PipelineBuilder, AUDIO_CHANNELS, AUDIO_RATE};
use crate::domain::errors::{DomainError, Result};

const OPUS_FRAME: Duration = Duration::from_millis(20);

/// Encoder element chain selected from a negotiated codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    Vp8,
    Vp9,
    H264,
    Opus,
}

impl EncoderKind {
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type.to_ascii_lowercase().as_str() {
            "video/vp8" => Some(Self::Vp8),
            "video/vp9" => Some(Self::Vp9),
            "video/h264" => Some(Self::H264),
            "audio/opus" => Some(Self::Opus),
            _ => None,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Opus)
    }
}

#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub fps: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_bps: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            video_bitrate_kbps: 2000,
            audio_bitrate_bps: 64_000,
        }
    }
}

/// One encoded access unit ready for an outgoing track
#[derive(Debug, Clone)]
pub struct EncodedSample {
    pub data: Bytes,
    pub duration: Duration,
}

/// `appsrc ! encoder ! appsink` pipeline owned by a single track.
///
/// Raw frames go in through [`SampleEncoder::push`]; encoded samples come
/// out of the channel handed to the constructor. The pipeline is stopped
/// on drop.
pub struct SampleEncoder {
    pipeline: gstreamer::Pipeline,
    src: AppSrc,
    kind: EncoderKind,
}

impl SampleEncoder {
    pub fn video(
        kind: EncoderKind,
        width: u32,
        height: u32,
        settings: &EncoderSettings,
        output: mpsc::Sender<EncodedSample>,
    ) -> Result<Self> {
        let caps = PipelineBuilder::video_caps(width, height, settings.fps.max(1));
        let frame = Duration::from_secs_f64(1.0 / settings.fps.max(1) as f64);
        Self::launch(kind, &caps, settings, frame, output)
    }

    pub fn audio(settings: &EncoderSettings, output: mpsc::Sender<EncodedSample>) -> Result<Self> {
        let caps = PipelineBuilder::audio_caps(AUDIO_RATE, AUDIO_CHANNELS);
        Self::launch(EncoderKind::Opus, &caps, settings, OPUS_FRAME, output)
    }

    fn launch(
        kind: EncoderKind,
        caps: &str,
        settings: &EncoderSettings,
        fallback_duration: Duration,
        output: mpsc::Sender<EncodedSample>,
    ) -> Result<Self> {
        let pipeline = Self::create_pipeline(kind, caps, settings)
            .map_err(|e| DomainError::Negotiation(format!("encoder: {:#}", e)))?;

        let src = pipeline
            .by_name("src")
            .and_then(|e| e.downcast::<AppSrc>().ok())
            .ok_or_else(|| DomainError::Negotiation("encoder: missing appsrc".to_string()))?;
        let sink = pipeline
            .by_name("sink")
            .and_then(|e| e.downcast::<AppSink>().ok())
            .ok_or_else(|| DomainError::Negotiation("encoder: missing appsink".to_string()))?;

        sink.set_callbacks(
            AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gstreamer::FlowError::Error)?;
                    let duration = buffer
                        .duration()
                        .map(|d| Duration::from_nanos(d.nseconds()))
                        .unwrap_or(fallback_duration);
                    let encoded = EncodedSample {
                        data: Bytes::copy_from_slice(map.as_slice()),
                        duration,
                    };
                    match output.try_send(encoded) {
                        Ok(()) => Ok(gstreamer::FlowSuccess::Ok),
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            tracing::debug!("Track writer behind, dropping encoded sample");
                            Ok(gstreamer::FlowSuccess::Ok)
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => Err(gstreamer::FlowError::Eos),
                    }
                })
                .build(),
        );

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| DomainError::Negotiation(format!("encoder: {}", e)))?;

        tracing::debug!(?kind, "Encoder pipeline playing");
        Ok(Self {
            pipeline,
            src,
            kind,
        })
    }

    fn create_pipeline(
        kind: EncoderKind,
        caps: &str,
        settings: &EncoderSettings,
    ) -> anyhow::Result<gstreamer::Pipeline> {
        let pipeline_str = PipelineBuilder::build_encoder_string(kind, caps, settings);
        tracing::debug!("Creating encoder pipeline: {}", pipeline_str);

        gstreamer::parse::launch(&pipeline_str)
            .context("Failed to parse pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow::anyhow!("Failed to downcast to Pipeline"))
    }

    pub fn kind(&self) -> EncoderKind {
        self.kind
    }

    /// Feed one raw frame; timestamps are assigned on arrival
    pub fn push(&self, data: Bytes) -> Result<()> {
        self.src
            .push_buffer(gstreamer::Buffer::from_slice(data))
            .map(|_| ())
            .map_err(|e| DomainError::Negotiation(format!("encoder rejected frame: {:?}", e)))
    }
}

impl Drop for SampleEncoder {
    fn drop(&mut self) {
        let _ = self.src.end_of_stream();
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}
