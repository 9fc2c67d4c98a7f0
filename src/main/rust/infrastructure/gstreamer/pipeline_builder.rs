use crate::domain::value_objects::{CaptureBackendKind, CaptureSpec, SourceKind};

use super::encoder::{EncoderKind, EncoderSettings};

/// Sample format produced by capture pipelines and expected by encoders
pub const AUDIO_RATE: u32 = 48_000;
pub const AUDIO_CHANNELS: u32 = 2;

pub struct PipelineBuilder;

impl PipelineBuilder {
    /// Convert a capture spec to a GStreamer launch string ending in
    /// `appsink name=video` (and `appsink name=audio` for files)
    pub fn build_capture_string(spec: &CaptureSpec) -> String {
        match spec.source() {
            SourceKind::Device { backend, device } => format!(
                "{} ! {}videoconvert ! video/x-raw,format=RGB ! \
                 appsink name=video max-buffers=2 drop=true sync=false",
                Self::source_for_backend(*backend, device),
                Self::normalize(spec),
            ),
            SourceKind::File { path, .. } => format!(
                "filesrc location=\"{}\" ! decodebin name=demux \
                 demux. ! queue ! {}videoconvert ! video/x-raw,format=RGB ! \
                 appsink name=video max-buffers=2 drop=true sync=true \
                 demux. ! queue ! audioconvert ! audioresample ! {} ! \
                 appsink name=audio max-buffers=8 drop=true sync=true async=false",
                path.display(),
                Self::normalize(spec),
                Self::audio_caps(AUDIO_RATE, AUDIO_CHANNELS),
            ),
        }
    }

    /// `appsrc name=src ! ... ! appsink name=sink` for one outgoing track
    pub fn build_encoder_string(kind: EncoderKind, caps: &str, settings: &EncoderSettings) -> String {
        format!(
            "appsrc name=src is-live=true format=time do-timestamp=true caps={} ! {} ! \
             appsink name=sink sync=false max-buffers=32 drop=true",
            caps,
            Self::encoder_for_kind(kind, settings),
        )
    }

    pub fn video_caps(width: u32, height: u32, fps: u32) -> String {
        format!(
            "video/x-raw,format=RGB,width={},height={},framerate={}/1",
            width, height, fps
        )
    }

    pub fn audio_caps(rate: u32, channels: u32) -> String {
        format!(
            "audio/x-raw,format=S16LE,layout=interleaved,rate={},channels={}",
            rate, channels
        )
    }

    fn source_for_backend(backend: CaptureBackendKind, device: &str) -> String {
        match backend {
            CaptureBackendKind::V4l2 => format!("v4l2src device={}", device),
            CaptureBackendKind::AvFoundation => format!("avfvideosrc device-index={}", device),
            CaptureBackendKind::DirectShow => format!("dshowvideosrc device-name=\"{}\"", device),
            CaptureBackendKind::Test => format!("videotestsrc is-live=true pattern={}", device),
        }
    }

    /// Scale and rate-convert to the configured mode; empty without transcoding
    fn normalize(spec: &CaptureSpec) -> String {
        if !spec.transcode() {
            return String::new();
        }
        let resolution = spec.resolution();
        format!(
            "videoconvert ! videoscale ! videorate ! video/x-raw,width={},height={},framerate={}/1 ! ",
            resolution.width,
            resolution.height,
            spec.fps()
        )
    }

    fn encoder_for_kind(kind: EncoderKind, settings: &EncoderSettings) -> String {
        let keyframe_interval = settings.fps.max(1) * 2;
        match kind {
            EncoderKind::Vp8 => format!(
                "videoconvert ! vp8enc deadline=1 cpu-used=8 target-bitrate={} \
                 keyframe-max-dist={} error-resilient=partitions",
                settings.video_bitrate_kbps * 1000,
                keyframe_interval
            ),
            EncoderKind::Vp9 => format!(
                "videoconvert ! vp9enc deadline=1 cpu-used=8 target-bitrate={} \
                 keyframe-max-dist={}",
                settings.video_bitrate_kbps * 1000,
                keyframe_interval
            ),
            EncoderKind::H264 => format!(
                "videoconvert ! video/x-raw,format=I420 ! \
                 x264enc tune=zerolatency speed-preset=ultrafast bitrate={} key-int-max={} ! \
                 video/x-h264,stream-format=byte-stream,profile=constrained-baseline",
                settings.video_bitrate_kbps, keyframe_interval
            ),
            EncoderKind::Opus => format!(
                "audioconvert ! audioresample ! opusenc bitrate={} frame-size=20",
                settings.audio_bitrate_bps
            ),
        }
    }
}
