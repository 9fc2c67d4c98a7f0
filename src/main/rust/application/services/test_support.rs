//! Fakes for the domain ports shared by the service tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use crate::domain::entities::FrameSource;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{
    CaptureBackend, FrameStream, MetricsReporter, PeerTransport, SnapshotEncoder, StateListener,
    TransportEngine,
};
use crate::domain::value_objects::{
    AudioFrame, CaptureSpec, CodecCapability, ConnectionState, MediaKind, SessionDescription,
    VideoFrame,
};

#[derive(Default)]
pub struct RecordingMetrics {
    registered: AtomicUsize,
    removed: AtomicUsize,
    evicted: AtomicUsize,
    failed: AtomicUsize,
    negotiation_failures: AtomicUsize,
    snapshots: AtomicUsize,
    snapshot_failures: AtomicUsize,
}

impl RecordingMetrics {
    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn evicted(&self) -> usize {
        self.evicted.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

impl MetricsReporter for RecordingMetrics {
    fn report_session_registered(&self) {
        self.registered.fetch_add(1, Ordering::SeqCst);
    }

    fn report_session_removed(&self) {
        self.removed.fetch_add(1, Ordering::SeqCst);
    }

    fn report_session_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::SeqCst);
    }

    fn report_session_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn report_negotiation_failed(&self) {
        self.negotiation_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn report_snapshot_written(&self) {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
    }

    fn report_snapshot_failed(&self) {
        self.snapshot_failures.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AddVideo,
    AddAudio,
    SetRemote,
    CreateAnswer,
    SetLocal,
}

#[derive(Default)]
pub struct FakeTransport {
    steps: Mutex<Vec<Step>>,
    closes: AtomicUsize,
    close_fails: AtomicBool,
    reject_remote: AtomicBool,
    audio_offered: AtomicBool,
    listener: Mutex<Option<StateListener>>,
    // Held while a listener runs and taken again by close, the way the
    // real engine guards its state handler
    callback_lock: tokio::sync::Mutex<()>,
    video_codecs: Mutex<Option<Vec<CodecCapability>>>,
    video: Mutex<Option<Box<dyn FrameStream<VideoFrame>>>>,
    audio: Mutex<Option<Box<dyn FrameStream<AudioFrame>>>>,
}

impl FakeTransport {
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn fail_close(&self) {
        self.close_fails.store(true, Ordering::SeqCst);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.steps.lock().unwrap().clone()
    }

    pub fn video_codecs(&self) -> Option<Vec<CodecCapability>> {
        self.video_codecs.lock().unwrap().clone()
    }

    pub fn has_video(&self) -> bool {
        self.video.lock().unwrap().is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.lock().unwrap().is_some()
    }

    /// Play the part of the engine reporting a state transition
    pub async fn emit(&self, state: ConnectionState) {
        let listener = self.listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            let _guard = self.callback_lock.lock().await;
            listener(state).await;
        }
    }

    fn step(&self, step: Step) {
        self.steps.lock().unwrap().push(step);
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    fn on_state_change(&self, listener: StateListener) {
        *self.listener.lock().unwrap() = Some(listener);
    }

    async fn add_video(
        &self,
        frames: Box<dyn FrameStream<VideoFrame>>,
        codecs: Option<Vec<CodecCapability>>,
    ) -> Result<()> {
        self.step(Step::AddVideo);
        *self.video.lock().unwrap() = Some(frames);
        *self.video_codecs.lock().unwrap() = codecs;
        Ok(())
    }

    async fn add_audio(&self, frames: Box<dyn FrameStream<AudioFrame>>) -> Result<()> {
        self.step(Step::AddAudio);
        *self.audio.lock().unwrap() = Some(frames);
        Ok(())
    }

    async fn set_remote_description(&self, _offer: SessionDescription) -> Result<()> {
        self.step(Step::SetRemote);
        if self.reject_remote.load(Ordering::SeqCst) {
            return Err(DomainError::Negotiation("remote description rejected".into()));
        }
        Ok(())
    }

    async fn remote_media_kinds(&self) -> Vec<MediaKind> {
        if self.audio_offered.load(Ordering::SeqCst) {
            vec![MediaKind::Video, MediaKind::Audio]
        } else {
            vec![MediaKind::Video]
        }
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.step(Step::CreateAnswer);
        Ok(SessionDescription::answer("answer-sdp"))
    }

    async fn set_local_description(
        &self,
        answer: SessionDescription,
    ) -> Result<SessionDescription> {
        self.step(Step::SetLocal);
        Ok(answer)
    }

    async fn close(&self) -> Result<()> {
        let _guard = self.callback_lock.lock().await;
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.close_fails.load(Ordering::SeqCst) {
            return Err(DomainError::SessionClose("transport already failed".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEngine {
    peers: Mutex<Vec<Arc<FakeTransport>>>,
    reject_next_remote: AtomicBool,
    audio_offered: AtomicBool,
}

impl FakeEngine {
    pub fn last_peer(&self) -> Arc<FakeTransport> {
        self.peers.lock().unwrap().last().cloned().expect("no peer created")
    }

    pub fn peers_created(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn fail_next_remote_description(&self) {
        self.reject_next_remote.store(true, Ordering::SeqCst);
    }

    pub fn offer_audio(&self, offered: bool) {
        self.audio_offered.store(offered, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportEngine for FakeEngine {
    async fn create_peer(&self) -> Result<Arc<dyn PeerTransport>> {
        let peer = Arc::new(FakeTransport::default());
        if self.reject_next_remote.swap(false, Ordering::SeqCst) {
            peer.reject_remote.store(true, Ordering::SeqCst);
        }
        peer.audio_offered
            .store(self.audio_offered.load(Ordering::SeqCst), Ordering::SeqCst);
        self.peers.lock().unwrap().push(peer.clone());
        Ok(peer)
    }

    fn codec_capabilities(&self, kind: MediaKind) -> Vec<CodecCapability> {
        let codec = |mime: &str, clock_rate, channels, pt| CodecCapability {
            mime_type: mime.to_string(),
            clock_rate,
            channels,
            sdp_fmtp_line: String::new(),
            payload_type: pt,
        };
        match kind {
            MediaKind::Video => vec![
                codec("video/VP8", 90_000, 0, 96),
                codec("video/H264", 90_000, 0, 102),
                codec("video/H264", 90_000, 0, 125),
            ],
            MediaKind::Audio => vec![codec("audio/opus", 48_000, 2, 111)],
        }
    }
}

#[derive(Default)]
pub struct FakeCapture {
    opens: AtomicUsize,
}

impl FakeCapture {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for FakeCapture {
    fn open(&self, spec: &CaptureSpec) -> Result<FrameSource> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (video, _) = broadcast::channel(4);
        let audio = spec.is_file().then(|| broadcast::channel(4).0);
        Ok(FrameSource::new(spec.clone(), video, audio, ()))
    }
}

pub struct FakeEncoder;

impl SnapshotEncoder for FakeEncoder {
    fn encode(&self, frame: &VideoFrame) -> Result<Bytes> {
        Ok(frame.data.clone())
    }

    fn content_type(&self) -> &'static str {
        "image/test"
    }
}
