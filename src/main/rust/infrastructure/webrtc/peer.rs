use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use webrtc::media::Sample;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use super::codecs;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{FrameStream, ListenerFuture, PeerTransport, StateListener};
use crate::domain::value_objects::{
    AudioFrame, CodecCapability, ConnectionState, MediaKind, SdpType, SessionDescription,
    VideoFrame,
};
use crate::infrastructure::gstreamer::{EncodedSample, EncoderKind, EncoderSettings, SampleEncoder};

const STREAM_ID: &str = "pipeline-webrtc";
const ENCODED_QUEUE: usize = 32;

/// One browser connection: a webrtc-rs peer plus the tasks that encode
/// and write its outgoing tracks.
pub struct WebRtcPeer {
    connection: Arc<RTCPeerConnection>,
    encoder: EncoderSettings,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WebRtcPeer {
    pub fn new(connection: Arc<RTCPeerConnection>, encoder: EncoderSettings) -> Self {
        Self {
            connection,
            encoder,
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    /// Add a sample track and start draining RTCP for its sender
    async fn attach_track(
        &self,
        kind: MediaKind,
        capability: RTCRtpCodecCapability,
    ) -> Result<(Arc<TrackLocalStaticSample>, Arc<RTCRtpSender>)> {
        let track = Arc::new(TrackLocalStaticSample::new(
            capability,
            kind.as_str().to_owned(),
            STREAM_ID.to_owned(),
        ));
        let sender = self
            .connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| DomainError::Negotiation(format!("add {} track: {}", kind.as_str(), e)))?;

        let rtcp = Arc::clone(&sender);
        self.spawn(async move {
            let mut buf = vec![0u8; 1500];
            while rtcp.read(&mut buf).await.is_ok() {}
        });
        Ok((track, sender))
    }

    async fn restrict_codecs(
        &self,
        sender: &Arc<RTCRtpSender>,
        capabilities: &[CodecCapability],
    ) -> Result<()> {
        let parameters = codecs::to_parameters(MediaKind::Video, capabilities);
        for transceiver in self.connection.get_transceivers().await {
            if Arc::ptr_eq(&transceiver.sender().await, sender) {
                transceiver
                    .set_codec_preferences(parameters.clone())
                    .await
                    .map_err(|e| DomainError::Negotiation(format!("codec preferences: {}", e)))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PeerTransport for WebRtcPeer {
    /// The listener runs on its own task, in the order states arrive.
    /// webrtc-rs holds its handler lock while a handler future runs and
    /// `close` takes that lock, so the listener must be free to close.
    fn on_state_change(&self, listener: StateListener) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(state) = rx.recv().await {
                listener(state).await;
            }
        });
        self.connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| -> ListenerFuture {
                if let Some(state) = map_state(state) {
                    let _ = tx.send(state);
                }
                Box::pin(async {})
            },
        ));
    }

    async fn add_video(
        &self,
        frames: Box<dyn FrameStream<VideoFrame>>,
        codecs: Option<Vec<CodecCapability>>,
    ) -> Result<()> {
        let preferred = codecs.as_ref().and_then(|c| c.first());
        let capability = match preferred {
            Some(codec) => codecs::capability_for(MediaKind::Video, codec),
            None => codecs::default_capability(MediaKind::Video),
        }
        .ok_or_else(|| DomainError::NoMatchingCodec("video".to_string()))?;
        let kind = EncoderKind::from_mime(&capability.mime_type)
            .ok_or_else(|| DomainError::NoMatchingCodec(capability.mime_type.clone()))?;

        let (track, sender) = self.attach_track(MediaKind::Video, capability).await?;
        if let Some(codecs) = codecs.as_deref() {
            self.restrict_codecs(&sender, codecs).await?;
        }

        let (tx, rx) = mpsc::channel(ENCODED_QUEUE);
        self.spawn(write_samples(track, rx));
        self.spawn(encode_video(frames, kind, self.encoder.clone(), tx));
        Ok(())
    }

    async fn add_audio(&self, frames: Box<dyn FrameStream<AudioFrame>>) -> Result<()> {
        let capability = codecs::default_capability(MediaKind::Audio)
            .ok_or_else(|| DomainError::NoMatchingCodec("audio".to_string()))?;
        let (track, _) = self.attach_track(MediaKind::Audio, capability).await?;

        let (tx, rx) = mpsc::channel(ENCODED_QUEUE);
        self.spawn(write_samples(track, rx));
        self.spawn(encode_audio(frames, self.encoder.clone(), tx));
        Ok(())
    }

    async fn set_remote_description(&self, offer: SessionDescription) -> Result<()> {
        let description = RTCSessionDescription::offer(offer.sdp)
            .map_err(|e| DomainError::InvalidOffer(e.to_string()))?;
        self.connection
            .set_remote_description(description)
            .await
            .map_err(|e| DomainError::Negotiation(format!("remote description: {}", e)))
    }

    async fn remote_media_kinds(&self) -> Vec<MediaKind> {
        self.connection
            .remote_description()
            .await
            .map(|d| media_kinds(&d.sdp))
            .unwrap_or_default()
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .connection
            .create_answer(None)
            .await
            .map_err(|e| DomainError::Negotiation(format!("create answer: {}", e)))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, answer: SessionDescription) -> Result<SessionDescription> {
        let description = RTCSessionDescription::answer(answer.sdp)
            .map_err(|e| DomainError::Negotiation(format!("answer: {}", e)))?;

        // Candidates are returned inline, so wait for gathering to finish
        let mut gathered = self.connection.gathering_complete_promise().await;
        self.connection
            .set_local_description(description)
            .await
            .map_err(|e| DomainError::Negotiation(format!("local description: {}", e)))?;
        let _ = gathered.recv().await;

        let local = self
            .connection
            .local_description()
            .await
            .ok_or_else(|| DomainError::Negotiation("no local description".to_string()))?;
        Ok(SessionDescription {
            kind: map_sdp_type(local.sdp_type),
            sdp: local.sdp,
        })
    }

    async fn close(&self) -> Result<()> {
        for task in self.tasks.lock().unwrap_or_else(|e| e.into_inner()).drain(..) {
            task.abort();
        }
        self.connection
            .close()
            .await
            .map_err(|e| DomainError::SessionClose(e.to_string()))
    }
}

async fn write_samples(track: Arc<TrackLocalStaticSample>, mut samples: mpsc::Receiver<EncodedSample>) {
    while let Some(sample) = samples.recv().await {
        let sample = Sample {
            data: sample.data,
            duration: sample.duration,
            ..Default::default()
        };
        if let Err(e) = track.write_sample(&sample).await {
            tracing::debug!("Track write failed: {}", e);
        }
    }
}

async fn encode_video(
    mut frames: Box<dyn FrameStream<VideoFrame>>,
    kind: EncoderKind,
    settings: EncoderSettings,
    output: mpsc::Sender<EncodedSample>,
) {
    let mut current: Option<(SampleEncoder, u32, u32)> = None;
    while let Some(frame) = frames.next_frame().await {
        let geometry_changed = current
            .as_ref()
            .map_or(true, |(_, w, h)| *w != frame.width || *h != frame.height);
        if geometry_changed {
            match SampleEncoder::video(kind, frame.width, frame.height, &settings, output.clone()) {
                Ok(encoder) => current = Some((encoder, frame.width, frame.height)),
                Err(e) => {
                    tracing::warn!("Video encoder unavailable: {}", e);
                    return;
                }
            }
        }
        if let Some((encoder, _, _)) = current.as_ref() {
            if let Err(e) = encoder.push(frame.data) {
                tracing::warn!("Stopping video track: {}", e);
                return;
            }
        }
    }
    tracing::debug!("Video source ended");
}

async fn encode_audio(
    mut frames: Box<dyn FrameStream<AudioFrame>>,
    settings: EncoderSettings,
    output: mpsc::Sender<EncodedSample>,
) {
    let encoder = match SampleEncoder::audio(&settings, output) {
        Ok(encoder) => encoder,
        Err(e) => {
            tracing::warn!("Audio encoder unavailable: {}", e);
            return;
        }
    };
    while let Some(frame) = frames.next_frame().await {
        if let Err(e) = encoder.push(frame.data) {
            tracing::warn!("Stopping audio track: {}", e);
            return;
        }
    }
    tracing::debug!("Audio source ended");
}

fn map_state(state: RTCPeerConnectionState) -> Option<ConnectionState> {
    match state {
        RTCPeerConnectionState::Unspecified => None,
        RTCPeerConnectionState::New => Some(ConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
    }
}

fn map_sdp_type(kind: RTCSdpType) -> SdpType {
    match kind {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        RTCSdpType::Answer | RTCSdpType::Unspecified => SdpType::Answer,
    }
}

/// Media kinds named by the `m=` lines of an SDP body
fn media_kinds(sdp: &str) -> Vec<MediaKind> {
    let mut kinds = Vec::new();
    for line in sdp.lines() {
        let kind = match line.strip_prefix("m=").and_then(|m| m.split(' ').next()) {
            Some("audio") => MediaKind::Audio,
            Some("video") => MediaKind::Video,
            _ => continue,
        };
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mapping() {
        assert_eq!(map_state(RTCPeerConnectionState::Unspecified), None);
        assert_eq!(
            map_state(RTCPeerConnectionState::Connected),
            Some(ConnectionState::Connected)
        );
        assert_eq!(
            map_state(RTCPeerConnectionState::Failed),
            Some(ConnectionState::Failed)
        );
    }

    #[test]
    fn test_media_kinds_from_sdp() {
        let sdp = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\n\
                   m=video 9 UDP/TLS/RTP/SAVPF 96\r\na=recvonly\r\n\
                   m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=recvonly\r\n\
                   m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n";
        assert_eq!(media_kinds(sdp), vec![MediaKind::Video, MediaKind::Audio]);
    }

    #[test]
    fn test_video_only_offer() {
        let sdp = "v=0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\n";
        assert_eq!(media_kinds(sdp), vec![MediaKind::Video]);
    }

    #[test]
    fn test_sdp_type_mapping() {
        assert_eq!(map_sdp_type(RTCSdpType::Answer), SdpType::Answer);
        assert_eq!(map_sdp_type(RTCSdpType::Offer), SdpType::Offer);
    }
}
