use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use pipeline_webrtc::{
    CaptureBackend, CaptureBackendKind, CaptureSpec, CodecPreference, Config, FrameSource,
    GStreamerCapture, IceTimeouts, JpegSnapshotEncoder, PipelineBuilder, PoolConfig,
    PrometheusReporter, Resolution, SdpType, SessionDescription, SessionPool, SignalingService, SnapshotEncoder,
    SnapshotStore, SourceBroadcaster, VideoFrame, WebRtcEngine, WebRtcSettings,
};
use tokio::sync::broadcast;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

fn test_source_spec() -> CaptureSpec {
    CaptureSpec::device(CaptureBackendKind::Test, "smpte")
        .with_resolution(Resolution::new(320, 240).unwrap())
        .with_fps(15)
}

/// Capture backend producing a still frame channel without GStreamer
struct StaticCapture;

impl CaptureBackend for StaticCapture {
    fn open(&self, spec: &CaptureSpec) -> pipeline_webrtc::Result<FrameSource> {
        let (video, _) = broadcast::channel(4);
        Ok(FrameSource::new(spec.clone(), video, None, ()))
    }
}

const ICE_TIMEOUTS: IceTimeouts = IceTimeouts {
    disconnected: Duration::from_millis(1000),
    failed: Duration::from_millis(2000),
    keep_alive: Duration::from_millis(250),
};

fn signaling(preferred: Option<&str>) -> (SignalingService, Arc<SessionPool>) {
    signaling_with(preferred, 2)
}

fn signaling_with(preferred: Option<&str>, max: usize) -> (SignalingService, Arc<SessionPool>) {
    let metrics = Arc::new(PrometheusReporter::new());
    let engine = WebRtcEngine::new(WebRtcSettings {
        ice_servers: vec![],
        ice_timeouts: Some(ICE_TIMEOUTS),
        ..Default::default()
    })
    .unwrap();
    let pool = Arc::new(SessionPool::new(PoolConfig::new(max).unwrap(), metrics.clone()));
    let service = SignalingService::new(
        Arc::new(engine),
        Arc::new(SourceBroadcaster::new(Arc::new(StaticCapture))),
        Arc::clone(&pool),
        Arc::new(SnapshotStore::new()),
        Arc::new(JpegSnapshotEncoder::default()),
        metrics,
        test_source_spec(),
    )
    .with_preferred_codec(preferred.map(|m| CodecPreference::new(m).unwrap()));
    (service, pool)
}

/// A receive-only viewer, as a browser would create it
async fn viewer_offer() -> (RTCPeerConnection, SessionDescription) {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs().unwrap();
    let mut setting_engine = SettingEngine::default();
    setting_engine.set_ice_timeouts(
        Some(ICE_TIMEOUTS.disconnected),
        Some(ICE_TIMEOUTS.failed),
        Some(ICE_TIMEOUTS.keep_alive),
    );
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_setting_engine(setting_engine)
        .build();
    let viewer = api
        .new_peer_connection(RTCConfiguration::default())
        .await
        .unwrap();
    viewer
        .add_transceiver_from_kind(
            RTPCodecType::Video,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await
        .unwrap();

    let offer = viewer.create_offer(None).await.unwrap();
    let mut gathered = viewer.gathering_complete_promise().await;
    viewer.set_local_description(offer).await.unwrap();
    let _ = gathered.recv().await;
    let local = viewer.local_description().await.unwrap();
    (viewer, SessionDescription::offer(local.sdp))
}

/// Offer, apply the answer, and wait for the viewer to connect
async fn connect_viewer(service: &SignalingService) -> RTCPeerConnection {
    let (viewer, offer) = viewer_offer().await;
    let answer = service.handle_offer(offer).await.unwrap();
    viewer
        .set_remote_description(RTCSessionDescription::answer(answer.sdp).unwrap())
        .await
        .unwrap();

    let connected = wait_until(Duration::from_secs(10), || {
        viewer.connection_state() == RTCPeerConnectionState::Connected
    })
    .await;
    assert!(connected, "viewer never connected: {}", viewer.connection_state());
    viewer
}

async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

#[test]
fn test_gstreamer_init() {
    assert!(gstreamer::init().is_ok());
}

#[test]
fn test_build_capture_string() {
    let launch = PipelineBuilder::build_capture_string(&test_source_spec());

    assert!(launch.starts_with("videotestsrc is-live=true pattern=smpte"));
    assert!(launch.contains("video/x-raw,width=320,height=240,framerate=15/1"));
    assert!(launch.contains("video/x-raw,format=RGB"));
    assert!(launch.contains("appsink name=video"));
}

#[test]
fn test_pipeline_parsing() {
    gstreamer::init().unwrap();
    let launch = PipelineBuilder::build_capture_string(&test_source_spec());
    let result = gstreamer::parse::launch(&launch);

    assert!(
        result.is_ok(),
        "Pipeline should parse successfully: {:?}",
        result.err()
    );
}

#[tokio::test]
async fn test_test_source_delivers_rgb_frames() {
    gstreamer::init().unwrap();
    let source = match GStreamerCapture::new().open(&test_source_spec()) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            // Missing plugins in minimal environments
            eprintln!("Skipping test: capture pipeline unavailable: {}", e);
            return;
        }
    };

    assert_eq!(source.spec(), &test_source_spec());
    assert!(!source.has_audio());

    let mut frames = source.subscribe_video();
    let frame = tokio::time::timeout(Duration::from_secs(5), frames.recv())
        .await
        .expect("frame within timeout")
        .expect("source still open");

    assert_eq!((frame.width, frame.height), (320, 240));
    assert_eq!(frame.data.len(), frame.expected_len());

    let jpeg = JpegSnapshotEncoder::new(70).encode(&frame).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_offer_is_answered_with_video() {
    let (service, pool) = signaling(None);
    let (viewer, offer) = viewer_offer().await;

    let answer = service.handle_offer(offer).await.unwrap();
    assert_eq!(answer.kind, SdpType::Answer);
    assert!(answer.sdp.contains("m=video"));
    assert!(answer.sdp.contains("VP8"));
    assert_eq!(pool.len(), 1);

    viewer
        .set_remote_description(RTCSessionDescription::answer(answer.sdp).unwrap())
        .await
        .unwrap();

    pool.close_all().await;
    assert!(pool.is_empty());
    viewer.close().await.unwrap();
}

#[tokio::test]
async fn test_preferred_codec_restricts_answer() {
    let (service, pool) = signaling(Some("video/H264"));
    let (viewer, offer) = viewer_offer().await;

    let answer = service.handle_offer(offer).await.unwrap();
    assert!(answer.sdp.contains("H264"));
    assert!(!answer.sdp.contains("VP8"));

    pool.close_all().await;
    viewer.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_preferred_codec_fails_without_session() {
    let (service, pool) = signaling(Some("video/AV1"));
    assert!(service.preferred_video_codecs().is_err());

    let (viewer, offer) = viewer_offer().await;
    assert!(service.handle_offer(offer).await.is_err());
    assert!(pool.is_empty());
    viewer.close().await.unwrap();
}

#[tokio::test]
async fn test_answer_type_offer_is_rejected() {
    let (service, pool) = signaling(None);
    let err = service
        .handle_offer(SessionDescription::answer("v=0\r\n"))
        .await
        .unwrap_err();
    assert!(err.is_client_error());
    assert!(pool.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_departed_viewer_is_removed_from_pool() {
    let (service, pool) = signaling_with(None, 2);
    let viewer = connect_viewer(&service).await;
    assert_eq!(pool.len(), 1);

    viewer.close().await.unwrap();

    // The server side goes disconnected, then failed after the ICE timeouts
    let removed = wait_until(
        ICE_TIMEOUTS.failed + Duration::from_secs(5),
        || pool.is_empty(),
    )
    .await;
    assert!(removed, "failed session still in pool: {:?}", pool.session_ids());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_viewer_evicts_first_over_real_peers() {
    let (service, pool) = signaling_with(None, 1);

    let first = connect_viewer(&service).await;
    let first_id = pool.session_ids()[0].clone();
    let second = connect_viewer(&service).await;
    let second_id = pool
        .session_ids()
        .into_iter()
        .find(|id| *id != first_id)
        .expect("second session registered");

    let evicted = wait_until(Duration::from_secs(5), || {
        pool.session_ids() == vec![second_id.clone()]
    })
    .await;
    assert!(evicted, "pool after eviction: {:?}", pool.session_ids());

    // The evicted viewer loses its connection; the newer one keeps it
    let dropped = wait_until(ICE_TIMEOUTS.failed + Duration::from_secs(5), || {
        first.connection_state() != RTCPeerConnectionState::Connected
    })
    .await;
    assert!(dropped, "evicted viewer still connected");
    assert_eq!(second.connection_state(), RTCPeerConnectionState::Connected);
    assert_eq!(pool.len(), 1);

    pool.close_all().await;
    first.close().await.unwrap();
    second.close().await.unwrap();
}

#[test]
fn test_jpeg_snapshot_of_synthetic_frame() {
    let frame = VideoFrame::rgb(Bytes::from(vec![128u8; 8 * 8 * 3]), 8, 8, Duration::ZERO);
    let store = SnapshotStore::new();
    store
        .write(JpegSnapshotEncoder::default().encode(&frame).unwrap())
        .unwrap();
    assert!(store.read().unwrap().len() > 4);
}

#[test]
fn test_config_validation() {
    let config = Config::try_parse_from([
        "pipeline-webrtc",
        "--capture-backend",
        "test",
        "--port",
        "8443",
        "--metrics-port",
        "9443",
    ])
    .unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.http_addr().port(), 8443);

    let config = Config::try_parse_from(["pipeline-webrtc", "--key-file", "key.pem"]).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_metrics_initialization() {
    let result = PrometheusReporter::init_metrics();
    // First call should succeed, subsequent calls might fail (already registered)
    assert!(result.is_ok() || result.is_err());
}
