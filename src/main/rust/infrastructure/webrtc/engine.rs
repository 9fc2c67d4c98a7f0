use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;

use super::codecs;
use super::WebRtcPeer;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{PeerTransport, TransportEngine};
use crate::domain::value_objects::{CodecCapability, MediaKind};
use crate::infrastructure::gstreamer::EncoderSettings;

pub const DEFAULT_ICE_SERVER: &str = "stun:stun.l.google.com:19302";

/// How long ICE waits before reporting `disconnected` and `failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IceTimeouts {
    pub disconnected: Duration,
    pub failed: Duration,
    pub keep_alive: Duration,
}

#[derive(Debug, Clone)]
pub struct WebRtcSettings {
    pub ice_servers: Vec<String>,
    pub encoder: EncoderSettings,
    /// webrtc-rs defaults when `None`
    pub ice_timeouts: Option<IceTimeouts>,
}

impl Default for WebRtcSettings {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_ICE_SERVER.to_string()],
            encoder: EncoderSettings::default(),
            ice_timeouts: None,
        }
    }
}

/// Transport engine backed by webrtc-rs.
///
/// One `API` instance is shared by every peer so codec registration and
/// interceptors are configured once.
pub struct WebRtcEngine {
    api: API,
    settings: WebRtcSettings,
}

impl WebRtcEngine {
    pub fn new(settings: WebRtcSettings) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        for kind in [MediaKind::Video, MediaKind::Audio] {
            for codec in codecs::registered(kind) {
                media_engine
                    .register_codec(codec, codecs::codec_type(kind))
                    .map_err(|e| DomainError::Negotiation(format!("codec registration: {}", e)))?;
            }
        }

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| DomainError::Negotiation(format!("interceptors: {}", e)))?;

        let mut setting_engine = SettingEngine::default();
        if let Some(timeouts) = settings.ice_timeouts {
            setting_engine.set_ice_timeouts(
                Some(timeouts.disconnected),
                Some(timeouts.failed),
                Some(timeouts.keep_alive),
            );
        }

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build();

        tracing::info!(
            ice_servers = ?settings.ice_servers,
            ice_timeouts = ?settings.ice_timeouts,
            "WebRTC engine ready"
        );
        Ok(Self { api, settings })
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = if self.settings.ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: self.settings.ice_servers.clone(),
                ..Default::default()
            }]
        };
        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TransportEngine for WebRtcEngine {
    async fn create_peer(&self) -> Result<Arc<dyn PeerTransport>> {
        let connection = self
            .api
            .new_peer_connection(self.rtc_configuration())
            .await
            .map_err(|e| DomainError::Negotiation(format!("peer connection: {}", e)))?;

        Ok(Arc::new(WebRtcPeer::new(
            Arc::new(connection),
            self.settings.encoder.clone(),
        )))
    }

    fn codec_capabilities(&self, kind: MediaKind) -> Vec<CodecCapability> {
        codecs::registered(kind)
            .iter()
            .map(codecs::to_capability)
            .collect()
    }
}
