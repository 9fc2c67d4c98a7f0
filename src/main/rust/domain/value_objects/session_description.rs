use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// Session description exchanged over the signaling endpoint.
///
/// Serializes as `{"sdp": "...", "type": "offer"}`, the shape browsers
/// produce from `RTCPeerConnection.localDescription`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: SdpType,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            kind: SdpType::Offer,
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            kind: SdpType::Answer,
        }
    }

    /// Only complete offers can start a session
    pub fn validate_offer(&self) -> Result<()> {
        if self.kind != SdpType::Offer {
            return Err(DomainError::InvalidOffer(format!(
                "expected type offer, got {:?}",
                self.kind
            )));
        }
        if !self.sdp.trim_start().starts_with("v=0") {
            return Err(DomainError::InvalidOffer(
                "sdp does not start with a version line".to_string(),
            ));
        }
        Ok(())
    }
}
