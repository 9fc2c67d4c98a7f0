use std::fmt;

use crate::domain::errors::{DomainError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// One entry of the transport engine's codec capability set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecCapability {
    pub mime_type: String,
    pub clock_rate: u32,
    pub channels: u16,
    pub sdp_fmtp_line: String,
    pub payload_type: u8,
}

impl CodecCapability {
    pub fn kind(&self) -> Option<MediaKind> {
        match self.mime_type.split('/').next()?.to_ascii_lowercase().as_str() {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// A validated MIME type such as `video/H264`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecPreference {
    mime_type: String,
}

impl CodecPreference {
    pub fn new(mime_type: impl Into<String>) -> Result<Self> {
        let mime_type = mime_type.into();
        let valid = match mime_type.split_once('/') {
            Some((kind, name)) => {
                matches!(kind.to_ascii_lowercase().as_str(), "audio" | "video")
                    && !name.is_empty()
                    && !name.contains('/')
            }
            None => false,
        };
        if !valid {
            return Err(DomainError::InvalidCodec(mime_type));
        }
        Ok(Self { mime_type })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// MIME types compare case-insensitively (`video/h264` == `video/H264`)
    pub fn matches(&self, capability: &CodecCapability) -> bool {
        capability.mime_type.eq_ignore_ascii_case(&self.mime_type)
    }

    /// Keep only the capabilities matching this preference, in their
    /// original order. An empty result is a configuration error.
    pub fn filter(&self, capabilities: &[CodecCapability]) -> Result<Vec<CodecCapability>> {
        let matching: Vec<_> = capabilities
            .iter()
            .filter(|c| self.matches(c))
            .cloned()
            .collect();
        if matching.is_empty() {
            return Err(DomainError::NoMatchingCodec(self.mime_type.clone()));
        }
        Ok(matching)
    }
}

impl fmt::Display for CodecPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mime_type)
    }
}
