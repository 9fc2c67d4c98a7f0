use webrtc::api::media_engine::{MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_VP8, MIME_TYPE_VP9};
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType};
use webrtc::rtp_transceiver::RTCPFeedback;

use crate::domain::value_objects::{CodecCapability, MediaKind};

fn video_feedback() -> Vec<RTCPFeedback> {
    [("goog-remb", ""), ("ccm", "fir"), ("nack", ""), ("nack", "pli")]
        .into_iter()
        .map(|(typ, parameter)| RTCPFeedback {
            typ: typ.to_owned(),
            parameter: parameter.to_owned(),
        })
        .collect()
}

fn video(mime_type: &str, fmtp: &str, payload_type: u8) -> RTCRtpCodecParameters {
    RTCRtpCodecParameters {
        capability: RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            clock_rate: 90_000,
            channels: 0,
            sdp_fmtp_line: fmtp.to_owned(),
            rtcp_feedback: video_feedback(),
        },
        payload_type,
        ..Default::default()
    }
}

/// Codecs registered with the media engine, in preference order
pub(crate) fn registered(kind: MediaKind) -> Vec<RTCRtpCodecParameters> {
    match kind {
        MediaKind::Video => vec![
            video(MIME_TYPE_VP8, "", 96),
            video(MIME_TYPE_VP9, "profile-id=0", 98),
            video(
                MIME_TYPE_H264,
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f",
                102,
            ),
            video(
                MIME_TYPE_H264,
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f",
                125,
            ),
        ],
        MediaKind::Audio => vec![RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48_000,
                channels: 2,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                rtcp_feedback: vec![],
            },
            payload_type: 111,
            ..Default::default()
        }],
    }
}

pub(crate) fn codec_type(kind: MediaKind) -> RTPCodecType {
    match kind {
        MediaKind::Audio => RTPCodecType::Audio,
        MediaKind::Video => RTPCodecType::Video,
    }
}

pub(crate) fn to_capability(parameters: &RTCRtpCodecParameters) -> CodecCapability {
    CodecCapability {
        mime_type: parameters.capability.mime_type.clone(),
        clock_rate: parameters.capability.clock_rate,
        channels: parameters.capability.channels,
        sdp_fmtp_line: parameters.capability.sdp_fmtp_line.clone(),
        payload_type: parameters.payload_type,
    }
}

/// Map domain capabilities back to registered parameters, keeping order
pub(crate) fn to_parameters(kind: MediaKind, capabilities: &[CodecCapability]) -> Vec<RTCRtpCodecParameters> {
    let table = registered(kind);
    capabilities
        .iter()
        .filter_map(|c| {
            table
                .iter()
                .find(|p| {
                    p.payload_type == c.payload_type
                        && p.capability.mime_type.eq_ignore_ascii_case(&c.mime_type)
                })
                .cloned()
        })
        .collect()
}

/// Capability used for the outgoing track when no preference applies
pub(crate) fn default_capability(kind: MediaKind) -> Option<RTCRtpCodecCapability> {
    registered(kind).into_iter().next().map(|p| p.capability)
}

pub(crate) fn capability_for(kind: MediaKind, codec: &CodecCapability) -> Option<RTCRtpCodecCapability> {
    to_parameters(kind, std::slice::from_ref(codec))
        .into_iter()
        .next()
        .map(|p| p.capability)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_table_has_two_h264_profiles() {
        let h264: Vec<_> = registered(MediaKind::Video)
            .into_iter()
            .filter(|p| p.capability.mime_type == MIME_TYPE_H264)
            .collect();
        assert_eq!(h264.len(), 2);
        assert_ne!(h264[0].payload_type, h264[1].payload_type);
    }

    #[test]
    fn test_round_trip_keeps_feedback() {
        let capabilities: Vec<_> = registered(MediaKind::Video).iter().map(to_capability).collect();
        let h264: Vec<_> = capabilities
            .into_iter()
            .filter(|c| c.mime_type.eq_ignore_ascii_case("video/h264"))
            .collect();

        let parameters = to_parameters(MediaKind::Video, &h264);
        assert_eq!(parameters.len(), 2);
        assert!(parameters.iter().all(|p| !p.capability.rtcp_feedback.is_empty()));
    }

    #[test]
    fn test_default_video_is_vp8() {
        let capability = default_capability(MediaKind::Video).unwrap();
        assert_eq!(capability.mime_type, MIME_TYPE_VP8);
    }

    #[test]
    fn test_unknown_capability_is_dropped() {
        let unknown = CodecCapability {
            mime_type: "video/AV1".to_string(),
            clock_rate: 90_000,
            channels: 0,
            sdp_fmtp_line: String::new(),
            payload_type: 45,
        };
        assert!(to_parameters(MediaKind::Video, &[unknown.clone()]).is_empty());
        assert!(capability_for(MediaKind::Video, &unknown).is_none());
    }
}
