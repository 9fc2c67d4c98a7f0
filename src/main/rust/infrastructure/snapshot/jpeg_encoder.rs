use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::SnapshotEncoder;
use crate::domain::value_objects::VideoFrame;

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Baseline JPEG encoder for RGB24 frames
#[derive(Debug, Clone)]
pub struct JpegSnapshotEncoder {
    quality: u8,
}

impl JpegSnapshotEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegSnapshotEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl SnapshotEncoder for JpegSnapshotEncoder {
    fn encode(&self, frame: &VideoFrame) -> Result<Bytes> {
        if frame.width == 0 || frame.height == 0 || frame.data.len() != frame.expected_len() {
            return Err(DomainError::SnapshotEncodeFailed(format!(
                "{}x{} frame carries {} bytes, expected {}",
                frame.width,
                frame.height,
                frame.data.len(),
                frame.expected_len()
            )));
        }

        let mut out = Vec::with_capacity(frame.data.len() / 8);
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
            .map_err(|e| DomainError::SnapshotEncodeFailed(e.to_string()))?;
        Ok(Bytes::from(out))
    }

    fn content_type(&self) -> &'static str {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn gradient(width: u32, height: u32) -> VideoFrame {
        let data: Vec<u8> = (0..width * height)
            .flat_map(|i| {
                let v = (i % 256) as u8;
                [v, 255 - v, v / 2]
            })
            .collect();
        VideoFrame::rgb(Bytes::from(data), width, height, Duration::ZERO)
    }

    #[test]
    fn test_encodes_jpeg_markers() {
        let jpeg = JpegSnapshotEncoder::default().encode(&gradient(32, 16)).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let frame = gradient(64, 64);
        let high = JpegSnapshotEncoder::new(95).encode(&frame).unwrap();
        let low = JpegSnapshotEncoder::new(10).encode(&frame).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let frame = VideoFrame::rgb(Bytes::from(vec![0u8; 10]), 4, 4, Duration::ZERO);
        let err = JpegSnapshotEncoder::default().encode(&frame).unwrap_err();
        assert!(matches!(err, DomainError::SnapshotEncodeFailed(_)));
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(JpegSnapshotEncoder::new(0).quality(), 1);
        assert_eq!(JpegSnapshotEncoder::new(250).quality(), 100);
        assert_eq!(JpegSnapshotEncoder::default().content_type(), "image/jpeg");
    }
}
