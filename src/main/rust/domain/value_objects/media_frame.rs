use std::time::Duration;

use bytes::Bytes;

/// A decoded video frame, packed RGB24.
///
/// Cheap to clone: the pixel buffer is reference counted so every
/// subscription shares the same allocation.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub pts: Duration,
    pub duration: Option<Duration>,
}

impl VideoFrame {
    pub fn rgb(data: Bytes, width: u32, height: u32, pts: Duration) -> Self {
        Self {
            data,
            width,
            height,
            pts,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Expected buffer length for the frame geometry
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Decoded audio, interleaved signed 16-bit little endian
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub data: Bytes,
    pub sample_rate: u32,
    pub channels: u16,
    pub pts: Duration,
}

impl AudioFrame {
    pub fn s16le(data: Bytes, sample_rate: u32, channels: u16, pts: Duration) -> Self {
        Self {
            data,
            sample_rate,
            channels,
            pts,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.data.len() / (2 * self.channels.max(1) as usize)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.sample_count() as f64 / self.sample_rate as f64)
    }
}
