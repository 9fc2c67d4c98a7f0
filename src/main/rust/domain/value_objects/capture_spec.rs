use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::errors::{DomainError, Result};

/// Device capture backend, chosen by configuration rather than by platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureBackendKind {
    V4l2,
    AvFoundation,
    DirectShow,
    Test,
}

impl CaptureBackendKind {
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::AvFoundation
        } else if cfg!(target_os = "windows") {
            Self::DirectShow
        } else {
            Self::V4l2
        }
    }

    pub fn default_device(&self) -> &'static str {
        match self {
            Self::V4l2 => "/dev/video0",
            Self::AvFoundation => "0",
            Self::DirectShow => "Integrated Camera",
            Self::Test => "smpte",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V4l2 => "v4l2",
            Self::AvFoundation => "avfoundation",
            Self::DirectShow => "dshow",
            Self::Test => "test",
        }
    }
}

impl FromStr for CaptureBackendKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "v4l2" => Ok(Self::V4l2),
            "avfoundation" => Ok(Self::AvFoundation),
            "dshow" | "directshow" => Ok(Self::DirectShow),
            "test" => Ok(Self::Test),
            other => Err(DomainError::CaptureOpenFailed(format!(
                "unknown capture backend: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for CaptureBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DomainError::InvalidResolution(format!("{}x{}", width, height)));
        }
        Ok(Self { width, height })
    }
}

impl FromStr for Resolution {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DomainError::InvalidResolution(s.to_string());
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = w.trim().parse().map_err(|_| invalid())?;
        let height = h.trim().parse().map_err(|_| invalid())?;
        Self::new(width, height).map_err(|_| invalid())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Device {
        backend: CaptureBackendKind,
        device: String,
    },
    File {
        path: PathBuf,
        looping: bool,
    },
}

/// Everything needed to open a capture pipeline.
///
/// Two equal specs describe the same physical source; the broadcaster keys
/// shared pipelines on this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureSpec {
    source: SourceKind,
    resolution: Resolution,
    fps: u32,
    transcode: bool,
}

impl CaptureSpec {
    pub fn device(backend: CaptureBackendKind, device: impl Into<String>) -> Self {
        Self::from_source(SourceKind::Device {
            backend,
            device: device.into(),
        })
    }

    pub fn file(path: PathBuf) -> Self {
        Self::from_source(SourceKind::File {
            path,
            looping: false,
        })
    }

    fn from_source(source: SourceKind) -> Self {
        Self {
            source,
            resolution: Resolution {
                width: 1280,
                height: 720,
            },
            fps: 30,
            transcode: true,
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_transcode(mut self, enabled: bool) -> Self {
        self.transcode = enabled;
        self
    }

    pub fn with_looping(mut self, enabled: bool) -> Self {
        if let SourceKind::File { looping, .. } = &mut self.source {
            *looping = enabled;
        }
        self
    }

    pub fn source(&self) -> &SourceKind {
        &self.source
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn transcode(&self) -> bool {
        self.transcode
    }

    pub fn is_file(&self) -> bool {
        matches!(self.source, SourceKind::File { .. })
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(DomainError::InvalidFrameRate(self.fps));
        }

        if let SourceKind::File { path, .. } = &self.source {
            if !path.exists() {
                return Err(DomainError::InvalidPath(path.clone()));
            }
            if !path.is_file() {
                return Err(DomainError::PathNotFile(path.clone()));
            }
        }

        Ok(())
    }
}

impl fmt::Display for CaptureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            SourceKind::Device { backend, device } => write!(f, "{}:{}", backend, device)?,
            SourceKind::File { path, .. } => write!(f, "file:{}", path.display())?,
        }
        write!(f, " {}@{}fps", self.resolution, self.fps)
    }
}
