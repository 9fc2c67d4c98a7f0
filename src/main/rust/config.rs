use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::value_objects::{
    CaptureBackendKind, CaptureSpec, CodecPreference, PoolConfig, Resolution, SnapshotConfig,
};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pipeline-webrtc",
    version = "0.1.0",
    author = "Hawkeye Video Pipeline",
    about = "WebRTC webcam server with JPEG snapshots"
)]
pub struct Config {
    /// HTTP bind address
    #[arg(long, env = "HTTP_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// HTTP port for signaling, snapshots and the viewer page
    #[arg(long, env = "HTTP_PORT", default_value = "8080")]
    pub port: u16,

    /// TLS certificate (PEM); requires --key-file
    #[arg(long, env = "TLS_CERT_FILE")]
    pub cert_file: Option<PathBuf>,

    /// TLS private key (PEM); requires --cert-file
    #[arg(long, env = "TLS_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// Metrics server port
    #[arg(long, env = "METRICS_PORT", default_value = "9002")]
    pub metrics_port: u16,

    /// Directory holding index.html and client.js
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Play a media file instead of capturing from a device
    #[arg(long, env = "PLAY_FROM")]
    pub play_from: Option<PathBuf>,

    /// Restart file playback at end of stream
    #[arg(long, env = "LOOP_PLAYBACK")]
    pub loop_playback: bool,

    /// Capture backend: v4l2, avfoundation, dshow or test
    #[arg(long, env = "CAPTURE_BACKEND")]
    pub capture_backend: Option<String>,

    /// Capture device; defaults to the backend's usual first device
    #[arg(long, env = "CAPTURE_DEVICE")]
    pub device: Option<String>,

    /// Capture size as WIDTHxHEIGHT
    #[arg(short, long, env = "RESOLUTION", default_value = "1280x720")]
    pub resolution: String,

    /// Capture frame rate
    #[arg(short, long, env = "FPS", default_value = "30")]
    pub fps: u32,

    /// Scale and rate-convert captured frames to --resolution and --fps
    #[arg(
        long,
        env = "TRANSCODE",
        default_value_t = true,
        action = clap::ArgAction::SetTrue,
        overrides_with = "no_transcode"
    )]
    pub transcode: bool,

    /// Forward frames at the device's native size and rate
    #[arg(long = "no-transcode", overrides_with = "transcode")]
    pub no_transcode: bool,

    /// Restrict outgoing video to one codec, e.g. video/H264
    #[arg(long, env = "PREFERRED_CODEC")]
    pub preferred_codec: Option<String>,

    /// Maximum concurrent sessions before the oldest is evicted
    #[arg(long, env = "MAX_CONNECTIONS", default_value = "5")]
    pub max_connections: usize,

    /// Minimum time between snapshots, in milliseconds
    #[arg(long, env = "SNAPSHOT_INTERVAL_MS", default_value = "1000")]
    pub snapshot_interval_ms: u64,

    /// Also write each snapshot to this file
    #[arg(long, env = "SNAPSHOT_PATH")]
    pub snapshot_path: Option<PathBuf>,

    /// JPEG quality, 1-100
    #[arg(long, env = "SNAPSHOT_QUALITY", default_value = "85")]
    pub snapshot_quality: u8,

    /// ICE server URLs
    #[arg(
        long = "ice-server",
        env = "ICE_SERVERS",
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302"
    )]
    pub ice_servers: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Minimum allowed port (ports below 1024 are privileged)
const MIN_USER_PORT: u16 = 1024;

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        Self::validate_port(self.port, "HTTP")?;
        Self::validate_port(self.metrics_port, "metrics")?;

        if self.port == self.metrics_port {
            anyhow::bail!("HTTP port and metrics port cannot be the same");
        }

        match (&self.cert_file, &self.key_file) {
            (Some(_), None) => anyhow::bail!("--cert-file requires --key-file"),
            (None, Some(_)) => anyhow::bail!("--key-file requires --cert-file"),
            _ => {}
        }

        if let Some(path) = &self.play_from {
            if !path.exists() {
                anyhow::bail!("Media file not found: {:?}", path);
            }
            if !path.is_file() {
                anyhow::bail!("Media path is not a file: {:?}", path);
            }
        }

        self.capture_spec()?;
        self.pool_config()?;
        self.snapshot_config()?;
        self.preferred_codec()?;

        if self.ice_servers.iter().any(|url| url.trim().is_empty()) {
            anyhow::bail!("ICE server URLs cannot be empty");
        }

        Ok(())
    }

    fn validate_port(port: u16, name: &str) -> anyhow::Result<()> {
        if port == 0 {
            anyhow::bail!("Invalid {} port: port cannot be 0", name);
        }
        if port < MIN_USER_PORT {
            anyhow::bail!(
                "Invalid {} port: {} is a privileged port (< {}). Use a port >= {}",
                name,
                port,
                MIN_USER_PORT,
                MIN_USER_PORT
            );
        }
        Ok(())
    }

    /// The later of --transcode / --no-transcode wins
    pub fn transcode_enabled(&self) -> bool {
        self.transcode && !self.no_transcode
    }

    /// File playback when --play-from is set, device capture otherwise
    pub fn capture_spec(&self) -> anyhow::Result<CaptureSpec> {
        let resolution: Resolution = self.resolution.parse()?;
        let spec = match &self.play_from {
            Some(path) => CaptureSpec::file(path.clone()).with_looping(self.loop_playback),
            None => {
                let backend = match &self.capture_backend {
                    Some(name) => name.parse()?,
                    None => CaptureBackendKind::platform_default(),
                };
                let device = self
                    .device
                    .clone()
                    .unwrap_or_else(|| backend.default_device().to_string());
                CaptureSpec::device(backend, device)
            }
        }
        .with_resolution(resolution)
        .with_fps(self.fps)
        .with_transcode(self.transcode_enabled());

        spec.validate()?;
        Ok(spec)
    }

    pub fn pool_config(&self) -> anyhow::Result<PoolConfig> {
        Ok(PoolConfig::new(self.max_connections)?)
    }

    pub fn snapshot_config(&self) -> anyhow::Result<SnapshotConfig> {
        Ok(SnapshotConfig::new(Duration::from_millis(self.snapshot_interval_ms))?
            .with_quality(self.snapshot_quality)?
            .with_mirror_path(self.snapshot_path.clone()))
    }

    pub fn preferred_codec(&self) -> anyhow::Result<Option<CodecPreference>> {
        match &self.preferred_codec {
            Some(mime) => Ok(Some(CodecPreference::new(mime.clone())?)),
            None => Ok(None),
        }
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Certificate and key, when both are configured
    pub fn tls_paths(&self) -> Option<(PathBuf, PathBuf)> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
            _ => None,
        }
    }
}
