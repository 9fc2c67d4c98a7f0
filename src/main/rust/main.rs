use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use pipeline_webrtc::{
    routes, serve_http, serve_metrics, Config, EncoderSettings, GStreamerCapture, HttpContext,
    JpegSnapshotEncoder, MetricsReporter, PrometheusReporter, SessionPool, SignalingService,
    SnapshotEncoder, SnapshotStore, SourceBroadcaster, TlsFiles, WebRtcEngine, WebRtcSettings,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize logging; RUST_LOG overrides the verbosity flag
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Pipeline-WebRTC v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e);
    }

    info!("Configuration validated");

    gstreamer::init()?;
    info!("GStreamer initialized");

    PrometheusReporter::init_metrics()?;
    info!("Metrics initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ready = Arc::new(AtomicBool::new(false));

    let metrics_port = config.metrics_port;
    let metrics_ready = Arc::clone(&ready);
    let metrics_shutdown = shutdown_signal(shutdown_rx.clone());
    tokio::spawn(async move {
        serve_metrics(metrics_port, metrics_ready, metrics_shutdown).await;
    });

    // Domain configs
    let capture_spec = config.capture_spec()?;
    let pool_config = config.pool_config()?;
    let snapshot_config = config.snapshot_config()?;

    // Infrastructure implementations (dependency injection)
    let metrics: Arc<dyn MetricsReporter> = Arc::new(PrometheusReporter::new());
    let encoder: Arc<dyn SnapshotEncoder> =
        Arc::new(JpegSnapshotEncoder::new(snapshot_config.quality()));
    let engine = Arc::new(WebRtcEngine::new(WebRtcSettings {
        ice_servers: config.ice_servers.clone(),
        encoder: EncoderSettings {
            fps: config.fps,
            ..EncoderSettings::default()
        },
        ice_timeouts: None,
    })?);
    let broadcaster = Arc::new(SourceBroadcaster::new(Arc::new(GStreamerCapture::new())));
    let snapshots = Arc::new(
        SnapshotStore::new().with_mirror_path(snapshot_config.mirror_path().cloned()),
    );
    let pool = Arc::new(SessionPool::new(pool_config, Arc::clone(&metrics)));

    // Application service
    let signaling = Arc::new(
        SignalingService::new(
            engine,
            Arc::clone(&broadcaster),
            Arc::clone(&pool),
            Arc::clone(&snapshots),
            Arc::clone(&encoder),
            metrics,
            capture_spec.clone(),
        )
        .with_preferred_codec(config.preferred_codec()?)
        .with_snapshot_interval(snapshot_config.interval()),
    );

    // A preferred codec the engine cannot send is a configuration error
    if let Some(codecs) = signaling.preferred_video_codecs()? {
        info!(
            "Video restricted to {}",
            codecs
                .iter()
                .map(|c| format!("{} (pt {})", c.mime_type, c.payload_type))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    broadcaster.prime(&capture_spec).await?;

    let context = Arc::new(HttpContext {
        signaling,
        snapshots,
        snapshot_content_type: encoder.content_type(),
    });
    let filter = routes(context, config.static_dir.clone());
    let tls = config
        .tls_paths()
        .map(|(cert, key)| TlsFiles { cert, key });
    let scheme = if tls.is_some() { "https" } else { "http" };

    info!("-------------------------------------------------------");
    info!("WebRTC Server Ready");
    info!("   Viewer:   {}://{}/", scheme, config.http_addr());
    info!("   Offer:    POST {}://{}/webrtc", scheme, config.http_addr());
    info!("   Snapshot: {}://{}/jpeg", scheme, config.http_addr());
    info!("   Source:   {}", capture_spec);
    info!("   Sessions: max {}", config.max_connections);
    info!("   Metrics:  http://0.0.0.0:{}/metrics", config.metrics_port);
    info!("   Health:   http://0.0.0.0:{}/health", config.metrics_port);
    info!("-------------------------------------------------------");

    // Handle graceful shutdown
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received (Ctrl+C)");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => {
                error!("Failed to listen for shutdown signal: {}", err);
            }
        }
    });

    ready.store(true, Ordering::SeqCst);
    serve_http(filter, config.http_addr(), tls, shutdown_signal(shutdown_rx)).await?;
    ready.store(false, Ordering::SeqCst);

    // Graceful shutdown
    info!("Closing {} session(s)", pool.len());
    pool.close_all().await;
    broadcaster.reset(&capture_spec).await;

    info!("Server stopped gracefully");
    Ok(())
}

async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
