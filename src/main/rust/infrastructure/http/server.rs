use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use warp::reply::Response;
use warp::Filter;

/// Certificate and key for serving the signaling endpoint over HTTPS
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Serve `routes` on `addr` until `shutdown` resolves.
///
/// Bind failures are returned to the caller; in-flight requests are
/// allowed to finish after the shutdown signal.
pub async fn serve_http<F, S>(
    routes: F,
    addr: SocketAddr,
    tls: Option<TlsFiles>,
    shutdown: S,
) -> anyhow::Result<()>
where
    F: Filter<Extract = (Response,), Error = Infallible> + Clone + Send + Sync + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    match tls {
        Some(files) => {
            // warp's TLS server panics on bind failure, so check the address first
            std::net::TcpListener::bind(addr)
                .with_context(|| format!("Failed to bind HTTPS listener on {}", addr))?;

            let (bound, server) = warp::serve(routes)
                .tls()
                .cert_path(&files.cert)
                .key_path(&files.key)
                .bind_with_graceful_shutdown(addr, shutdown);
            tracing::info!("Signaling server listening on https://{}", bound);
            server.await;
        }
        None => {
            let (bound, server) = warp::serve(routes)
                .try_bind_with_graceful_shutdown(addr, shutdown)
                .with_context(|| format!("Failed to bind HTTP listener on {}", addr))?;
            tracing::info!("Signaling server listening on http://{}", bound);
            server.await;
        }
    }
    Ok(())
}
