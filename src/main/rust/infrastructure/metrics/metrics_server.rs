use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use warp::http::StatusCode;
use warp::Filter;

use super::prometheus_reporter::ACTIVE_SESSIONS;
use super::PrometheusReporter;

const SERVICE_NAME: &str = "pipeline-webrtc";

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    active_sessions: i64,
}

impl HealthResponse {
    fn new(status: &'static str) -> Self {
        Self {
            status,
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            active_sessions: ACTIVE_SESSIONS.get(),
        }
    }
}

/// `/metrics`, `/health`, `/livez` and `/readyz`.
///
/// `/readyz` answers 503 until `ready` is set, which happens once the
/// capture source is open and the signaling endpoint is bound.
pub fn metrics_routes(
    ready: Arc<AtomicBool>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "OPTIONS"])
        .allow_headers(vec!["Content-Type"]);

    let metrics_route = warp::path("metrics").map(|| {
        warp::reply::with_header(
            PrometheusReporter::gather_metrics(),
            "content-type",
            "text/plain; version=0.0.4; charset=utf-8",
        )
    });

    let health_route =
        warp::path("health").map(|| warp::reply::json(&HealthResponse::new("healthy")));

    let liveness_route = warp::path("livez").map(|| warp::reply::with_status("OK", StatusCode::OK));

    let readiness_route = warp::path("readyz")
        .and(warp::any().map(move || Arc::clone(&ready)))
        .and_then(|ready: Arc<AtomicBool>| async move {
            let (status, code) = if ready.load(Ordering::SeqCst) {
                ("ready", StatusCode::OK)
            } else {
                ("starting", StatusCode::SERVICE_UNAVAILABLE)
            };
            Ok::<_, Infallible>(warp::reply::with_status(
                warp::reply::json(&HealthResponse::new(status)),
                code,
            ))
        });

    metrics_route
        .or(health_route)
        .or(liveness_route)
        .or(readiness_route)
        .with(cors)
}

/// Serve the metrics routes until `shutdown` resolves
pub async fn serve_metrics<F>(port: u16, ready: Arc<AtomicBool>, shutdown: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tracing::info!("Metrics server starting on port {}", port);

    match warp::serve(metrics_routes(ready))
        .try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), shutdown)
    {
        Ok((addr, server)) => {
            tracing::debug!("Metrics server bound to {}", addr);
            server.await;
        }
        Err(e) => tracing::error!("Metrics server failed to bind port {}: {}", port, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readiness_follows_flag() {
        let ready = Arc::new(AtomicBool::new(false));
        let routes = metrics_routes(Arc::clone(&ready));

        let res = warp::test::request().path("/readyz").reply(&routes).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        ready.store(true, Ordering::SeqCst);
        let res = warp::test::request().path("/readyz").reply(&routes).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["status"], "ready");
        assert_eq!(body["service"], SERVICE_NAME);
    }

    #[tokio::test]
    async fn test_liveness_always_ok() {
        let routes = metrics_routes(Arc::new(AtomicBool::new(false)));
        let res = warp::test::request().path("/livez").reply(&routes).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), "OK");
    }

    #[tokio::test]
    async fn test_metrics_are_plain_text() {
        let routes = metrics_routes(Arc::new(AtomicBool::new(true)));
        let res = warp::test::request().path("/metrics").reply(&routes).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }
}
