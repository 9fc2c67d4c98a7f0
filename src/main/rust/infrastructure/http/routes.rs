use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use warp::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE,
};
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::application::services::{SignalingService, SnapshotStore};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::SessionDescription;

/// Offers are a few kilobytes; anything larger is not a browser offer
const MAX_OFFER_BYTES: u64 = 64 * 1024;

/// Shared state behind the HTTP handlers
pub struct HttpContext {
    pub signaling: Arc<SignalingService>,
    pub snapshots: Arc<SnapshotStore>,
    pub snapshot_content_type: &'static str,
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

/// Signaling, snapshot and static file routes
pub fn routes(
    context: Arc<HttpContext>,
    static_dir: PathBuf,
) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone + Send + Sync + 'static {
    let with_context = warp::any().map(move || Arc::clone(&context));

    // Paths are matched before methods so unknown paths reject as 404
    let preflight = warp::path("webrtc")
        .and(warp::path::end())
        .and(warp::options())
        .map(|| with_cors(StatusCode::OK.into_response()));

    let offer = warp::path("webrtc")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_OFFER_BYTES))
        .and(warp::body::json::<SessionDescription>())
        .and(with_context.clone())
        .and_then(answer_offer);

    let snapshot = warp::path("jpeg")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_context)
        .map(|context: Arc<HttpContext>| serve_snapshot(&context));

    let index = warp::path::end()
        .and(warp::get())
        .and(warp::fs::file(static_dir.join("index.html")))
        .map(|file: warp::fs::File| file.into_response());

    let assets = warp::get()
        .and(warp::fs::dir(static_dir))
        .map(|file: warp::fs::File| file.into_response());

    preflight
        .or(offer)
        .unify()
        .or(snapshot)
        .unify()
        .or(index)
        .unify()
        .or(assets)
        .unify()
        .recover(handle_rejection)
        .unify()
}

async fn answer_offer(
    offer: SessionDescription,
    context: Arc<HttpContext>,
) -> Result<Response, Rejection> {
    let response = match context.signaling.handle_offer(offer).await {
        Ok(answer) => warp::reply::json(&answer).into_response(),
        Err(e) => error_response(&e),
    };
    Ok(with_cors(response))
}

fn serve_snapshot(context: &HttpContext) -> Response {
    let response = match context.snapshots.read() {
        Ok(image) => {
            let mut response = Response::new(Body::from(image));
            let headers = response.headers_mut();
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static(context.snapshot_content_type),
            );
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Err(e) => error_response(&e),
    };
    with_cors(response)
}

fn status_for(error: &DomainError) -> StatusCode {
    match error {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        DomainError::SnapshotUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &DomainError) -> Response {
    json_error(status_for(error), error.to_string())
}

fn json_error(status: StatusCode, message: String) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorBody { error: message }), status)
        .into_response()
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("malformed session description: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "offer too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "content length required".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };
    Ok(with_cors(json_error(status, message)))
}
