//! Shared HTTP plumbing for every vestnik service: request-id handling,
//! wide-event access logging, the error-to-status taxonomy, and the
//! shutdown signal.

use std::time::Instant;

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Length of a generated request id.
const REQUEST_ID_LEN: usize = 18;

/// Newtype wrapping a request id string, stored as a request extension.
///
/// The id travels between services as the `request-id` query parameter, not
/// as a header, so correlated log lines can be grepped straight out of
/// access logs and proxied URLs alike.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Axum middleware that extracts or generates a request id.
///
/// The `request-id` query parameter wins when present; otherwise a fresh id
/// is generated. The id is inserted into request extensions as
/// [`RequestId`].
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = query_param(req.uri().query(), "request-id")
        .unwrap_or_else(|| generate_request_id(REQUEST_ID_LEN));

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;
    // Mirror into response extensions so the access-log layer above can
    // correlate the wide event.
    res.extensions_mut().insert(RequestId(id));
    res
}

/// Axum middleware logging one wide event per handled request.
pub async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let started = Instant::now();

    let res = next.run(req).await;

    let request_id = res
        .extensions()
        .get::<RequestId>()
        .map_or("", |id| id.0.as_str());
    tracing::info!(
        request_id,
        status = res.status().as_u16(),
        %method,
        path = %path,
        query = %query,
        latency_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    res
}

/// Generates an id of `n` characters with digits on even positions and
/// ASCII letters on odd ones, e.g. `5k2Rb9Xq0d7Lm3Za1c`.
fn generate_request_id(n: usize) -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const DIGITS: &[u8] = b"0123456789";

    let mut rng = rand::thread_rng();
    (0..n)
        .map(|i| {
            let set = if i % 2 == 0 { DIGITS } else { LETTERS };
            set[rng.gen_range(0..set.len())] as char
        })
        .collect()
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Request-scoped error taxonomy shared by all services.
///
/// Internal errors never leak their detail to the client: the response body
/// is a fixed phrase and the original message goes to the structured log
/// under `internalErr`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Internal { request_id: String, detail: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(request_id: &RequestId, err: impl std::fmt::Display) -> Self {
        Self::Internal {
            request_id: request_id.0.clone(),
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::Internal { request_id, detail } => {
                tracing::error!(request_id = %request_id, internalErr = %detail, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}

/// Install the JSON tracing subscriber every service logs through.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Resolves when the process receives SIGINT or SIGTERM, cancelling `token`
/// on the way out. Passed to `axum::serve(...).with_graceful_shutdown` so
/// the server drains while the polling pipeline winds down.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::warn!("got shutdown signal");
    token.cancel();
}
