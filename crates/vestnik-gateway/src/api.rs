//! Gateway REST API: simple proxies, the moderation-gated comment post,
//! and the parallel detailed-news aggregation.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::de::DeserializeOwned;
use tower::ServiceBuilder;
use url::Url;

use vestnik_http::{access_log, request_id, ApiError, RequestId};

use crate::tree::{to_tree, Comment, NewsDetail};

/// Deadline for every downstream call issued by the gateway.
const DOWNSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Network addresses (host:port) of the downstream services, fixed at
/// startup.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    pub news: String,
    pub comments: String,
    pub commscheck: String,
}

#[derive(Clone)]
pub struct AppState {
    client: reqwest::Client,
    registry: Arc<ServiceRegistry>,
    timeout: Duration,
}

impl AppState {
    /// Build the gateway state with its shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the client cannot be constructed.
    pub fn new(registry: ServiceRegistry) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            registry: Arc::new(registry),
            timeout: DOWNSTREAM_TIMEOUT,
        })
    }

    /// Override the downstream deadline; tests shrink it to milliseconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/news", get(news_proxy_handler))
        .route("/news/latest", get(news_proxy_handler))
        .route("/news/{id}", get(news_detail_handler))
        .route("/comments", post(comment_create_handler))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(access_log))
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

/// `GET /news` and `GET /news/latest`: hand the request to the news service
/// unchanged and copy back whatever it answers.
async fn news_proxy_handler(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let url = service_url(&state.registry.news, "news", &params, &req_id, None)
        .map_err(|e| ApiError::internal(&req_id, e))?;

    let resp = state
        .client
        .get(url)
        .timeout(state.timeout)
        .send()
        .await
        .map_err(|e| ApiError::internal(&req_id, e))?;

    proxy_response(resp, &req_id).await
}

/// `GET /news/{id}`: fan out to the news and comments services in parallel
/// under one deadline, then attach the assembled reply forest.
async fn news_detail_handler(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let news_url = service_url(
        &state.registry.news,
        &format!("news/{id}"),
        &params,
        &req_id,
        Some(id),
    )
    .map_err(|e| ApiError::internal(&req_id, e))?;
    let comments_url = service_url(
        &state.registry.comments,
        "comments",
        &params,
        &req_id,
        Some(id),
    )
    .map_err(|e| ApiError::internal(&req_id, e))?;

    // First failure wins: try_join! drops the other in-flight call and its
    // result is discarded on arrival.
    let (mut news, comments) = tokio::try_join!(
        fetch_json::<NewsDetail>(&state, news_url),
        fetch_json::<Vec<Comment>>(&state, comments_url),
    )
    .map_err(|e| ApiError::internal(&req_id, e))?;

    news.comments = to_tree(comments);
    Ok(Json(news).into_response())
}

/// `POST /comments`: run the body past moderation, then hand it to the
/// comments service. Either downstream answer is proxied verbatim.
async fn comment_create_handler(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let check_url = service_url(&state.registry.commscheck, "comments", &params, &req_id, None)
        .map_err(|e| ApiError::internal(&req_id, e))?;

    let resp = state
        .client
        .post(check_url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.clone())
        .timeout(state.timeout)
        .send()
        .await
        .map_err(|e| ApiError::internal(&req_id, e))?;

    if resp.status() != StatusCode::OK {
        return proxy_response(resp, &req_id).await;
    }

    let comments_url = service_url(&state.registry.comments, "comments", &params, &req_id, None)
        .map_err(|e| ApiError::internal(&req_id, e))?;

    let resp = state
        .client
        .post(comments_url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .timeout(state.timeout)
        .send()
        .await
        .map_err(|e| ApiError::internal(&req_id, e))?;

    proxy_response(resp, &req_id).await
}

/// Copy a downstream response to the caller: status and body verbatim.
async fn proxy_response(resp: reqwest::Response, req_id: &RequestId) -> Result<Response, ApiError> {
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|e| ApiError::internal(req_id, e))?;
    Ok((
        status,
        [(header::CONTENT_TYPE, "application/json;charset=utf-8")],
        body,
    )
        .into_response())
}

async fn fetch_json<T: DeserializeOwned>(
    state: &AppState,
    url: Url,
) -> Result<T, reqwest::Error> {
    state
        .client
        .get(url)
        .timeout(state.timeout)
        .send()
        .await?
        .error_for_status()?
        .json::<T>()
        .await
}

/// Downstream URL for `service_addr`: the caller's query parameters carried
/// over, `request-id` always stamped, `news-id` added when the request path
/// named one.
fn service_url(
    service_addr: &str,
    path: &str,
    params: &[(String, String)],
    req_id: &RequestId,
    news_id: Option<i64>,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("http://{service_addr}/{path}"))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            if key != "request-id" && key != "news-id" {
                query.append_pair(key, value);
            }
        }
        query.append_pair("request-id", &req_id.0);
        if let Some(id) = news_id {
            query.append_pair("news-id", &id.to_string());
        }
    }
    Ok(url)
}
