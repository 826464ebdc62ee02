//! Moderation REST API: one endpoint answering allowed/banned.

use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Deserialize;
use tower::ServiceBuilder;

use vestnik_http::{access_log, request_id};

use crate::check::banned;

/// Incoming comment; only the text matters to moderation, the rest of the
/// payload passes through untouched.
#[derive(Debug, Default, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub text: String,
}

pub fn build_app() -> Router {
    Router::new()
        .route("/comments", post(check_handler))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(access_log))
                .layer(axum::middleware::from_fn(request_id)),
        )
}

async fn check_handler(Json(comment): Json<Comment>) -> impl IntoResponse {
    if banned(&comment.text) {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "response": "banned" })),
        )
    } else {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "response": "allowed" })),
        )
    }
}
