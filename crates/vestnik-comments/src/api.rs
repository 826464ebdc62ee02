//! Comments REST API.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use tower::ServiceBuilder;

use vestnik_http::{access_log, request_id, ApiError, RequestId};

use crate::store::{Comment, CommentsStore};

#[derive(Clone)]
pub struct AppState {
    pub store: CommentsStore,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/comments", post(create_handler))
        .route("/comments", get(read_handler))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(access_log))
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn create_handler(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(comment): Json<Comment>,
) -> Result<impl IntoResponse, ApiError> {
    if comment.news_id == 0 && comment.reply_id == 0 {
        return Err(ApiError::bad_request(
            "invalid input: neither 'news_id' nor 'reply_id' is set",
        ));
    }

    let id = state
        .store
        .create(&comment)
        .await
        .map_err(|e| ApiError::internal(&req_id, e))?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn read_handler(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let raw = params
        .iter()
        .find(|(k, _)| k == "news-id")
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| {
            ApiError::bad_request("invalid input: 'news-id' not found in query parameters")
        })?;

    let news_id: i64 = raw
        .parse()
        .map_err(|_| ApiError::bad_request("invalid input: parsing 'news-id'"))?;

    let comments = state
        .store
        .read(news_id)
        .await
        .map_err(|e| ApiError::internal(&req_id, e))?;

    Ok(Json(comments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use sqlx::SqlitePool;
    use tower::ServiceExt;

    use crate::store::Author;

    fn app(pool: SqlitePool) -> Router {
        build_app(AppState {
            store: CommentsStore::new(pool),
        })
    }

    fn post_json(body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/comments")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn post_creates_comment_and_returns_id(pool: SqlitePool) {
        let app = app(pool);

        let body = serde_json::json!({
            "news_id": 1,
            "posted_at": 1_659_947_255_i64,
            "text": "первый!",
            "author": "alice",
        });
        let response = app.oneshot(post_json(&body)).await.expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(json["id"], 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn post_rejects_comment_without_news_and_reply(pool: SqlitePool) {
        let app = app(pool);

        let body = serde_json::json!({
            "posted_at": 1_659_947_255_i64,
            "text": "куда меня прикрепить?",
            "author": "alice",
        });
        let response = app.oneshot(post_json(&body)).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn get_returns_comments_for_news_in_order(pool: SqlitePool) {
        let store = CommentsStore::new(pool.clone());
        for (reply_id, text) in [(10, "a"), (1, "b"), (0, "c")] {
            store
                .create(&Comment {
                    news_id: 1,
                    reply_id,
                    posted_at: 1_659_947_255,
                    text: text.to_string(),
                    author: Author {
                        id: 0,
                        name: "alice".to_string(),
                    },
                    ..Comment::default()
                })
                .await
                .expect("create");
        }

        let response = app(pool)
            .oneshot(
                Request::builder()
                    .uri("/comments?news-id=1")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let comments: Vec<Comment> = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(comments.len(), 3);
        assert_eq!(
            comments.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn get_without_news_id_is_bad_request(pool: SqlitePool) {
        let response = app(pool)
            .oneshot(
                Request::builder()
                    .uri("/comments")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn get_with_unknown_news_returns_empty_list(pool: SqlitePool) {
        let response = app(pool)
            .oneshot(
                Request::builder()
                    .uri("/comments?news-id=42")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert_eq!(&bytes[..], b"[]");
    }
}
