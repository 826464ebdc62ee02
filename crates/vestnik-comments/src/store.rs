//! SQLite-backed comment storage.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

const MAX_CONNECTIONS: u32 = 50;
const MAX_CONN_IDLE: Duration = Duration::from_secs(4 * 60);

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// One comment on a news item. `reply_id` of 0 marks a top-level comment;
/// either `news_id` or `reply_id` must be set. When only `reply_id` is,
/// the store derives `news_id` from the referenced comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub news_id: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub reply_id: i64,
    #[serde(default)]
    pub posted_at: i64,
    pub text: String,
    #[serde(flatten)]
    pub author: Author,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(rename = "author_id", default, skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(rename = "author", default)]
    pub name: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connect comments store: number of retries exceeded")]
    RetriesExceeded,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Clone)]
pub struct CommentsStore {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    author_id: i64,
    author_name: String,
    news_id: i64,
    reply_id: i64,
    text: String,
    timestamp: i64,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            news_id: row.news_id,
            reply_id: row.reply_id,
            posted_at: row.timestamp,
            text: row.text,
            author: Author {
                id: row.author_id,
                name: row.author_name,
            },
        }
    }
}

impl CommentsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the store, retrying `attempts` times at `backoff` intervals,
    /// and apply migrations. The database file is created when missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RetriesExceeded`] when every attempt fails, or
    /// [`StoreError::Migration`] when the schema cannot be applied.
    pub async fn connect(dsn: &str, attempts: u32, backoff: Duration) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(dsn)?
            .create_if_missing(true)
            .foreign_keys(true);

        for attempt in 1..=attempts {
            match SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .idle_timeout(MAX_CONN_IDLE)
                .connect_with(options.clone())
                .await
            {
                Ok(pool) => {
                    MIGRATOR.run(&pool).await?;
                    return Ok(Self { pool });
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "comments store connect failed");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        Err(StoreError::RetriesExceeded)
    }

    /// Insert one comment, returning the assigned id. Runs in a single
    /// transaction together with the author write: a zero author id inserts
    /// a new author and adopts the generated id, a non-zero id is upserted
    /// keeping the already-stored name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlx`] if any statement fails; nothing is
    /// written then.
    pub async fn create(&self, comment: &Comment) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let author_id = if comment.author.id == 0 {
            sqlx::query("INSERT INTO authors(name) VALUES (?1)")
                .bind(&comment.author.name)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid()
        } else {
            sqlx::query("INSERT INTO authors(id, name) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING")
                .bind(comment.author.id)
                .bind(&comment.author.name)
                .execute(&mut *tx)
                .await?;
            comment.author.id
        };

        let result = if comment.news_id == 0 && comment.reply_id != 0 {
            // Replies may omit news_id; inherit it from the parent comment.
            sqlx::query(
                "INSERT INTO comments(author_id, news_id, reply_id, text, timestamp) \
                 VALUES (?1, (SELECT news_id FROM comments WHERE id = ?2), ?2, ?3, ?4)",
            )
            .bind(author_id)
            .bind(comment.reply_id)
            .bind(&comment.text)
            .bind(comment.posted_at)
            .execute(&mut *tx)
            .await?
        } else {
            sqlx::query(
                "INSERT INTO comments(author_id, news_id, reply_id, text, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(author_id)
            .bind(comment.news_id)
            .bind(comment.reply_id)
            .bind(&comment.text)
            .bind(comment.posted_at)
            .execute(&mut *tx)
            .await?
        };

        let id = result.last_insert_rowid();
        tx.commit().await?;
        Ok(id)
    }

    /// All comments on one news item, in insertion order. Returns an empty
    /// list when there are none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlx`] if the query fails.
    pub async fn read(&self, news_id: i64) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT c.id, a.id AS author_id, a.name AS author_name, \
                    c.news_id, c.reply_id, c.text, c.timestamp \
             FROM comments AS c JOIN authors AS a ON c.author_id = a.id \
             WHERE c.news_id = ?1 \
             ORDER BY c.id",
        )
        .bind(news_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }
}
