use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;

pub use config::{
    load_comments_config, load_commscheck_config, load_gateway_config, load_news_config,
    CommentsConfig, CommsCheckConfig, GatewayConfig, NewsConfig, RssConfig,
};

/// One news entry as it travels the whole pipeline: out of an RSS feed,
/// through the item channel, into the store and back out of the REST API.
///
/// `id` is 0 until the store assigns one. `link` is the dedup key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(rename = "pubTime", default)]
    pub pub_date: i64,
    #[serde(rename = "content", default)]
    pub description: String,
    pub link: String,
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "id: {}, title: {}, link: {}",
            self.id, self.title, self.link
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0:?} must be set")]
    MissingEnvVar(String),
    #[error("environment variable {var:?} is invalid: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("config file {path:?}: {reason}")]
    BadConfigFile { path: String, reason: String },
}
