//! Per-service configuration, read from the environment.
//!
//! Every loader goes through an injectable lookup function so tests can run
//! against a plain `HashMap` instead of mutating the process environment.

use std::env::VarError;
use std::path::Path;

use serde::Deserialize;

use crate::ConfigError;

/// News service settings: listen port and the Postgres news store.
#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub port: u16,
    pub db_url: String,
}

/// Comments service settings: listen port and the SQLite DSN.
#[derive(Debug, Clone)]
pub struct CommentsConfig {
    pub port: u16,
    pub db_url: String,
}

/// Moderation service settings.
#[derive(Debug, Clone)]
pub struct CommsCheckConfig {
    pub port: u16,
}

/// Gateway settings: listen port plus the host:port of each downstream
/// service. The addresses seed the service registry at startup and are
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub news_addr: String,
    pub comments_addr: String,
    pub commscheck_addr: String,
}

/// RSS polling config, read from the JSON file passed on the command line:
/// `{ "rss": ["https://...", ...], "request_period": <minutes> }`.
#[derive(Debug, Clone, Deserialize)]
pub struct RssConfig {
    #[serde(rename = "rss")]
    pub links: Vec<String>,
    #[serde(rename = "request_period")]
    pub period_minutes: u64,
}

/// Load [`NewsConfig`] from the process environment (after `dotenvy`).
///
/// # Errors
///
/// Returns [`ConfigError`] if `NEWS_PORT` or `NEWS_DB_URL` is missing, or
/// the port does not parse.
pub fn load_news_config() -> Result<NewsConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_news_config(|key| std::env::var(key))
}

/// Load [`CommentsConfig`] from the process environment.
///
/// # Errors
///
/// Returns [`ConfigError`] if `COMMENTS_PORT` or `DB_URL` is missing, or the
/// port does not parse.
pub fn load_comments_config() -> Result<CommentsConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_comments_config(|key| std::env::var(key))
}

/// Load [`CommsCheckConfig`] from the process environment.
///
/// # Errors
///
/// Returns [`ConfigError`] if `COMMSCHECK_PORT` is missing or invalid.
pub fn load_commscheck_config() -> Result<CommsCheckConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_commscheck_config(|key| std::env::var(key))
}

/// Load [`GatewayConfig`] from the process environment.
///
/// # Errors
///
/// Returns [`ConfigError`] if any of `GATEWAY_PORT`, `NEWS_ADDR`,
/// `COMMENTS_ADDR`, `COMMENTS_CHECK_ADDR` is missing, or the port is invalid.
pub fn load_gateway_config() -> Result<GatewayConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_gateway_config(|key| std::env::var(key))
}

fn build_news_config<F>(lookup: F) -> Result<NewsConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    Ok(NewsConfig {
        port: require_port(&lookup, "NEWS_PORT")?,
        db_url: require(&lookup, "NEWS_DB_URL")?,
    })
}

fn build_comments_config<F>(lookup: F) -> Result<CommentsConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    Ok(CommentsConfig {
        port: require_port(&lookup, "COMMENTS_PORT")?,
        db_url: require(&lookup, "DB_URL")?,
    })
}

fn build_commscheck_config<F>(lookup: F) -> Result<CommsCheckConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    Ok(CommsCheckConfig {
        port: require_port(&lookup, "COMMSCHECK_PORT")?,
    })
}

fn build_gateway_config<F>(lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    Ok(GatewayConfig {
        port: require_port(&lookup, "GATEWAY_PORT")?,
        news_addr: require(&lookup, "NEWS_ADDR")?,
        comments_addr: require(&lookup, "COMMENTS_ADDR")?,
        commscheck_addr: require(&lookup, "COMMENTS_CHECK_ADDR")?,
    })
}

fn require<F>(lookup: &F, var: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
}

fn require_port<F>(lookup: &F, var: &str) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let raw = require(lookup, var)?;
    raw.parse::<u16>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

impl RssConfig {
    /// Read and validate the polling config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BadConfigFile`] if the file cannot be read or
    /// parsed, the feed list is empty, or `request_period` is zero.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bad = |reason: String| ConfigError::BadConfigFile {
            path: path.display().to_string(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| bad(e.to_string()))?;
        let config: RssConfig = serde_json::from_str(&raw).map_err(|e| bad(e.to_string()))?;

        if config.links.is_empty() {
            return Err(bad("feed list \"rss\" is empty".to_string()));
        }
        if config.period_minutes == 0 {
            return Err(bad("\"request_period\" must be at least 1 minute".to_string()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn news_config_fails_without_db_url() {
        let mut map = HashMap::new();
        map.insert("NEWS_PORT", "8080");
        let result = build_news_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "NEWS_DB_URL"),
            "expected MissingEnvVar(NEWS_DB_URL), got: {result:?}"
        );
    }

    #[test]
    fn news_config_rejects_bad_port() {
        let mut map = HashMap::new();
        map.insert("NEWS_PORT", "not-a-port");
        map.insert("NEWS_DB_URL", "postgres://localhost/news");
        let result = build_news_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "NEWS_PORT"),
            "expected InvalidEnvVar(NEWS_PORT), got: {result:?}"
        );
    }

    #[test]
    fn news_config_succeeds_with_all_vars() {
        let mut map = HashMap::new();
        map.insert("NEWS_PORT", "8080");
        map.insert("NEWS_DB_URL", "postgres://localhost/news");
        let cfg = build_news_config(lookup_from_map(&map)).expect("config");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.db_url, "postgres://localhost/news");
    }

    #[test]
    fn gateway_config_requires_every_service_addr() {
        let mut map = HashMap::new();
        map.insert("GATEWAY_PORT", "8080");
        map.insert("NEWS_ADDR", "localhost:8081");
        map.insert("COMMENTS_ADDR", "localhost:8082");
        let result = build_gateway_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "COMMENTS_CHECK_ADDR"),
            "expected MissingEnvVar(COMMENTS_CHECK_ADDR), got: {result:?}"
        );
    }

    fn write_temp_config(contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "vestnik-rss-config-{}-{:p}.json",
            std::process::id(),
            contents
        ));
        let mut f = std::fs::File::create(&path).expect("create temp config");
        f.write_all(contents.as_bytes()).expect("write temp config");
        path
    }

    #[test]
    fn rss_config_parses_links_and_period() {
        let path = write_temp_config(
            r#"{"rss": ["https://habr.com/ru/rss/hub/go/all/?fl=ru"], "request_period": 5}"#,
        );
        let cfg = RssConfig::from_file(&path).expect("config");
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.links.len(), 1);
        assert_eq!(cfg.period_minutes, 5);
    }

    #[test]
    fn rss_config_rejects_empty_feed_list() {
        let path = write_temp_config(r#"{"rss": [], "request_period": 5}"#);
        let result = RssConfig::from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::BadConfigFile { .. })));
    }

    #[test]
    fn rss_config_rejects_zero_period() {
        let path = write_temp_config(r#"{"rss": ["https://x.test/rss"], "request_period": 0}"#);
        let result = RssConfig::from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::BadConfigFile { .. })));
    }

    #[test]
    fn rss_config_missing_file_is_an_error() {
        let result = RssConfig::from_file("/nonexistent/vestnik.json");
        assert!(matches!(result, Err(ConfigError::BadConfigFile { .. })));
    }
}
