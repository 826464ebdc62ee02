//! News service: polls RSS feeds into the store and serves filtered reads.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use vestnik_core::RssConfig;
use vestnik_feed::Poller;

mod api;

const DB_CONNECT_ATTEMPTS: u32 = 10;
const DB_CONNECT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "vestnik-news", about = "RSS news aggregation service")]
struct Args {
    /// Path to the polling config: {"rss": [url, ...], "request_period": minutes}
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    vestnik_http::init_tracing();

    let config = vestnik_core::load_news_config()?;
    let rss = RssConfig::from_file(&args.config)?;

    let pool =
        vestnik_db::connect_pool_with_retries(&config.db_url, DB_CONNECT_ATTEMPTS, DB_CONNECT_BACKOFF)
            .await?;
    vestnik_db::run_migrations(&pool).await?;

    let token = CancellationToken::new();

    let poller = Poller::new()?;
    let interval = Duration::from_secs(rss.period_minutes * 60);
    let (items, mut errors) = poller.poll(token.clone(), interval, &rss.links);
    tracing::info!(
        feeds = rss.links.len(),
        period_minutes = rss.period_minutes,
        "rss polling started"
    );

    // Drain the pipeline's error channel; deadline/cancel noise stays quiet.
    let error_logger = tokio::spawn(async move {
        while let Some(err) = errors.recv().await {
            if !err.is_benign() {
                tracing::error!(error = %err, "feed pipeline error");
            }
        }
    });

    let writer = tokio::spawn({
        let pool = pool.clone();
        let token = token.clone();
        async move {
            match vestnik_db::write_to_storage(&pool, token, items).await {
                Ok(written) => tracing::info!(written, "news writer stopped"),
                Err(e) => tracing::error!(error = %e, "news writer failed"),
            }
        }
    });

    let app = api::build_app(api::AppState { pool });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "news service started");

    axum::serve(listener, app)
        .with_graceful_shutdown(vestnik_http::shutdown_signal(token.clone()))
        .await?;

    // The signal handler cancelled the token; wind the pipeline down.
    token.cancel();
    writer.await.ok();
    error_logger.await.ok();
    tracing::warn!("news service is shut down");
    Ok(())
}
