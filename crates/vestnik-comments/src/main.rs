//! Comments service: stores and serves the flat comment lists the gateway
//! assembles into reply trees.

use std::net::SocketAddr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

mod api;
mod store;

const DB_CONNECT_ATTEMPTS: u32 = 5;
const DB_CONNECT_BACKOFF: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vestnik_http::init_tracing();

    let config = vestnik_core::load_comments_config()?;

    let store = store::CommentsStore::connect(
        &config.db_url,
        DB_CONNECT_ATTEMPTS,
        DB_CONNECT_BACKOFF,
    )
    .await?;

    let token = CancellationToken::new();
    let app = api::build_app(api::AppState { store });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "comments service started");

    axum::serve(listener, app)
        .with_graceful_shutdown(vestnik_http::shutdown_signal(token))
        .await?;

    tracing::warn!("comments service is shut down");
    Ok(())
}
