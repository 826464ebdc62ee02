//! Gateway service binary.

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

use vestnik_gateway::api::{self, AppState, ServiceRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vestnik_http::init_tracing();

    let config = vestnik_core::load_gateway_config()?;
    let registry = ServiceRegistry {
        news: config.news_addr,
        comments: config.comments_addr,
        commscheck: config.commscheck_addr,
    };

    let token = CancellationToken::new();
    let app = api::build_app(AppState::new(registry)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gateway started");

    axum::serve(listener, app)
        .with_graceful_shutdown(vestnik_http::shutdown_signal(token))
        .await?;

    tracing::warn!("gateway is shut down");
    Ok(())
}
