//! Moderation service: gates comment writes on a banned-substring check.

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

mod api;
mod check;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vestnik_http::init_tracing();

    let config = vestnik_core::load_commscheck_config()?;

    let token = CancellationToken::new();
    let app = api::build_app();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "comments check service started");

    axum::serve(listener, app)
        .with_graceful_shutdown(vestnik_http::shutdown_signal(token))
        .await?;

    tracing::warn!("comments check service is shut down");
    Ok(())
}
