use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use log::info;
use tokio::net::TcpListener;

use crate::refresh::Refresher;

/// Builds the trigger API.
///
/// One route: `GET /refresh` starts a run if none is active and says
/// so either way. Per-item detail never surfaces here; callers watch
/// the run log or healthchecks instead.
pub fn router(refresher: Arc<Refresher>) -> Router {
    Router::new()
        .route("/refresh", get(trigger_refresh))
        .with_state(refresher)
}

async fn trigger_refresh(State(refresher): State<Arc<Refresher>>) -> &'static str {
    if refresher.spawn_run() {
        "Refreshing data."
    } else {
        "Data refresh already in progress."
    }
}

/// Binds the trigger API and serves it forever.
pub async fn serve(refresher: Arc<Refresher>, port: u16) -> anyhow::Result<()> {
    let bind_addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!("trigger endpoint listening on http://{bind_addr}/refresh");

    axum::serve(listener, router(refresher)).await?;
    Ok(())
}
