// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP server setup.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::create_router;
use crate::state::AppState;

/// Build the router with its middleware stack.
///
/// The game client is served from a different origin, so CORS stays open;
/// authentication happens per-request via bearer tokens, not cookies.
pub fn create_server(state: AppState) -> Router {
    create_router(state).layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Run the API server until ctrl-c.
pub async fn run_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let router = create_server(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Skydash API server listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install ctrl-c handler: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
