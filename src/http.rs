// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! HTTP front end: the streamable MCP transport at `/mcp` behind the session guard, plus a
//! `/health` probe.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use rmcp::transport::{
    streamable_http_server::session::local::{LocalSessionManager, SessionConfig},
    StreamableHttpServerConfig, StreamableHttpService,
};
use serde_json::{json, Value};

use crate::mcp::InsightMcp;
use crate::session::{guard, spawn_sweeper, SessionRegistry};

pub const SERVICE_NAME: &str = "csv-insight";

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Session manager whose sessions close after `keep_alive` without traffic.
pub fn session_manager(keep_alive: Duration) -> Arc<LocalSessionManager> {
    Arc::new(LocalSessionManager {
        sessions: Default::default(),
        session_config: SessionConfig { keep_alive: Some(keep_alive), ..SessionConfig::default() },
    })
}

pub fn router(
    mcp: InsightMcp,
    registry: SessionRegistry,
    session_manager: Arc<LocalSessionManager>,
    config: StreamableHttpServerConfig,
) -> Router {
    let mcp_service = StreamableHttpService::new(move || Ok(mcp.clone()), session_manager, config);

    let mcp_routes = Router::new()
        .nest_service("/mcp", mcp_service)
        .layer(axum::middleware::from_fn_with_state(registry, guard));

    Router::new().route("/health", get(health)).merge(mcp_routes)
}

/// Serves until `shutdown` resolves, then closes open MCP sessions.
///
/// Sessions idle for longer than `keep_alive` are closed by the transport and forgotten by the
/// registry on the next sweep.
pub async fn serve(
    listener: tokio::net::TcpListener,
    mcp: InsightMcp,
    keep_alive: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let config =
        StreamableHttpServerConfig { stateful_mode: true, ..StreamableHttpServerConfig::default() };
    let cancel = config.cancellation_token.clone();
    let registry = SessionRegistry::new();
    let manager = session_manager(keep_alive);
    let sweeper_cancel = cancel.clone();
    spawn_sweeper(
        registry.clone(),
        manager.clone(),
        keep_alive.min(MAX_SWEEP_INTERVAL),
        async move { sweeper_cancel.cancelled().await },
    );
    let router = router(mcp, registry, manager, config);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "serving MCP at http://{addr}/mcp");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutting down");
            cancel.cancel();
        })
        .await
}
