// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Live MCP session bookkeeping in front of the streamable HTTP transport.
//!
//! The transport mints session ids on initialize; the guard learns them from the response
//! header and from then on refuses any id it has not seen with a JSON-RPC "Session not found"
//! error, so stale clients get a clear answer instead of reaching a transport that is gone.
//! Requests that carry no id at all are only let through as POSTs, since only an initialize
//! can open a session.
//!
//! Sessions the transport closes on its own (idle keep-alive, worker exit) are dropped by
//! [`spawn_sweeper`], which compares the registry against the session manager's live set.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const SESSION_HEADER: &str = "mcp-session-id";

/// JSON-RPC server error code used for unknown sessions.
pub const SESSION_NOT_FOUND_CODE: i64 = -32001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub created_at: DateTime<Utc>,
    pub requests: u64,
}

impl SessionEntry {
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: &str) {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(id.to_owned())
            .or_insert_with(|| SessionEntry { created_at: Utc::now(), requests: 1 });
    }

    /// Counts a request against `id`; `false` if the id is unknown.
    pub async fn touch(&self, id: &str) -> bool {
        match self.sessions.lock().await.get_mut(id) {
            Some(entry) => {
                entry.requests += 1;
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.lock().await.remove(id).is_some()
    }

    /// Keeps only the ids `is_live` accepts and returns the dropped entries.
    pub async fn retain(
        &self,
        mut is_live: impl FnMut(&str) -> bool,
    ) -> Vec<(String, SessionEntry)> {
        let mut sessions = self.sessions.lock().await;
        let closed: Vec<String> = sessions.keys().filter(|id| !is_live(id)).cloned().collect();
        closed
            .into_iter()
            .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry)))
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<SessionEntry> {
        self.sessions.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers.get(SESSION_HEADER).and_then(|value| value.to_str().ok()).map(str::to_owned)
}

pub fn session_not_found() -> Response {
    let body = json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": {
            "code": SESSION_NOT_FOUND_CODE,
            "message": "Session not found",
            "data": { "hint": "re-initialize without an mcp-session-id header" },
        },
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// Drops registered ids the session manager no longer holds; returns how many were dropped.
pub async fn sweep_closed(registry: &SessionRegistry, manager: &LocalSessionManager) -> usize {
    let live: HashSet<String> =
        manager.sessions.read().await.keys().map(|id| id.to_string()).collect();
    let closed = registry.retain(|id| live.contains(id)).await;
    for (id, entry) in &closed {
        tracing::info!(
            session = %id,
            age_secs = entry.age_secs(),
            requests = entry.requests,
            "session closed by transport"
        );
    }
    closed.len()
}

/// Runs [`sweep_closed`] every `every` until `shutdown` resolves.
pub fn spawn_sweeper(
    registry: SessionRegistry,
    manager: Arc<LocalSessionManager>,
    every: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticks.tick() => {
                    sweep_closed(&registry, &manager).await;
                }
            }
        }
    })
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn guard(
    State(registry): State<SessionRegistry>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();

    let Some(id) = session_id(request.headers()) else {
        if method != Method::POST {
            tracing::warn!(%method, "request without a session id");
            return session_not_found();
        }
        let response = next.run(request).await;
        let status = response.status();
        match session_id(response.headers()) {
            Some(minted) => {
                registry.register(&minted).await;
                tracing::info!(session = %minted, "session opened");
            }
            None if !status.is_success() => {
                tracing::warn!(%status, "request without a session id was not an initialize");
                return session_not_found();
            }
            None => {}
        }
        return response;
    };

    if !registry.touch(&id).await {
        tracing::warn!(session = %id, %method, "request for unknown session");
        return session_not_found();
    }

    let response = next.run(request).await;
    let status = response.status();
    if method == Method::DELETE && status.is_success() {
        if let Some(entry) = registry.get(&id).await {
            tracing::info!(session = %id, age_secs = entry.age_secs(), "session closed");
        }
        registry.remove(&id).await;
    } else if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND) {
        registry.remove(&id).await;
        tracing::info!(session = %id, %status, "session dropped by transport");
    }
    response
}
