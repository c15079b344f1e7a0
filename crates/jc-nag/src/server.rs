//! HTTP trigger: each request is one independent run.
//!
//! Requests addressed to a local host run in sandbox mode unless
//! `?sandbox=false` says otherwise; `?sandbox=true` forces sandbox anywhere.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use crate::config::{NagConfig, RunMode};
use crate::run::Nagger;

#[derive(Clone)]
struct TriggerState {
    config: Arc<NagConfig>,
    dry_run: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerQuery {
    #[serde(default)]
    pub sandbox: Option<String>,
}

pub fn router(config: Arc<NagConfig>, dry_run: bool) -> Router {
    Router::new()
        .route("/", get(trigger))
        .route("/run", get(trigger))
        .route("/health", get(health))
        .with_state(TriggerState { config, dry_run })
}

pub async fn serve(config: NagConfig, bind: &str, dry_run: bool) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let local_addr = listener.local_addr()?;
    info!("jc-nag trigger listening on http://{local_addr}");
    axum::serve(listener, router(Arc::new(config), dry_run)).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn trigger(
    State(state): State<TriggerState>,
    headers: HeaderMap,
    Query(query): Query<TriggerQuery>,
) -> Response {
    let mode = resolve_mode(&headers, &query);
    let nagger = match Nagger::from_config(&state.config, mode, state.dry_run) {
        Ok(nagger) => nagger,
        Err(e) => return failure(format!("{e:#}")),
    };
    match nagger.run_once(Utc::now()).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            error!(error = %e, "Run failed");
            failure(e.to_string())
        }
    }
}

fn failure(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Explicit `sandbox` query flag first, then the `Host` header.
pub fn resolve_mode(headers: &HeaderMap, query: &TriggerQuery) -> RunMode {
    if let Some(flag) = query.sandbox.as_deref().and_then(parse_flag) {
        return if flag {
            RunMode::Sandbox
        } else {
            RunMode::Production
        };
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if is_local_host(host) {
        RunMode::Sandbox
    } else {
        RunMode::Production
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn is_local_host(host: &str) -> bool {
    let name = if host.starts_with('[') {
        host.split(']').next().map(|h| format!("{h}]"))
    } else {
        host.split(':').next().map(str::to_string)
    }
    .unwrap_or_default();
    matches!(name.as_str(), "localhost" | "127.0.0.1" | "[::1]")
}
