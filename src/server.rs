//! HTTP surface.
//!
//! Three endpoints per project: trigger a sync (SSE progress stream),
//! pre-flight the sync config, and drop the cached workspace. The pipeline
//! task is spawned detached from the connection, so a client disconnect
//! never interrupts an in-flight push.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::paths::is_valid_project_id;
use crate::progress::ProgressStreamer;
use crate::run::SyncOrchestrator;
use crate::workspace::GitWorkspaceCache;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub cache: Arc<GitWorkspaceCache>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/project/:project_id/github-sync/push", post(push_sync))
        .route(
            "/project/:project_id/github-sync/check-config",
            get(check_config),
        )
        .route(
            "/project/:project_id/github-sync/remove-temp-git-dir",
            post(remove_temp_git_dir),
        )
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct PushRequest {
    commit_message: Option<String>,
}

async fn push_sync(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    body: Option<Json<PushRequest>>,
) -> Response {
    if !is_valid_project_id(&project_id) {
        return (StatusCode::BAD_REQUEST, "invalid project id").into_response();
    }
    let commit_message = body.and_then(|Json(req)| req.commit_message);

    let (progress, rx) = ProgressStreamer::channel();
    let orchestrator = state.orchestrator.clone();
    // Detached from the connection: if the subscriber goes away the run
    // still completes, keeping cache and remote state consistent.
    tokio::spawn(async move {
        orchestrator
            .run(&project_id, commit_message.as_deref(), &progress)
            .await;
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let line = rx.recv().await?;
        Some((Ok::<Event, Infallible>(Event::default().data(line)), rx))
    });
    Sse::new(stream).into_response()
}

#[derive(Debug, Serialize)]
struct CheckConfigResponse {
    #[serde(rename = "ifConfigFileValid")]
    if_config_file_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_reason: Option<String>,
}

async fn check_config(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Response {
    if !is_valid_project_id(&project_id) {
        return (StatusCode::BAD_REQUEST, "invalid project id").into_response();
    }
    let probe = state.orchestrator.probe_config(&project_id).await;
    Json(CheckConfigResponse {
        if_config_file_valid: probe.valid,
        fail_reason: probe.reason,
    })
    .into_response()
}

async fn remove_temp_git_dir(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Response {
    if !is_valid_project_id(&project_id) {
        return (StatusCode::BAD_REQUEST, "invalid project id").into_response();
    }
    match state.cache.remove(&project_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::error!(project_id, error = %e, "failed to remove workspace cache");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
