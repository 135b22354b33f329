// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A2A JSON-RPC transport over HTTP.
//!
//! Routes:
//! - `GET /.well-known/agent.json` and `/.well-known/agent-card.json` - agent card
//! - `GET /health` - liveness
//! - `POST /` - JSON-RPC `message/send`
//!
//! Each request runs its own workflow; the engine is shared immutably.

pub mod protocol;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use protocol::{
    extract_params, extract_text, AgentCard, JsonRpcError, JsonRpcRequest, JsonRpcResponse, Task,
    TaskState,
};

use crate::error::ServerError;
use crate::telemetry::TaskId;
use crate::workflow::WorkflowEngine;
use protocol::{codes, METHOD_MESSAGE_SEND};

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub card: Arc<AgentCard>,
}

impl AppState {
    pub fn new(engine: Arc<WorkflowEngine>, card: AgentCard) -> Self {
        Self {
            engine,
            card: Arc::new(card),
        }
    }
}

/// Build the axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_jsonrpc))
        .route("/.well-known/agent.json", get(agent_card))
        .route("/.well-known/agent-card.json", get(agent_card))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    info!("A2A server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Serve on an already bound listener.
pub async fn serve_with_listener(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// -- Handlers --

async fn health_check() -> &'static str {
    "ok"
}

async fn agent_card(State(state): State<AppState>) -> Json<AgentCard> {
    Json(state.card.as_ref().clone())
}

async fn handle_jsonrpc(
    State(state): State<AppState>,
    payload: Result<Json<JsonRpcRequest>, JsonRejection>,
) -> Json<JsonRpcResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return Json(JsonRpcResponse::error(
                Value::Null,
                codes::PARSE_ERROR,
                format!("Parse error: {}", rejection.body_text()),
            ));
        }
    };

    if request.method != METHOD_MESSAGE_SEND {
        return Json(JsonRpcResponse::method_not_found(request.id, &request.method));
    }

    let Some(text) = extract_text(request.params.as_ref()) else {
        return Json(JsonRpcResponse::error(
            request.id,
            codes::INVALID_PARAMS,
            "No text in message",
        ));
    };

    let (question, repo_path) = extract_params(&text);
    let Some(repo_path) = repo_path else {
        return Json(JsonRpcResponse::result(request.id, Task::missing_repo_path()));
    };

    let task_id = TaskId::new();
    info!(task_id = %task_id, query = %question, repo = %repo_path, "A2A request");

    let outcome = state.engine.run(&question, &repo_path, task_id).await;

    info!(
        task_id = %outcome.task_id,
        status = %outcome.status,
        "A2A response sent"
    );
    Json(JsonRpcResponse::result(request.id, Task::from_outcome(&outcome)))
}
