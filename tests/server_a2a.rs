// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A2A server tests over a real HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use repo_expert::invoker::{AgentInvocationResult, AgentInvoker, InvocationRequest};
use repo_expert::server::protocol::{codes, MISSING_REPO_PATH_HINT, PROTOCOL_VERSION};
use repo_expert::server::{serve_with_listener, AgentCard, AppState};
use repo_expert::trace::{MemoryTraceSink, StageKind, TraceSink};
use repo_expert::workflow::{WorkflowConfig, WorkflowEngine};

/// Rejects the first draft, accepts the second.
struct TwoRoundInvoker;

#[async_trait]
impl AgentInvoker for TwoRoundInvoker {
    async fn invoke(&self, request: &InvocationRequest, _sink: &dyn TraceSink) -> AgentInvocationResult {
        let text = match (request.trace.stage, request.trace.iteration) {
            (StageKind::Generator, 1) => "draft".to_string(),
            (StageKind::Generator, _) => format!("answer for {}", request.repository_path.display()),
            (StageKind::Validator, 1) => "PARTIAL: expand".to_string(),
            (StageKind::Validator, _) => "VALID".to_string(),
        };
        AgentInvocationResult::succeeded(text, 0.2, Some(0), Some(0.5))
    }

    fn name(&self) -> &str {
        "two-round"
    }
}

struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    sink: Arc<MemoryTraceSink>,
}

impl TestServer {
    async fn start() -> Self {
        let sink = Arc::new(MemoryTraceSink::new());
        let engine = WorkflowEngine::new(
            Arc::new(TwoRoundInvoker),
            WorkflowConfig::default(),
            Arc::clone(&sink) as Arc<dyn TraceSink>,
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(Arc::new(engine), AgentCard::new(format!("http://{addr}")));
        tokio::spawn(serve_with_listener(listener, state));

        Self {
            addr,
            client: reqwest::Client::new(),
            sink,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn rpc(&self, body: Value) -> Value {
        self.client
            .post(self.url("/"))
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

fn message_send(text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "message/send",
        "params": {
            "message": {
                "role": "user",
                "parts": [{"kind": "text", "text": text}]
            }
        }
    })
}

#[tokio::test]
async fn test_agent_card_on_both_paths() {
    let server = TestServer::start().await;

    for path in ["/.well-known/agent.json", "/.well-known/agent-card.json"] {
        let card: Value = server
            .client
            .get(server.url(path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(card["name"], "repo_expert");
        assert_eq!(card["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(card["url"], format!("http://{}", server.addr));
        assert_eq!(card["skills"][0]["id"], "analyze_repo");
    }
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;
    let response = server.client.get(server.url("/health")).send().await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_unknown_method() {
    let server = TestServer::start().await;
    let mut body = message_send("hi repo_path: /tmp");
    body["method"] = json!("tasks/get");

    let response = server.rpc(body).await;
    assert_eq!(response["id"], 7);
    assert_eq!(response["error"]["code"], codes::METHOD_NOT_FOUND);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = TestServer::start().await;
    let response: Value = server
        .client
        .post(server.url("/"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], codes::PARSE_ERROR);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn test_message_without_text() {
    let server = TestServer::start().await;
    let body = json!({
        "jsonrpc": "2.0",
        "id": "abc",
        "method": "message/send",
        "params": {"message": {"parts": []}}
    });

    let response = server.rpc(body).await;
    assert_eq!(response["id"], "abc");
    assert_eq!(response["error"]["code"], codes::INVALID_PARAMS);
    assert_eq!(response["error"]["message"], "No text in message");
}

#[tokio::test]
async fn test_missing_repo_path_runs_nothing() {
    let server = TestServer::start().await;

    let response = server.rpc(message_send("What is this?")).await;
    let task = &response["result"];
    assert_eq!(task["kind"], "task");
    assert_eq!(task["status"]["state"], "failed");
    assert_eq!(task["artifacts"][0]["parts"][0]["text"], MISSING_REPO_PATH_HINT);
    assert!(server.sink.is_empty());
}

#[tokio::test]
async fn test_completed_task() {
    let server = TestServer::start().await;
    let repo = TempDir::new().unwrap();
    let text = format!("Summarize the layout. REPO_PATH: {}", repo.path().display());

    let response = server.rpc(message_send(&text)).await;
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 7);
    assert!(response.get("error").is_none());

    let task = &response["result"];
    assert_eq!(task["status"]["state"], "completed");
    let answer = task["artifacts"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(answer.starts_with("answer for "));
    assert_eq!(task["metadata"]["workflowStatus"], "VALID");
    assert_eq!(task["metadata"]["iterations"], 2);
    assert_eq!(task["metadata"]["totalCostUsd"], 2.0);

    let task_id = task["id"].as_str().unwrap();
    assert!(!server
        .sink
        .events_for(&repo_expert::TaskId::from(task_id))
        .is_empty());
}

#[tokio::test]
async fn test_bad_repository_is_failed_task() {
    let server = TestServer::start().await;
    let repo = TempDir::new().unwrap();
    let missing = repo.path().join("gone");
    let text = format!("What is it? repo_path: {}", missing.display());

    let response = server.rpc(message_send(&text)).await;
    let task = &response["result"];
    assert_eq!(task["status"]["state"], "failed");
    assert_eq!(task["metadata"]["workflowStatus"], "FAILED");
    assert!(task["artifacts"][0]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .starts_with("Error:"));
}
