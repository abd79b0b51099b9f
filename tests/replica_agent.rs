//! Integration tests for the replica agent
//!
//! Runs the agent in-process against a mock controller and exercises
//! the full write path: placement resolution, WAL append, local commit,
//! then reads, copy, and the failure ordering (WAL survives a commit
//! that rolls back).

use axum::routing::get;
use axum::{Json, Router};
use std::path::Path;
use std::sync::Arc;
use stratakv::common::types::{Record, Schema, ShardServersRequest, ShardServersResponse};
use stratakv::replica::http::{create_router, AgentState};
use stratakv::replica::store::ShardStore;
use stratakv::replica::wal::Wal;
use tempfile::TempDir;
use tokio::net::TcpListener;

const AGENT_ID: i64 = 100001;

/// Controller stub: every shard reports the given placement.
async fn spawn_mock_controller(server_ids: Vec<i64>, primary: i64) -> String {
    let app = Router::new().route(
        "/shard_servers",
        get(move |Json(_req): Json<ShardServersRequest>| {
            let resp = ShardServersResponse {
                server_ids: server_ids.clone(),
                primary,
            };
            async move { Json(resp) }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_agent(controller_url: String, dir: &Path) -> String {
    let store = Arc::new(ShardStore::open(dir.join("shards.db")).unwrap());
    let wal = Arc::new(Wal::new(dir.join("wal")));
    let state = AgentState {
        replica_id: AGENT_ID,
        store,
        wal,
        controller_url,
        replica_port: 3000,
        client: reqwest::Client::new(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn record(id: i64, name: &str, marks: i64) -> Record {
    Record {
        stud_id: id,
        stud_name: name.to_string(),
        stud_marks: marks,
    }
}

async fn configure(client: &reqwest::Client, agent: &str, shards: &[&str]) {
    let resp = client
        .post(format!("{}/config", agent))
        .json(&serde_json::json!({
            "schema": Schema::student(),
            "shards": shards,
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

async fn wal_length(client: &reqwest::Client, agent: &str) -> i64 {
    client
        .get(format!("{}/wal_length", agent))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_write_then_read_roundtrip() {
    let dir = TempDir::new().unwrap();
    let controller = spawn_mock_controller(vec![AGENT_ID], AGENT_ID).await;
    let agent = spawn_agent(controller, dir.path()).await;
    let client = reqwest::Client::new();

    configure(&client, &agent, &["sh1"]).await;

    let resp = client
        .post(format!("{}/write", agent))
        .json(&serde_json::json!({
            "shard": "sh1",
            "data": [record(1, "a", 50), record(5, "b", 60)],
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let body: serde_json::Value = client
        .post(format!("{}/read", agent))
        .json(&serde_json::json!({
            "shard": "sh1",
            "Stud_id": {"low": 0, "high": 100},
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "success");
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["Stud_id"], 1);
    assert_eq!(rows[0]["Stud_name"], "a");

    // One write request, one WAL record
    assert_eq!(wal_length(&client, &agent).await, 1);
}

#[tokio::test]
async fn test_wal_survives_failed_commit() {
    let dir = TempDir::new().unwrap();
    let controller = spawn_mock_controller(vec![AGENT_ID], AGENT_ID).await;
    let agent = spawn_agent(controller, dir.path()).await;
    let client = reqwest::Client::new();

    configure(&client, &agent, &["sh1"]).await;

    // Write into a shard whose table was never created: the WAL append
    // lands, the commit fails, and no partial state persists.
    let resp = client
        .post(format!("{}/write", agent))
        .json(&serde_json::json!({
            "shard": "sh_missing",
            "data": [record(1, "a", 50)],
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_server_error());
    assert_eq!(wal_length(&client, &agent).await, 1);

    // The configured shard is untouched
    let body: serde_json::Value = client
        .post(format!("{}/read", agent))
        .json(&serde_json::json!({
            "shard": "sh1",
            "Stud_id": {"low": 0, "high": 100},
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_secondary_commits_without_fanout() {
    let dir = TempDir::new().unwrap();
    // Some other replica is primary; this agent must commit locally
    // without trying to reach it.
    let controller = spawn_mock_controller(vec![AGENT_ID, 999_999], 999_999).await;
    let agent = spawn_agent(controller, dir.path()).await;
    let client = reqwest::Client::new();

    configure(&client, &agent, &["sh1"]).await;

    let resp = client
        .post(format!("{}/write", agent))
        .json(&serde_json::json!({
            "shard": "sh1",
            "data": [record(7, "c", 70)],
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let body: serde_json::Value = client
        .post(format!("{}/read", agent))
        .json(&serde_json::json!({
            "shard": "sh1",
            "Stud_id": {"low": 7, "high": 7},
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_and_delete() {
    let dir = TempDir::new().unwrap();
    let controller = spawn_mock_controller(vec![AGENT_ID], AGENT_ID).await;
    let agent = spawn_agent(controller, dir.path()).await;
    let client = reqwest::Client::new();

    configure(&client, &agent, &["sh1"]).await;

    client
        .post(format!("{}/write", agent))
        .json(&serde_json::json!({
            "shard": "sh1",
            "data": [record(1, "a", 50)],
        }))
        .send()
        .await
        .unwrap();

    let resp = client
        .put(format!("{}/update", agent))
        .json(&serde_json::json!({
            "shard": "sh1",
            "Stud_id": 1,
            "data": record(1, "a", 95),
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Data entry for Stud_id:1 updated");

    let resp = client
        .delete(format!("{}/delete", agent))
        .json(&serde_json::json!({
            "shard": "sh1",
            "Stud_id": 1,
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let body: serde_json::Value = client
        .post(format!("{}/read", agent))
        .json(&serde_json::json!({
            "shard": "sh1",
            "Stud_id": {"low": 0, "high": 100},
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // write + update + delete = three WAL records
    assert_eq!(wal_length(&client, &agent).await, 3);
}

#[tokio::test]
async fn test_copy_returns_full_row_sets() {
    let dir = TempDir::new().unwrap();
    let controller = spawn_mock_controller(vec![AGENT_ID], AGENT_ID).await;
    let agent = spawn_agent(controller, dir.path()).await;
    let client = reqwest::Client::new();

    configure(&client, &agent, &["sh1", "sh2"]).await;

    client
        .post(format!("{}/write", agent))
        .json(&serde_json::json!({
            "shard": "sh1",
            "data": [record(1, "a", 50), record(2, "b", 60)],
        }))
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = client
        .get(format!("{}/copy", agent))
        .json(&serde_json::json!({"shards": ["sh1", "sh2"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "success");
    assert_eq!(body["sh1"].as_array().unwrap().len(), 2);
    assert_eq!(body["sh2"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_heartbeat_and_config_message() {
    let dir = TempDir::new().unwrap();
    let controller = spawn_mock_controller(vec![AGENT_ID], AGENT_ID).await;
    let agent = spawn_agent(controller, dir.path()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/heartbeat", agent))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client
        .post(format!("{}/config", agent))
        .json(&serde_json::json!({
            "schema": Schema::student(),
            "shards": ["sh1", "sh2"],
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Server100001:sh1, Server100001:sh2 configured"
    );
    assert_eq!(body["status"], "success");
}
