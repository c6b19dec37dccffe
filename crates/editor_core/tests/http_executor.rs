use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use editor_core::{
    CommandExecutor, DraftEditor, DraftState, EditorContext, RemoteClient, Topic,
};
use serde_json::{json, Value};
use shared::{
    error::ErrorCode,
    protocol::{publications, Command, CompanyRecord},
    schema::EntityKind,
};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct ServerState {
    received: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn method(
    State(state): State<ServerState>,
    Path(name): Path<String>,
    Json(payload): Json<Value>,
) -> (StatusCode, String) {
    state
        .received
        .lock()
        .expect("received lock")
        .push((name.clone(), payload));
    match name.as_str() {
        "projects.updateImpact" => (StatusCode::OK, json!({ "id": "abc123" }).to_string()),
        "users.updateRole" => (
            StatusCode::BAD_REQUEST,
            json!({ "error": "already-exists", "reason": "Email already exists" }).to_string(),
        ),
        "users.removeCompany" => (StatusCode::OK, String::new()),
        "users.inviteNewUser" => (StatusCode::FORBIDDEN, "nope".to_string()),
        _ => (StatusCode::NOT_FOUND, String::new()),
    }
}

async fn publication(
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if name != publications::COMPANIES {
        return (StatusCode::NOT_FOUND, Json(json!([])));
    }
    let id = params.get("companyId").cloned().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!([{
            "_id": id,
            "name": "Acme",
            "admins": ["u1"],
            "peoples": ["u1", "u2"],
            "peoplesDetails": [
                { "_id": "u1", "profile": { "firstName": "Ada", "lastName": "L" }, "emails": [{ "address": "ada@acme.test" }] },
                { "_id": "u2", "profile": { "firstName": "Bob" } }
            ]
        }])),
    )
}

async fn spawn_backend() -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/methods/:name", post(method))
        .route("/publications/:name", get(publication))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

#[tokio::test]
async fn draft_commit_round_trips_over_http() {
    let (server_url, state) = spawn_backend().await.expect("backend");
    let client = RemoteClient::new(&server_url).expect("client");

    let mut editor = DraftEditor::new(EntityKind::Impact, EditorContext::for_project("c1", "p1"));
    editor.open(None).expect("open");
    editor.set_field("description", "Launch plan").expect("set");
    editor.set_field("level", "high").expect("set");
    editor.set_field("type", "process").expect("set");

    let committed = editor.commit(&client).await.expect("commit");
    assert_eq!(committed.id.as_ref().map(|id| id.as_str()), Some("abc123"));
    assert_eq!(editor.state(), DraftState::Closed);

    let received = state.received.lock().expect("received lock").clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "projects.updateImpact");
    assert_eq!(received[0].1["projectId"], "p1");
    assert_eq!(received[0].1["impact"]["level"], "high");
}

#[tokio::test]
async fn remote_errors_keep_their_reason() {
    let (server_url, _) = spawn_backend().await.expect("backend");
    let client = RemoteClient::new(&format!("{server_url}/")).expect("client");

    let err = client
        .invoke(Command::new(
            "users.updateRole",
            json!({ "companyId": "c1", "userId": "u1", "role": "admin" }),
        ))
        .await
        .expect_err("rejected");
    assert_eq!(err.code, ErrorCode::Conflict);
    assert_eq!(err.reason, "Email already exists");

    let err = client
        .invoke(Command::new("users.inviteNewUser", json!({})))
        .await
        .expect_err("forbidden");
    assert_eq!(err.code, ErrorCode::Forbidden);
    assert_eq!(err.reason, "Forbidden");

    let reply = client
        .invoke(Command::new("users.removeCompany", json!({})))
        .await
        .expect("empty body");
    assert_eq!(reply, Value::Null);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = RemoteClient::new(&format!("http://{addr}")).expect("client");
    let err = client
        .invoke(Command::new("projects.insert", json!({})))
        .await
        .expect_err("offline");
    assert_eq!(err.code, ErrorCode::Transport);
}

#[tokio::test]
async fn publications_are_fetched_with_params() {
    let (server_url, _) = spawn_backend().await.expect("backend");
    let client = RemoteClient::new(&server_url).expect("client");

    let topic = Topic::new(publications::COMPANIES).with_param("companyId", "c1");
    let companies: Vec<CompanyRecord> = client.fetch_publication(&topic).await.expect("fetch");
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].id.as_str(), "c1");
    assert_eq!(companies[0].peoples_details[1].primary_email(), "");

    let rows = editor_core::membership::company_rows(&companies[0]);
    assert_eq!(rows.len(), 2);

    let missing = Topic::new("nothing");
    assert!(client.fetch_publication::<CompanyRecord>(&missing).await.is_err());
}

#[test]
fn rejects_non_http_urls() {
    assert!(RemoteClient::new("ftp://example.com").is_err());
    assert!(RemoteClient::new("not a url").is_err());
}
