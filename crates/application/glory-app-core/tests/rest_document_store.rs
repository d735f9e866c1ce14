use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use glory_app_core::{DocumentStore, RemoteError, RemoteSettings, RestDocumentStore};
use glory_core::{RecordPayload, Scope};
use serde_json::{json, Value};

type Rows = Arc<Mutex<Vec<Value>>>;

fn matches(row: &Value, params: &HashMap<String, String>) -> bool {
    ["id", "user_id", "name"].iter().all(|col| {
        match params.get(*col).and_then(|v| v.strip_prefix("eq.")) {
            Some(want) => match &row[*col] {
                Value::String(s) => s == want,
                Value::Number(n) => n.to_string() == want,
                _ => false,
            },
            None => true,
        }
    })
}

async fn start_server(rows: Rows) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route(
            "/rest/v1/cvs",
            get(
                |State(rows): State<Rows>, Query(params): Query<HashMap<String, String>>| async move {
                    let rows = rows.lock().unwrap();
                    let found: Vec<Value> =
                        rows.iter().filter(|r| matches(r, &params)).cloned().collect();
                    Json(Value::Array(found))
                },
            )
            .post(|State(rows): State<Rows>, Json(mut body): Json<Value>| async move {
                let mut rows = rows.lock().unwrap();
                body["id"] = json!(rows.len() + 1);
                body["created_at"] = json!("2024-05-01T10:00:00Z");
                body["updated_at"] = json!("2024-05-01T10:00:00Z");
                rows.push(body.clone());
                Json(json!([body]))
            })
            .patch(
                |State(rows): State<Rows>,
                 Query(params): Query<HashMap<String, String>>,
                 Json(body): Json<Value>| async move {
                    let mut rows = rows.lock().unwrap();
                    let mut updated = Vec::new();
                    for row in rows.iter_mut().filter(|r| matches(r, &params)) {
                        for (k, v) in body.as_object().into_iter().flatten() {
                            row[k.as_str()] = v.clone();
                        }
                        row["updated_at"] = json!("2024-05-01T11:00:00Z");
                        updated.push(row.clone());
                    }
                    (StatusCode::OK, Json(Value::Array(updated)))
                },
            ),
        )
        .with_state(rows);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

fn store_for(addr: SocketAddr) -> RestDocumentStore {
    RestDocumentStore::from_settings(&RemoteSettings {
        base_url: format!("http://{addr}"),
        api_key: "anon-key".into(),
        table: "cvs".into(),
    })
    .unwrap()
}

fn payload(owner: &str, name: &str, city: &str) -> RecordPayload {
    RecordPayload {
        owner_id: owner.into(),
        name: name.into(),
        template_id: "template2".into(),
        content: json!({ "city": city }),
    }
}

#[tokio::test]
async fn create_then_find_by_owner_and_name() {
    let rows = Rows::default();
    let (addr, handle) = start_server(rows.clone()).await;
    let store = store_for(addr);

    let created = store
        .create(&payload("u1", "Amna Tariq", "Lahore"))
        .await
        .unwrap();
    assert_eq!(created.id, "1");
    assert_eq!(created.template_id, "template2");

    let found = store
        .find_by_owner_and_name("u1", "Amna Tariq")
        .await
        .unwrap()
        .expect("record found");
    assert_eq!(found.id, "1");
    assert_eq!(found.content["city"], "Lahore");

    assert!(store
        .find_by_owner_and_name("u2", "Amna Tariq")
        .await
        .unwrap()
        .is_none());

    handle.abort();
}

#[tokio::test]
async fn owner_scope_limits_updates_and_reads() {
    let rows = Rows::default();
    let (addr, handle) = start_server(rows.clone()).await;
    let store = store_for(addr);
    let created = store
        .create(&payload("u2", "Bilal Khan", "Quetta"))
        .await
        .unwrap();

    let mine = Scope::Owner("u1".into());
    assert!(store.get_by_id(&created.id, &mine).await.unwrap().is_none());
    let err = store
        .update(&created.id, &payload("u1", "Bilal Khan", "Sukkur"), &mine)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Rejected { status: 404, .. }));

    let updated = store
        .update(&created.id, &payload("u2", "Bilal Khan", "Sukkur"), &Scope::Any)
        .await
        .unwrap();
    assert_eq!(updated.content["city"], "Sukkur");
    assert!(updated.updated_at > updated.created_at);

    handle.abort();
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = store_for(addr)
        .get_by_id("1", &Scope::Any)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)));
}
