//! tests/common/mod.rs
//! Spawns the gateway on an ephemeral port backed by an in-memory connector.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{serve, Router};
use serde_json::{json, Value};
use sql_gateway::config::{environment::EnvironmentVariables, state::AppState};
use sql_gateway::core::server::create_app;
use sql_gateway::database::{ConnectionParams, Connector, TenantConnection};
use tokio::net::TcpListener as TokioTcpListener;
use uuid::Uuid;

/// Counts every connection opened, closed and every statement executed.
#[derive(Debug, Default)]
pub struct Recorder {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub statements: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

/// Rejects the password "wrong", otherwise hands out in-memory connections.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    pub recorder: Arc<Recorder>,
}

struct MemoryConnection {
    id: Uuid,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn TenantConnection>, sqlx::Error> {
        if params.password == "wrong" {
            return Err(sqlx::Error::Protocol(format!(
                "Access denied for user '{}'@'{}'",
                params.user, params.host
            )));
        }

        self.recorder.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            id: Uuid::new_v4(),
            recorder: self.recorder.clone(),
        }))
    }
}

#[async_trait]
impl TenantConnection for MemoryConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn query(&mut self, sql: &str) -> Result<Value, sqlx::Error> {
        self.recorder.statements.lock().unwrap().push(sql.to_string());

        if let Some(seconds) = sql.strip_prefix("SELECT SLEEP(").and_then(|s: &str| s.strip_suffix(')')) {
            let seconds: u64 = seconds.parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            return Ok(json!([{ "SLEEP": 0 }]));
        }

        match sql {
            "SELECT 1" => Ok(json!([{ "1": 1 }])),
            "SELECT * FROM `users`" => Ok(json!([
                { "id": 1, "name": "Ada" },
                { "id": 2, "name": "Grace" }
            ])),
            "SELECT * FROM `users` WHERE id = 2" => Ok(json!([{ "id": 2, "name": "Grace" }])),
            "INSERT INTO users (name) VALUES ('Linus')" => Ok(json!({ "affectedRows": 1, "insertId": 3 })),
            _ => Err(sqlx::Error::Protocol(format!("Unknown statement: {}", sql))),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.recorder.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestApp {
    pub base_url: String,
    pub recorder: Arc<Recorder>,
    pub state: AppState,
}

/// Spawns the app on a random unused port with the default configuration.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(HashMap::new()).await
}

/// Spawns the app with explicit environment variables (e.g. a short timeout).
pub async fn spawn_app_with(vars: HashMap<String, String>) -> TestApp {
    let env: EnvironmentVariables = EnvironmentVariables::from_vars(&vars).expect("valid test configuration");
    let connector: MemoryConnector = MemoryConnector::default();
    let recorder: Arc<Recorder> = connector.recorder.clone();
    let state: AppState = AppState::new(Arc::new(env), Arc::new(connector));

    let app: Router = create_app(state.clone());

    // * Bind an ephemeral port.
    let listener: TokioTcpListener = TokioTcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr: std::net::SocketAddr = listener.local_addr().unwrap();

    // * Spawn the server in a background task.
    tokio::spawn(async move {
        serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        base_url: format!("http://{}", addr),
        recorder,
        state,
    }
}

/// Connection fields accepted by every endpoint.
pub fn connection_body() -> Value {
    json!({
        "host": "localhost",
        "user": "root",
        "password": "root",
        "database": "app"
    })
}

/// `connection_body()` merged with extra fields.
pub fn body_with(extra: Value) -> Value {
    let mut body: Value = connection_body();
    let target: &mut serde_json::Map<String, Value> = body.as_object_mut().unwrap();
    for (key, value) in extra.as_object().unwrap() {
        target.insert(key.clone(), value.clone());
    }
    body
}

/// POSTs a JSON body and returns the status and parsed envelope.
pub async fn post_json(app: &TestApp, path: &str, body: &Value) -> (reqwest::StatusCode, Value) {
    let resp: reqwest::Response = reqwest::Client::new()
        .post(format!("{}{}", app.base_url, path))
        .json(body)
        .send()
        .await
        .expect("Failed to execute request.");

    let status: reqwest::StatusCode = resp.status();
    let json: Value = resp.json().await.expect("Response body is not JSON");
    (status, json)
}
