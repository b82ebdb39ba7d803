//! Shared helpers for router-level tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use moviebuzz::app::build_app;
use moviebuzz::auth::identifier::{Identifier, IdentifierKind};
use moviebuzz::auth::repo_memory::MemoryUserStore;
use moviebuzz::config::{AppConfig, JwtConfig, NotifyConfig, OtpConfig};
use moviebuzz::notify::{ConsoleNotifier, Delivery, Notifier};
use moviebuzz::state::AppState;

/// Notifier that "delivers" every code and remembers it for the test.
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<(Identifier, String)>>,
}

impl CapturingNotifier {
    pub fn last_code_for(&self, value: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id.value() == value)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send(&self, identifier: &Identifier, code: &str, _display_name: &str) -> Delivery {
        self.sent
            .lock()
            .unwrap()
            .push((identifier.clone(), code.to_owned()));
        Delivery::sent()
    }
}

pub fn test_config(kind: IdentifierKind) -> Arc<AppConfig> {
    Arc::new(AppConfig {
        database_url: "postgres://unused".into(),
        jwt: JwtConfig {
            secret: "integration-test-secret-of-decent-length".into(),
            issuer: "moviebuzz".into(),
            audience: "moviebuzz-users".into(),
        },
        otp: OtpConfig { ttl_minutes: 10 },
        notify: NotifyConfig {
            webhook_url: None,
            timeout_secs: 1,
        },
        identifier_kind: kind,
    })
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryUserStore>,
    pub notifier: Arc<CapturingNotifier>,
}

/// Email deployment with a notifier that captures codes.
pub fn spawn_app() -> TestApp {
    spawn_app_with(IdentifierKind::Email)
}

pub fn spawn_app_with(kind: IdentifierKind) -> TestApp {
    let store = Arc::new(MemoryUserStore::new());
    let notifier = Arc::new(CapturingNotifier::default());
    let state = AppState::from_parts(test_config(kind), store.clone(), notifier.clone());
    TestApp {
        router: build_app(state),
        store,
        notifier,
    }
}

/// App running without a delivery channel; codes come back in responses.
pub fn spawn_degraded_app() -> Router {
    let state = AppState::from_parts(
        test_config(IdentifierKind::Email),
        Arc::new(MemoryUserStore::new()),
        Arc::new(ConsoleNotifier),
    );
    build_app(state)
}

pub async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    call(router, Method::POST, uri, Some(body), None).await
}

pub async fn get(router: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    call(router, Method::GET, uri, None, token).await
}
