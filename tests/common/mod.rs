//! Shared helpers for the HTTP integration tests: an app wired to a
//! fresh in-memory store, request builders and body decoding.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use cineticket::config::{AppConfig, AuthConfig, Config, DatabaseConfig, FeatureFlags};
use cineticket::store::MemStore;
use cineticket::{controllers, AppState};

/// Test config: weak bcrypt cost so registration stays fast, no demo
/// seed so every test starts from an empty store.
pub fn test_config() -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            rust_log: "cineticket=warn".to_string(),
        },
        database: DatabaseConfig {
            url: None,
            pool_size: 1,
        },
        auth: AuthConfig { bcrypt_cost: 4 },
        features: FeatureFlags {
            seed_demo_data: false,
        },
    }
}

/// Build the application router on a fresh in-memory store, mirroring
/// the router construction in `main.rs`. The state is returned too so
/// tests can seed catalog data directly.
pub fn build_test_app() -> (Router, Arc<AppState>) {
    let state = AppState::with_store(Arc::new(MemStore::new()), test_config());
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state.clone());
    (app, state)
}

pub fn basic_auth(username: &str, password: &str) -> String {
    let encoded = general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

pub async fn send(
    app: &Router,
    method: Method,
    path: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get_path(app: &Router, path: &str) -> Response {
    send(app, Method::GET, path, None, None).await
}

pub async fn get_auth(app: &Router, path: &str, auth: &str) -> Response {
    send(app, Method::GET, path, Some(auth), None).await
}

pub async fn post_json(app: &Router, path: &str, auth: Option<&str>, body: Value) -> Response {
    send(app, Method::POST, path, auth, Some(body)).await
}

pub async fn put_json(app: &Router, path: &str, auth: Option<&str>, body: Value) -> Response {
    send(app, Method::PUT, path, auth, Some(body)).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
