#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use prospector_db::MemoryStore;
use tower::ServiceExt;

use prospector_api::config::ServerConfig;
use prospector_api::router::build_app_router;
use prospector_api::state::AppState;
use prospector_worker::{Services, WorkerConfig};

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default).
/// Workers stay off so enqueued jobs remain pending.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        run_workers: false,
    }
}

/// A router over a fresh in-memory store plus the services behind it.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub services: Services,
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let services = Services::new(store.clone(), &WorkerConfig::default());
    let state = AppState::new(config.clone(), &services);
    TestApp {
        app: build_app_router(state, &config),
        store,
        services,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(body.to_string())).await
}

/// POST without a body.
pub async fn post_empty(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, Body::empty()).await
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
