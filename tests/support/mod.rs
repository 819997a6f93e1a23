//! Router helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use timeledger::application::pagination::PageLimits;
use timeledger::cache::{CacheConfig, CacheHandles};
use timeledger::infra::http::{ApiState, build_router};
use timeledger::testing::MemoryRepos;

/// Router over fresh in-memory storage and a fresh in-memory cache.
pub fn app() -> (Router, Arc<MemoryRepos>) {
    let repos = Arc::new(MemoryRepos::default());
    let cache = CacheHandles::in_memory(CacheConfig::default());
    let state = ApiState::new(repos.clone(), &cache, PageLimits::default());
    (build_router(state), repos)
}

pub async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
