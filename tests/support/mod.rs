#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use todo_api::api::{app, AppState, TodoResponse};
use todo_api::lock::ListGuard;
use tower::ServiceExt;

pub struct TestApi {
    dir: TempDir,
    file: PathBuf,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> TodoResponse {
        serde_json::from_slice(&self.body).expect("decode todo response")
    }
}

impl TestApi {
    /// Server over an empty list file, the way a fresh deployment starts
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let file = dir.path().join("todo.json");
        fs::write(&file, "").expect("create empty list file");
        let router = app(AppState::new(ListGuard::new(file.clone()).with_file_lock(true)));
        Self { dir, file, router }
    }

    /// Server preloaded with `task 1`, `task 2` and `task 3`
    pub async fn seeded() -> Self {
        let api = Self::empty();
        for i in 1..=3 {
            let resp = api.post_task(&format!("task {i}")).await;
            assert_eq!(resp.status, StatusCode::CREATED, "seeding task {i}");
        }
        api
    }

    pub fn file(&self) -> &PathBuf {
        &self.file
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<String>) -> TestResponse {
        send(self.router(), method, uri, body).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post_task(&self, task: &str) -> TestResponse {
        let body = serde_json::json!({ "task": task }).to_string();
        self.send(Method::POST, "/todo", Some(body)).await
    }
}

pub async fn send(router: Router, method: Method, uri: &str, body: Option<String>) -> TestResponse {
    let body = body.map(Body::from).unwrap_or_else(Body::empty);
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .expect("build request");

    let response = router.oneshot(request).await.expect("infallible router");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();

    TestResponse {
        status,
        content_type,
        body,
    }
}
