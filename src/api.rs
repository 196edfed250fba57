//! HTTP surface
//!
//! - `/` answers a liveness message for any method
//! - `/todo`, `/todo/` and `/todo/{id}` go through [`crate::router`] inside the
//!   list's critical section
//! - everything else is 404
//!
//! Errors are logged with URL, method, status and detail, then answered with
//! the plain-text reason phrase of the status.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::lock::ListGuard;
use crate::router::{self, ListRequest, Outcome};
use crate::task::TaskItem;

pub const LIVENESS_MESSAGE: &str = "Our API is live";
pub const CREATED_MESSAGE: &str = "Todo added successfully";

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    guard: ListGuard,
}

impl AppState {
    pub fn new(guard: ListGuard) -> Self {
        Self { guard }
    }

    pub fn from_config(config: &Config) -> Self {
        let guard = ListGuard::new(config.store.file.clone())
            .with_timeout(config.store.lock_timeout())
            .with_file_lock(config.store.file_lock);
        Self::new(guard)
    }
}

/// JSON envelope for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoResponse {
    pub results: Vec<TaskItem>,
    /// Unix seconds at render time
    pub date: i64,
    pub total_results: usize,
}

impl TodoResponse {
    pub fn new(results: Vec<TaskItem>) -> Self {
        Self {
            total_results: results.len(),
            date: Utc::now().timestamp(),
            results,
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Listing(items) => {
                (StatusCode::OK, Json(TodoResponse::new(items))).into_response()
            }
            Outcome::Created => (StatusCode::CREATED, CREATED_MESSAGE).into_response(),
            Outcome::Completed | Outcome::Deleted => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", any(root_handler))
        .fallback(list_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, LIVENESS_MESSAGE)
}

async fn list_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let path = match router::decode_path(uri.path()) {
        Ok(path) => path,
        Err(err) => return reply_with_err(&method, &uri, &err),
    };
    let Some(remainder) = router::list_remainder(&path) else {
        let err = Error::NotFound(format!("no route for {path}"));
        return reply_with_err(&method, &uri, &err);
    };

    let request = ListRequest {
        method: method.clone(),
        remainder: remainder.to_string(),
        complete: params.contains_key("complete"),
        body,
    };

    match state
        .guard
        .run(move |path| router::handle(path, &request))
        .await
    {
        Ok(outcome) => outcome.into_response(),
        Err(err) => reply_with_err(&method, &uri, &err),
    }
}

fn reply_with_err(method: &Method, uri: &Uri, err: &Error) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!(url = %uri, %method, status = status.as_u16(), "{err}");
    } else {
        tracing::warn!(url = %uri, %method, status = status.as_u16(), "{err}");
    }

    let reason = status.canonical_reason().unwrap_or("Error");
    (status, format!("{reason}\n")).into_response()
}

/// Bind the configured address and serve until Ctrl-C or SIGTERM
pub async fn serve(config: &Config) -> Result<()> {
    let listener = TcpListener::bind(config.listen_addr()).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, file = %config.store.file.display(), "todo-api listening");

    axum::serve(listener, app(AppState::from_config(config)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
