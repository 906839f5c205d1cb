//! `taskd serve` command: a secondary, optional HTTP surface (§10.4) over
//! the same [`Runtime`] the CLI uses. Read/administrative only; every
//! handler is a thin adapter over [`control`] and never reimplements its
//! logic.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use taskd_core::{control, runtime::Runtime};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(rt: Arc<Runtime>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/stats", get(get_stats))
        .route("/api/queue", get(get_queue_stats))
        .route("/api/breakers", get(list_breakers))
        .route("/api/breakers/{kind}/reset", post(reset_breaker))
        .route("/api/dlq", get(list_dlq))
        .route("/api/dlq/{task_id}/requeue", post(requeue_dlq))
        .route("/api/tasks/{id}", get(get_task))
        .layer(CorsLayer::permissive())
        .with_state(rt)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(rt: Arc<Runtime>, bind: &str, port: u16) -> Result<()> {
    let app = build_router(rt);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("taskd serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("taskd serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> impl IntoResponse {
    Html(
        "<!DOCTYPE html><html><head><title>taskd</title></head><body>\
         <h1>taskd</h1>\
         <p><a href=\"/api/stats\">/api/stats</a> | <a href=\"/api/queue\">/api/queue</a> | \
         <a href=\"/api/breakers\">/api/breakers</a> | <a href=\"/api/dlq\">/api/dlq</a></p>\
         </body></html>",
    )
}

async fn get_stats(State(rt): State<Arc<Runtime>>) -> Result<impl IntoResponse, AppError> {
    let stats = control::stats(&rt).await.map_err(AppError::internal)?;
    Ok(Json(stats))
}

async fn get_queue_stats(State(rt): State<Arc<Runtime>>) -> Result<impl IntoResponse, AppError> {
    let stats = control::queue_stats(&rt).await.map_err(AppError::internal)?;
    Ok(Json(stats))
}

async fn list_breakers(State(rt): State<Arc<Runtime>>) -> impl IntoResponse {
    Json(control::breakers_list(&rt))
}

async fn reset_breaker(
    State(rt): State<Arc<Runtime>>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    control::breaker_reset(&rt, &kind);
    Json(serde_json::json!({ "kind": kind, "reset": true }))
}

async fn list_dlq(State(rt): State<Arc<Runtime>>) -> Result<impl IntoResponse, AppError> {
    let entries = control::dlq_list(&rt, None).await.map_err(AppError::internal)?;
    Ok(Json(entries))
}

async fn requeue_dlq(
    State(rt): State<Arc<Runtime>>,
    Path(task_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let task = control::dlq_requeue(&rt, task_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("dead-lettered task {task_id} not found")))?;
    Ok(Json(task))
}

async fn get_task(
    State(rt): State<Arc<Runtime>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let task = control::get_task(&rt, id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("task {id} not found")))?;
    Ok(Json(task))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
