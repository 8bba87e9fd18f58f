//! REST API handlers

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use lasso_core::{PrinterCreate, PrinterUpdate, RegistryError, SerialNumber};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::config::secs;
use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new("Printer not found")),
    )
        .into_response()
}

fn registry_error(e: RegistryError) -> Response {
    match e {
        RegistryError::Duplicate(_) => (
            StatusCode::CONFLICT,
            Json(ApiError::new("Printer with this serial number already exists")),
        )
            .into_response(),
        RegistryError::NotFound(_) => not_found(),
        other => {
            error!(error = %other, "Registry write failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new(format!("Registry error: {}", other))),
            )
                .into_response()
        }
    }
}

/// Log method, path, status and latency of every request
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = format!("{:.2}", start.elapsed().as_secs_f64() * 1000.0),
        "HTTP request"
    );
    response
}

/// Health check
pub async fn status() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Discovery query parameters
#[derive(Deserialize)]
pub struct DiscoverParams {
    #[serde(default)]
    include_all: bool,
    /// Listen window in seconds; defaults to the configured timeout
    #[serde(default)]
    timeout_secs: Option<f64>,
}

/// Run an SSDP scan and return what answered
pub async fn discover(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DiscoverParams>,
) -> impl IntoResponse {
    info!(include_all = params.include_all, "Discovery requested");

    let printers = state
        .scanner
        .discover(params.timeout_secs.map(secs), params.include_all)
        .await;

    Json(serde_json::json!({
        "count": printers.len(),
        "printers": printers,
    }))
}

/// Add a printer to the registry
pub async fn add_printer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PrinterCreate>,
) -> Response {
    let created = state.registry.write().await.create(payload);
    let printer = match created {
        Ok(printer) => printer,
        Err(e) => return registry_error(e),
    };

    info!(serial = %printer.serial_number, name = %printer.name, "Printer added");
    state
        .relay
        .ensure_stream(&printer.serial_number, printer.camera_url.as_deref())
        .await;

    (StatusCode::CREATED, Json(printer)).into_response()
}

/// Update fields of an existing printer
pub async fn edit_printer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PrinterUpdate>,
) -> Response {
    let (old_camera_url, updated) = {
        let mut registry = state.registry.write().await;
        let Some(existing) = registry.find(&payload.serial_number) else {
            return not_found();
        };
        let old_camera_url = existing.camera_url.clone();
        match registry.update(payload) {
            Ok(printer) => (old_camera_url, printer),
            Err(e) => return registry_error(e),
        }
    };

    if old_camera_url != updated.camera_url {
        state
            .relay
            .remove_streams(&updated.serial_number, old_camera_url.as_deref())
            .await;
    }
    state
        .relay
        .ensure_stream(&updated.serial_number, updated.camera_url.as_deref())
        .await;

    Json(updated).into_response()
}

/// Body of a remove request
#[derive(Deserialize)]
pub struct PrinterDelete {
    serial_number: SerialNumber,
}

/// Remove a printer from the registry
pub async fn remove_printer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PrinterDelete>,
) -> Response {
    let camera_url = match state.registry.read().await.find(&payload.serial_number) {
        Some(printer) => printer.camera_url.clone(),
        None => return not_found(),
    };

    state
        .relay
        .remove_streams(&payload.serial_number, camera_url.as_deref())
        .await;

    let removed = state.registry.write().await.delete(&payload.serial_number);
    if let Err(e) = removed {
        return registry_error(e);
    }

    info!(serial = %payload.serial_number, "Printer removed");
    Json(serde_json::json!({
        "status": "deleted",
        "serial_number": payload.serial_number,
    }))
    .into_response()
}

/// Query for a single printer
#[derive(Deserialize)]
pub struct ViewParams {
    serial_number: SerialNumber,
}

/// Get a printer by serial number
pub async fn view_printer(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Response {
    match state.registry.read().await.find(&params.serial_number) {
        Some(printer) => Json(printer.clone()).into_response(),
        None => not_found(),
    }
}

/// List all registered printers
pub async fn list_printers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.read().await.list())
}
