//! Web server setup and routing

use anyhow::Result;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::advertise;
use crate::api;
use crate::state::AppState;

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/status", get(api::status))
        .route("/discover", post(api::discover))
        .route("/printer/add", post(api::add_printer))
        .route("/printer/edit", put(api::edit_printer))
        .route("/printer/remove", delete(api::remove_printer))
        .route("/printer/view", get(api::view_printer))
        .route("/printer/list", get(api::list_printers));

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn(api::log_requests))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the API until Ctrl+C, advertising it over mDNS while up
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");

    let advertisement = advertise::start_if_enabled(&state.config);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(advertisement) = advertisement {
        advertisement.stop();
    }
    served?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use lasso_core::PrinterRegistry;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let state = AppState::with_registry(Config::default(), PrinterRegistry::in_memory()).unwrap();
        router(state)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_status() {
        let app = test_app();
        let (status, body) = call(&app, Method::GET, "/api/v1/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_printer_lifecycle() {
        let app = test_app();
        let printer = json!({
            "serial_number": "01P00A123",
            "name": "Bench P1S",
            "ip_address": "192.168.1.22",
            "camera_url": "rtsps://192.168.1.22:322/streaming/live/1"
        });

        let (status, created) =
            call(&app, Method::POST, "/api/v1/printer/add", Some(printer.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["serial_number"], "01P00A123");
        assert_eq!(created["port"], 0);

        let (status, body) = call(&app, Method::POST, "/api/v1/printer/add", Some(printer)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].is_string());

        let (status, edited) = call(
            &app,
            Method::PUT,
            "/api/v1/printer/edit",
            Some(json!({ "serial_number": "01P00A123", "name": "Garage P1S" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["name"], "Garage P1S");
        assert_eq!(edited["ip_address"], "192.168.1.22");

        let (status, viewed) =
            call(&app, Method::GET, "/api/v1/printer/view?serial_number=01P00A123", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(viewed["name"], "Garage P1S");

        let (status, removed) = call(
            &app,
            Method::DELETE,
            "/api/v1/printer/remove",
            Some(json!({ "serial_number": "01P00A123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(removed["status"], "deleted");
        assert_eq!(removed["serial_number"], "01P00A123");

        let (status, _) =
            call(&app, Method::GET, "/api/v1/printer/view?serial_number=01P00A123", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_edit_null_clears_camera_url() {
        let app = test_app();
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/printer/add",
            Some(json!({
                "serial_number": "SN-1",
                "name": "Bench",
                "model": "P1S",
                "camera_url": "rtsp://192.168.1.22/live"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, edited) = call(
            &app,
            Method::PUT,
            "/api/v1/printer/edit",
            Some(json!({ "serial_number": "SN-1", "camera_url": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(edited["camera_url"].is_null());
        assert_eq!(edited["model"], "P1S");

        let (_, viewed) =
            call(&app, Method::GET, "/api/v1/printer/view?serial_number=SN-1", None).await;
        assert!(viewed["camera_url"].is_null());
    }

    #[tokio::test]
    async fn test_missing_printer_is_not_found() {
        let app = test_app();

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/v1/printer/edit",
            Some(json!({ "serial_number": "nope", "name": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Printer not found");

        let (status, _) = call(
            &app,
            Method::DELETE,
            "/api/v1/printer/remove",
            Some(json!({ "serial_number": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let app = test_app();
        for (serial, name) in [("SN-2", "Zeta"), ("SN-1", "Alpha"), ("SN-3", "Alpha")] {
            let (status, _) = call(
                &app,
                Method::POST,
                "/api/v1/printer/add",
                Some(json!({ "serial_number": serial, "name": name })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, list) = call(&app, Method::GET, "/api/v1/printer/list", None).await;
        assert_eq!(status, StatusCode::OK);
        let serials: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["serial_number"].as_str().unwrap())
            .collect();
        assert_eq!(serials, vec!["SN-1", "SN-3", "SN-2"]);
    }

    #[tokio::test]
    async fn test_discover_reports_count() {
        let app = test_app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/discover?include_all=false&timeout_secs=0.3",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let printers = body["printers"].as_array().unwrap();
        assert_eq!(body["count"].as_u64().unwrap() as usize, printers.len());
    }
}
