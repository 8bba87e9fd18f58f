//! go2rtc camera relay integration
//!
//! Printers with an RTSP camera URL get two go2rtc streams: one named after
//! the URL itself (what existing clients look up) and a stable alias derived
//! from the serial number. Relay failures are logged and never surface to
//! the API caller.

use lasso_core::SerialNumber;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{secs, Go2rtcConfig};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("go2rtc request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("go2rtc returned {0}")]
    Status(StatusCode),
}

/// Client for the go2rtc stream API
pub struct CameraRelay {
    enabled: bool,
    base_url: String,
    client: reqwest::Client,
}

impl CameraRelay {
    pub fn new(config: &Go2rtcConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(secs(config.timeout_secs).max(Duration::from_millis(100)))
            .build()?;

        Ok(Self {
            enabled: config.enabled,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn streams_url(&self) -> String {
        format!("{}/api/streams", self.base_url)
    }

    /// Register the printer's camera with the relay (RTSP URLs only)
    pub async fn ensure_stream(&self, serial: &SerialNumber, camera_url: Option<&str>) {
        if !self.enabled {
            return;
        }
        let Some(camera_url) = camera_url.filter(|url| is_rtsp_url(url)) else {
            return;
        };

        let alias = stream_alias(serial);
        for name in [camera_url, alias.as_str()] {
            if let Err(e) = self.upsert_stream(name, camera_url).await {
                warn!(serial = %serial, stream = %name, error = %e, "go2rtc stream upsert failed");
                return;
            }
        }
        debug!(serial = %serial, alias = %alias, "Camera stream registered");
    }

    /// Drop the printer's streams from the relay
    pub async fn remove_streams(&self, serial: &SerialNumber, camera_url: Option<&str>) {
        if !self.enabled {
            return;
        }

        let mut names = vec![stream_alias(serial)];
        if let Some(url) = camera_url.filter(|url| is_rtsp_url(url)) {
            names.push(url.to_string());
        }

        for name in &names {
            if let Err(e) = self.delete_stream(name).await {
                warn!(serial = %serial, stream = %name, error = %e, "go2rtc stream delete failed");
            }
        }
    }

    async fn upsert_stream(&self, name: &str, source_url: &str) -> Result<(), RelayError> {
        self.client
            .put(self.streams_url())
            .query(&[("name", name), ("src", source_url)])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete_stream(&self, name: &str) -> Result<(), RelayError> {
        let response = self
            .client
            .delete(self.streams_url())
            .query(&[("src", name)])
            .send()
            .await?;

        // 404: already gone
        match response.status() {
            StatusCode::OK | StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(RelayError::Status(status)),
        }
    }
}

/// Whether `url` uses the rtsp or rtsps scheme
pub fn is_rtsp_url(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, _)) => {
            scheme.eq_ignore_ascii_case("rtsp") || scheme.eq_ignore_ascii_case("rtsps")
        }
        None => false,
    }
}

/// Stable go2rtc stream name for a printer
pub fn stream_alias(serial: &SerialNumber) -> String {
    let mut normalized = String::with_capacity(serial.as_str().len());
    let mut in_run = false;
    for c in serial.as_str().to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            normalized.push(c);
            in_run = false;
        } else if !in_run {
            normalized.push('-');
            in_run = true;
        }
    }

    let normalized = normalized.trim_matches('-');
    if normalized.is_empty() {
        "printer-printer".to_string()
    } else {
        format!("printer-{}", normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::routing::put;
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

    async fn record_put(State(calls): State<Calls>, Query(q): Query<HashMap<String, String>>) {
        calls.lock().unwrap().push(("PUT".to_string(), q));
    }

    async fn record_delete(
        State(calls): State<Calls>,
        Query(q): Query<HashMap<String, String>>,
    ) -> StatusCode {
        calls.lock().unwrap().push(("DELETE".to_string(), q));
        StatusCode::NOT_FOUND
    }

    async fn fake_go2rtc() -> (String, Calls) {
        let calls: Calls = Arc::default();
        let app = Router::new()
            .route("/api/streams", put(record_put).delete(record_delete))
            .with_state(calls.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), calls)
    }

    fn relay(base_url: &str, enabled: bool) -> CameraRelay {
        CameraRelay::new(&Go2rtcConfig {
            enabled,
            base_url: base_url.to_string(),
            timeout_secs: 2.0,
        })
        .unwrap()
    }

    #[test]
    fn test_is_rtsp_url() {
        assert!(is_rtsp_url("rtsp://192.168.1.5/stream"));
        assert!(is_rtsp_url("RTSPS://192.168.1.5:322/streaming/live/1"));
        assert!(!is_rtsp_url("http://192.168.1.22/cam"));
        assert!(!is_rtsp_url("rtsp-ish"));
        assert!(!is_rtsp_url(""));
    }

    #[test]
    fn test_stream_alias() {
        assert_eq!(stream_alias(&"01P00A123".into()), "printer-01p00a123");
        assert_eq!(stream_alias(&"SN 1000/Bench".into()), "printer-sn-1000-bench");
        assert_eq!(stream_alias(&"--x__y--".into()), "printer-x__y");
        assert_eq!(stream_alias(&"!!!".into()), "printer-printer");
    }

    #[tokio::test]
    async fn test_ensure_stream_registers_url_and_alias() {
        let (base, calls) = fake_go2rtc().await;
        let relay = relay(&base, true);
        let url = "rtsps://192.168.1.22:322/streaming/live/1";

        relay.ensure_stream(&"SN-1".into(), Some(url)).await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1["name"], url);
        assert_eq!(calls[0].1["src"], url);
        assert_eq!(calls[1].1["name"], "printer-sn-1");
    }

    #[tokio::test]
    async fn test_non_rtsp_and_disabled_are_noops() {
        let (base, calls) = fake_go2rtc().await;

        relay(&base, true)
            .ensure_stream(&"SN-1".into(), Some("http://192.168.1.22/cam"))
            .await;
        relay(&base, false)
            .ensure_stream(&"SN-1".into(), Some("rtsp://192.168.1.22/cam"))
            .await;
        relay(&base, false).remove_streams(&"SN-1".into(), None).await;

        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_streams_tolerates_not_found() {
        let (base, calls) = fake_go2rtc().await;
        let relay = relay(&base, true);

        relay
            .remove_streams(&"SN-1".into(), Some("rtsp://192.168.1.22/cam"))
            .await;

        let calls = calls.lock().unwrap();
        let srcs: Vec<&str> = calls.iter().map(|(_, q)| q["src"].as_str()).collect();
        assert_eq!(srcs, vec!["printer-sn-1", "rtsp://192.168.1.22/cam"]);
        assert!(calls.iter().all(|(method, _)| method == "DELETE"));
    }
}
