//! Application state management

use anyhow::{Context, Result};
use lasso_core::PrinterRegistry;
use lasso_discovery::SsdpScanner;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::relay::CameraRelay;

/// Shared application state
pub struct AppState {
    /// SSDP printer scanner
    pub scanner: SsdpScanner,
    /// Known printers
    pub registry: RwLock<PrinterRegistry>,
    /// go2rtc camera relay
    pub relay: CameraRelay,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create state backed by the configured registry file
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let path = Path::new(&config.daemon.data_file);
        let registry = PrinterRegistry::open(path)
            .with_context(|| format!("Failed to open printer registry {}", path.display()))?;
        Self::with_registry(config, registry)
    }

    /// Create state around an existing registry
    pub fn with_registry(config: Config, registry: PrinterRegistry) -> Result<Arc<Self>> {
        let scanner = SsdpScanner::new(config.to_scanner_config());
        let relay = CameraRelay::new(&config.go2rtc).context("Failed to create go2rtc client")?;

        if relay.is_enabled() {
            info!(url = %config.go2rtc.base_url, "go2rtc camera relay enabled");
        }

        Ok(Arc::new(Self {
            scanner,
            registry: RwLock::new(registry),
            relay,
            config,
        }))
    }
}
