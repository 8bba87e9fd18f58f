//! Configuration loading and validation

use anyhow::{anyhow, bail, Result};
use lasso_discovery::ScannerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub mdns: MdnsConfig,
    #[serde(default)]
    pub go2rtc: Go2rtcConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Path of the JSON printer registry
    #[serde(default = "default_data_file")]
    pub data_file: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            data_file: default_data_file(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_data_file() -> String {
    "print_lasso.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Default SSDP listen window in seconds (never below 6 in practice)
    #[serde(default = "default_ssdp_timeout")]
    pub ssdp_timeout_secs: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ssdp_timeout_secs: default_ssdp_timeout(),
        }
    }
}

fn default_ssdp_timeout() -> f64 {
    3.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdnsConfig {
    /// Advertise this service over mDNS
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_service_type")]
    pub service_type: String,
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    /// API prefix published in the TXT record
    #[serde(default = "default_api_path")]
    pub api_path: String,
    /// Address to advertise; empty means auto-detect
    #[serde(default)]
    pub advertise_host: String,
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_type: default_service_type(),
            instance_name: default_instance_name(),
            api_path: default_api_path(),
            advertise_host: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_service_type() -> String {
    "_print-lasso._tcp.local.".to_string()
}

fn default_instance_name() -> String {
    "Print Lasso Service".to_string()
}

fn default_api_path() -> String {
    "/api/v1".to_string()
}

/// go2rtc camera relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Go2rtcConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_go2rtc_url")]
    pub base_url: String,
    #[serde(default = "default_go2rtc_timeout")]
    pub timeout_secs: f64,
}

impl Default for Go2rtcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_go2rtc_url(),
            timeout_secs: default_go2rtc_timeout(),
        }
    }
}

fn default_go2rtc_url() -> String {
    "http://127.0.0.1:1984".to_string()
}

fn default_go2rtc_timeout() -> f64 {
    3.0
}

/// Seconds from config as a Duration, treating invalid values as zero
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl Config {
    /// Convert to ScannerConfig
    pub fn to_scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            default_timeout: secs(self.discovery.ssdp_timeout_secs),
            ..ScannerConfig::default()
        }
    }

    /// Port the HTTP API listens on, parsed from the bind address
    pub fn api_port(&self) -> u16 {
        self.daemon
            .bind
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or(0)
    }

    /// Host part of the bind address
    pub fn bind_host(&self) -> &str {
        self.daemon
            .bind
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.daemon.bind)
    }
}

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "PRINT_LASSO_";

/// Load configuration from file, then apply `PRINT_LASSO_*` overrides
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        config
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Config::default()
    };

    config.apply_env(std::env::vars())?;
    Ok(config)
}

impl Config {
    /// Apply `PRINT_LASSO_*` overrides from `vars` (names are case-insensitive)
    ///
    /// `HOST` and `PORT` replace the matching half of the bind address;
    /// `BIND` replaces all of it. Unknown names are ignored.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let upper = name.to_ascii_uppercase();
            let Some(key) = upper.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match key {
                "BIND" => self.daemon.bind = value,
                "HOST" => {
                    let port = self.api_port();
                    self.daemon.bind = join_host_port(&value, port);
                }
                "PORT" => {
                    let port: u16 = parse_env(&name, &value)?;
                    self.daemon.bind = join_host_port(self.bind_host(), port);
                }
                "DATA_FILE" => self.daemon.data_file = value,
                "SSDP_TIMEOUT_SECONDS" | "SSDP_TIMEOUT_SECS" => {
                    self.discovery.ssdp_timeout_secs = parse_env(&name, &value)?;
                }
                "MDNS_ENABLED" => self.mdns.enabled = parse_bool(&name, &value)?,
                "MDNS_SERVICE_TYPE" => self.mdns.service_type = value,
                "MDNS_INSTANCE_NAME" => self.mdns.instance_name = value,
                "MDNS_API_PATH" => self.mdns.api_path = value,
                "MDNS_ADVERTISE_HOST" => self.mdns.advertise_host = value,
                "GO2RTC_ENABLED" => self.go2rtc.enabled = parse_bool(&name, &value)?,
                "GO2RTC_BASE_URL" => self.go2rtc.base_url = value,
                "GO2RTC_TIMEOUT_SECS" => {
                    self.go2rtc.timeout_secs = parse_env(&name, &value)?;
                }
                _ => continue,
            }
            debug!(variable = %name, "Applied environment override");
        }
        Ok(())
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid value for {}: {:?} ({})", name, value, e))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("Invalid boolean for {}: {:?}", name, value),
    }
}
