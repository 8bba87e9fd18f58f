//! mDNS advertisement of the Print Lasso API
//!
//! Lets apps on the LAN find this service without knowing its address.
//! Advertising is optional: failures are logged and the API keeps serving.

use mdns_sd::{ServiceDaemon, ServiceInfo};
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum AdvertiseError {
    #[error("mDNS error: {0}")]
    Mdns(#[from] mdns_sd::Error),
    #[error("Invalid advertise address: {0}")]
    Address(String),
}

/// What to publish
#[derive(Debug, Clone)]
pub struct AdvertiseConfig {
    pub service_type: String,
    pub instance_name: String,
    pub api_path: String,
    pub ip: IpAddr,
    pub port: u16,
    pub version: String,
}

impl AdvertiseConfig {
    pub fn from_config(config: &Config) -> Result<Self, AdvertiseError> {
        let ip = resolve_advertise_ip(&config.mdns.advertise_host, config.bind_host());
        let ip = ip
            .parse::<IpAddr>()
            .map_err(|_| AdvertiseError::Address(ip.clone()))?;

        Ok(Self {
            service_type: config.mdns.service_type.clone(),
            instance_name: config.mdns.instance_name.clone(),
            api_path: config.mdns.api_path.clone(),
            ip,
            port: config.api_port(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

/// A live mDNS registration, withdrawn by [`Advertisement::stop`]
pub struct Advertisement {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Advertisement {
    /// Register the service on the local network
    pub fn start(config: &AdvertiseConfig) -> Result<Self, AdvertiseError> {
        let daemon = ServiceDaemon::new()?;

        let host = local_hostname();
        let properties = [
            ("version", config.version.as_str()),
            ("api_path", config.api_path.as_str()),
        ];
        let info = ServiceInfo::new(
            &config.service_type,
            &config.instance_name,
            &format!("{}.local.", host),
            config.ip,
            config.port,
            &properties[..],
        )?;
        let fullname = info.get_fullname().to_string();

        if let Err(e) = daemon.register(info) {
            let _ = daemon.shutdown();
            return Err(e.into());
        }

        info!(
            name = %fullname,
            ip = %config.ip,
            port = config.port,
            "mDNS service advertised"
        );
        Ok(Self { daemon, fullname })
    }

    /// Unregister the service and shut the mDNS daemon down
    pub fn stop(self) {
        match self.daemon.unregister(&self.fullname) {
            Ok(_) => info!(name = %self.fullname, "mDNS service unregistered"),
            Err(e) => warn!(error = %e, "Failed to unregister mDNS service cleanly"),
        }
        if let Err(e) = self.daemon.shutdown() {
            warn!(error = %e, "Failed to shut down mDNS daemon");
        }
    }
}

/// Start advertising if enabled; failures are logged, not returned
pub fn start_if_enabled(config: &Config) -> Option<Advertisement> {
    if !config.mdns.enabled {
        return None;
    }

    let result = AdvertiseConfig::from_config(config).and_then(|cfg| Advertisement::start(&cfg));
    match result {
        Ok(advertisement) => Some(advertisement),
        Err(e) => {
            warn!(error = %e, "Failed to register mDNS service");
            None
        }
    }
}

/// Address to publish: explicit setting, else a concrete bind host, else
/// the address of the interface that routes outward
pub fn resolve_advertise_ip(advertise_host: &str, bind_host: &str) -> String {
    if !advertise_host.is_empty() {
        return advertise_host.to_string();
    }

    let bind_host = bind_host.trim_start_matches('[').trim_end_matches(']');
    if !bind_host.is_empty() && bind_host != "0.0.0.0" && bind_host != "::" {
        return bind_host.to_string();
    }

    outbound_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| Ipv4Addr::LOCALHOST.to_string())
}

/// Local address used to reach the internet (no packet is sent)
fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .and_then(|h| h.split('.').next().map(str::to_string))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "print-lasso".to_string())
}
