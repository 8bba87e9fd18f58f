//! Records produced by SSDP discovery

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Brand tag attached to every classified printer
pub const BAMBU_BRAND: &str = "Bambu Lab";

/// Port of the printer's MQTT control protocol (not the discovery port)
pub const BAMBU_MQTT_PORT: u16 = 8883;

/// Printer serial number, the identity key of a discovered printer
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialNumber(pub String);

impl SerialNumber {
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SerialNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A printer recognised from its SSDP response headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredPrinter {
    /// Vendor tag (always [`BAMBU_BRAND`])
    pub brand: String,
    /// Serial number taken from the USN header, never empty
    pub serial_number: SerialNumber,
    /// User-assigned printer name
    pub name: String,
    /// Model identifier (e.g. "P1S", "X1 Carbon")
    pub model: String,
    /// Address from the LOCATION header, or the datagram sender
    pub ip_address: String,
    /// Control protocol port
    pub port: u16,
    /// Firmware version
    pub dev_version: String,
    /// Wi-Fi signal strength as reported (e.g. "-45dBm")
    pub dev_signal: String,
    /// Connectivity state (e.g. "lan", "cloud")
    pub dev_connect: String,
    /// Raw ST header
    pub st: String,
    /// Raw LOCATION header
    pub location: String,
    /// Raw SERVER header
    pub server: String,
}

/// Any SSDP responder, surfaced in "include all" mode for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsdpDevice {
    /// Raw USN header (may be empty)
    pub serial_number: String,
    /// Raw SERVER header
    pub model: String,
    /// Raw USN header
    pub name: String,
    /// Sender address of the datagram
    pub ip_address: String,
    /// Sender port of the datagram
    pub port: u16,
    pub st: String,
    pub location: String,
    pub server: String,
}

impl SsdpDevice {
    /// Build a record from the relevant headers and the UDP sender
    pub fn new(usn: &str, server: &str, st: &str, location: &str, sender: SocketAddr) -> Self {
        Self {
            serial_number: usn.to_string(),
            model: server.to_string(),
            name: usn.to_string(),
            ip_address: sender.ip().to_string(),
            port: sender.port(),
            st: st.to_string(),
            location: location.to_string(),
            server: server.to_string(),
        }
    }

    /// Identity key: USN, else LOCATION, else "ip:port"
    pub fn identity(&self) -> String {
        if !self.serial_number.is_empty() {
            self.serial_number.clone()
        } else if !self.location.is_empty() {
            self.location.clone()
        } else {
            format!("{}:{}", self.ip_address, self.port)
        }
    }
}

/// One entry of a discovery result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Discovered {
    /// Classified vendor printer
    Printer(DiscoveredPrinter),
    /// Unclassified SSDP responder
    Raw(SsdpDevice),
}

impl Discovered {
    /// Key used to deduplicate results
    pub fn identity(&self) -> String {
        match self {
            Discovered::Printer(p) => p.serial_number.0.clone(),
            Discovered::Raw(d) => d.identity(),
        }
    }

    pub fn as_printer(&self) -> Option<&DiscoveredPrinter> {
        match self {
            Discovered::Printer(p) => Some(p),
            Discovered::Raw(_) => None,
        }
    }

    /// Address the record points at, when it parses as an IP
    pub fn ip(&self) -> Option<IpAddr> {
        let raw = match self {
            Discovered::Printer(p) => &p.ip_address,
            Discovered::Raw(d) => &d.ip_address,
        };
        raw.parse().ok()
    }
}
