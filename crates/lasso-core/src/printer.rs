//! Registry record types for printers the user has added

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::device::SerialNumber;

/// A printer stored in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    /// Registry-assigned id
    pub id: u64,
    /// Unique serial number
    pub serial_number: SerialNumber,
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub port: u16,
    /// Camera stream URL (RTSP URLs are registered with the relay)
    #[serde(default)]
    pub camera_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a printer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterCreate {
    pub serial_number: SerialNumber,
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub camera_url: Option<String>,
}

/// Partial update, keyed by serial number
///
/// Absent fields keep their stored value. The optional fields are
/// `Option<Option<_>>`: an explicit JSON `null` clears the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrinterUpdate {
    pub serial_number: SerialNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub model: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub ip_address: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub camera_url: Option<Option<String>>,
}

/// Present field (value or `null`) becomes `Some`; absence is left to `default`
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl Printer {
    /// Build a new record from a create payload
    pub fn from_create(id: u64, payload: PrinterCreate) -> Self {
        let now = Utc::now();
        Self {
            id,
            serial_number: payload.serial_number,
            name: payload.name,
            model: payload.model,
            ip_address: payload.ip_address,
            port: payload.port,
            camera_url: payload.camera_url,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the set fields of an update and bump `updated_at`
    pub fn apply(&mut self, update: PrinterUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(model) = update.model {
            self.model = model;
        }
        if let Some(ip) = update.ip_address {
            self.ip_address = ip;
        }
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(url) = update.camera_url {
            self.camera_url = url;
        }
        self.updated_at = Utc::now();
    }
}
