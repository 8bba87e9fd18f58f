//! Per-scan accumulation and deduplication of SSDP responses

use lasso_core::{Discovered, SsdpDevice};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tracing::{debug, trace};

use crate::probe::is_msearch;
use crate::response::parse_response;
use crate::vendor::classify;

/// What a scan reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Only classified Bambu Lab printers, keyed by serial number
    #[default]
    Printers,
    /// Any SSDP-shaped response, keyed by USN / LOCATION / sender
    IncludeAll,
}

impl DiscoveryMode {
    pub fn from_include_all(include_all: bool) -> Self {
        if include_all {
            Self::IncludeAll
        } else {
            Self::Printers
        }
    }
}

/// Why a datagram did not produce a result entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Our own M-SEARCH looped back by the network stack
    OwnProbe,
    /// No USN, LOCATION, SERVER or NT header (include-all mode)
    NotSsdp,
    /// Not a Bambu printer, or no serial number
    NotPrinter,
}

/// Collects results for one scan, one entry per identity
///
/// A later datagram for an identity replaces the earlier entry.
#[derive(Debug, Default)]
pub struct Aggregator {
    mode: DiscoveryMode,
    entries: BTreeMap<String, Discovered>,
    datagrams: usize,
}

impl Aggregator {
    pub fn new(mode: DiscoveryMode) -> Self {
        Self {
            mode,
            entries: BTreeMap::new(),
            datagrams: 0,
        }
    }

    /// Feed one received datagram, returning the identity it was stored under
    pub fn ingest(&mut self, data: &[u8], sender: SocketAddr) -> Result<String, Rejection> {
        self.datagrams += 1;

        if is_msearch(data) {
            trace!(from = %sender, "Ignoring looped-back M-SEARCH");
            return Err(Rejection::OwnProbe);
        }

        let headers = parse_response(data, sender);

        let entry = match self.mode {
            DiscoveryMode::IncludeAll => {
                let ssdp_shaped = ["usn", "location", "server", "nt"]
                    .iter()
                    .any(|name| headers.has(name));
                if !ssdp_shaped {
                    return Err(Rejection::NotSsdp);
                }
                Discovered::Raw(SsdpDevice::new(
                    headers.get_or_empty("usn"),
                    headers.get_or_empty("server"),
                    headers.get_or_empty("st"),
                    headers.get_or_empty("location"),
                    sender,
                ))
            }
            DiscoveryMode::Printers => {
                let fallback = sender.ip().to_string();
                let printer = classify(&headers, &fallback).ok_or(Rejection::NotPrinter)?;
                debug!(
                    serial = %printer.serial_number,
                    model = %printer.model,
                    ip = %printer.ip_address,
                    "Bambu printer responded"
                );
                Discovered::Printer(printer)
            }
        };

        let key = entry.identity();
        self.entries.insert(key.clone(), entry);
        Ok(key)
    }

    pub fn mode(&self) -> DiscoveryMode {
        self.mode
    }

    /// Number of datagrams fed so far, accepted or not
    pub fn datagrams(&self) -> usize {
        self.datagrams
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the aggregator, returning one entry per identity
    pub fn into_results(self) -> Vec<Discovered> {
        self.entries.into_values().collect()
    }
}
