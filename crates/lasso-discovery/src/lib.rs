//! Lasso Discovery - SSDP discovery of Bambu Lab printers
//!
//! This crate provides:
//! - M-SEARCH probe construction
//! - Lenient parsing of SSDP response headers
//! - Bambu Lab classification and record normalisation
//! - A multi-socket scanner that collects deduplicated results within a time window

pub mod aggregate;
pub mod error;
pub mod probe;
pub mod response;
pub mod scanner;
pub mod vendor;

pub use aggregate::{Aggregator, DiscoveryMode, Rejection};
pub use error::DiscoveryError;
pub use response::{parse_response, Headers};
pub use scanner::{
    discover_printers, discover_printers_blocking, ScannerConfig, SsdpScanner,
    MIN_DEFAULT_TIMEOUT,
};
pub use vendor::classify;
