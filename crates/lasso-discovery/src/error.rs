//! Error types for SSDP discovery

use thiserror::Error;

/// Fatal errors that abort a single scan
///
/// Per-datagram problems (failed sends, receive errors, unparseable or
/// foreign responses) are not errors: they only reduce coverage.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to open discovery socket on port {port}: {source}")]
    Socket {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to start discovery runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
