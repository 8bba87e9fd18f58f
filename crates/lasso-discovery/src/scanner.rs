//! SSDP scanner: probes the network and collects responses until a deadline
//!
//! One scan owns one sending socket (bound to an ephemeral port) plus a
//! passive listener per well-known Bambu port. Probes go out to the
//! multicast group and the broadcast address on every port, for both the
//! vendor search target and `ssdp:all`. Replies are gathered from all
//! sockets until the timeout elapses; the full window is always used so
//! slow printers still get counted.

use futures_util::future::select_all;
use lasso_core::Discovered;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, trace, warn};

use crate::aggregate::{Aggregator, DiscoveryMode};
use crate::error::DiscoveryError;
use crate::probe::{build_msearch, BAMBU_PORTS, BAMBU_ST, BROADCAST_ADDR, MULTICAST_GROUP, ST_ALL};

/// Lower bound for the timeout used when the caller does not pass one
pub const MIN_DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

/// Stand-in deadline for windows that overflow `Instant` (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Longest single wait before the deadline is re-checked
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Receive buffer size (SSDP replies are well under this)
const RECV_BUFFER_SIZE: usize = 4096;

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Configured default timeout (raised to [`MIN_DEFAULT_TIMEOUT`])
    pub default_timeout: Duration,
    /// Ports to send probes to and to listen on
    pub ports: Vec<u16>,
    /// Probe destinations
    pub destinations: Vec<Ipv4Addr>,
    /// Search targets, sent in order
    pub search_targets: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(3),
            ports: BAMBU_PORTS.to_vec(),
            destinations: vec![MULTICAST_GROUP, BROADCAST_ADDR],
            search_targets: vec![BAMBU_ST.to_string(), ST_ALL.to_string()],
        }
    }
}

impl ScannerConfig {
    /// Timeout to use for a scan: the caller's, else the configured default
    /// but never less than [`MIN_DEFAULT_TIMEOUT`]
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or_else(|| self.default_timeout.max(MIN_DEFAULT_TIMEOUT))
    }
}

/// A socket taking part in a scan
struct Endpoint {
    /// Bound port, 0 for the ephemeral sender
    port: u16,
    socket: UdpSocket,
}

/// SSDP scanner
///
/// Holds configuration only; every scan opens and releases its own
/// sockets, so one scanner can run overlapping scans.
#[derive(Debug, Clone, Default)]
pub struct SsdpScanner {
    config: ScannerConfig,
}

impl SsdpScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Run discovery, returning an empty list if the scan cannot start
    pub async fn discover(&self, timeout: Option<Duration>, include_all: bool) -> Vec<Discovered> {
        let timeout = self.config.effective_timeout(timeout);
        let mode = DiscoveryMode::from_include_all(include_all);

        match self.scan(timeout, mode).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "SSDP discovery failed");
                Vec::new()
            }
        }
    }

    /// Run one scan for exactly `window`
    pub async fn scan(
        &self,
        window: Duration,
        mode: DiscoveryMode,
    ) -> Result<Vec<Discovered>, DiscoveryError> {
        info!(
            timeout_ms = window.as_millis() as u64,
            mode = ?mode,
            "Starting SSDP discovery"
        );

        let primary = open_socket(0, false)?;
        let mut endpoints = vec![Endpoint {
            port: 0,
            socket: primary,
        }];

        for &port in &self.config.ports {
            match open_socket(port, true) {
                Ok(socket) => endpoints.push(Endpoint { port, socket }),
                Err(e) => {
                    // Usually another scan (or an SSDP daemon) holds the port
                    debug!(port = port, error = %e, "Skipping SSDP listener");
                }
            }
        }

        self.send_probes(&endpoints[0].socket).await;

        let mut aggregator = Aggregator::new(mode);
        collect(&endpoints, window, &mut aggregator).await;

        info!(
            mode = ?aggregator.mode(),
            found = aggregator.len(),
            datagrams = aggregator.datagrams(),
            listeners = endpoints.len() - 1,
            "SSDP discovery complete"
        );

        Ok(aggregator.into_results())
    }

    /// Send every destination x port x search-target probe, ignoring failures
    async fn send_probes(&self, socket: &UdpSocket) {
        let mut sent = 0usize;
        for &destination in &self.config.destinations {
            for &port in &self.config.ports {
                for target in &self.config.search_targets {
                    let payload = build_msearch(port, target);
                    let to = SocketAddr::V4(SocketAddrV4::new(destination, port));
                    match socket.send_to(&payload, to).await {
                        Ok(_) => sent += 1,
                        Err(e) => trace!(to = %to, st = %target, error = %e, "M-SEARCH send failed"),
                    }
                }
            }
        }
        debug!(sent = sent, "Sent M-SEARCH probes");
    }
}

/// Wait on all sockets until `window` has elapsed, draining whatever is ready
async fn collect(endpoints: &[Endpoint], window: Duration, aggregator: &mut Aggregator) {
    let deadline = scan_deadline(Instant::now(), window);
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let wait = (deadline - now).min(POLL_INTERVAL);

        let ready = select_all(
            endpoints
                .iter()
                .map(|endpoint| Box::pin(endpoint.socket.readable())),
        );
        if timeout(wait, ready).await.is_err() {
            continue;
        }

        for endpoint in endpoints {
            match endpoint.socket.try_recv_from(&mut buf) {
                Ok((len, sender)) => {
                    if let Err(reason) = aggregator.ingest(&buf[..len], sender) {
                        trace!(from = %sender, reason = ?reason, "Dropped SSDP datagram");
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => {
                    debug!(port = endpoint.port, error = %e, "SSDP receive failed");
                }
            }
        }
    }
}

/// End of the listen window, clamped for windows too long to represent
fn scan_deadline(start: Instant, window: Duration) -> Instant {
    start
        .checked_add(window)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Open a reusable, broadcast-capable UDP socket on `port` (0 = ephemeral)
fn open_socket(port: u16, join_group: bool) -> Result<UdpSocket, DiscoveryError> {
    let err = |source| DiscoveryError::Socket { port, source };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(err)?;
    socket.set_reuse_address(true).map_err(err)?;
    set_reuse_port(&socket, port);
    socket.set_broadcast(true).map_err(err)?;
    socket.set_nonblocking(true).map_err(err)?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket.bind(&bind_addr.into()).map_err(err)?;

    if join_group {
        if let Err(e) = socket.join_multicast_v4(&MULTICAST_GROUP, &Ipv4Addr::UNSPECIFIED) {
            debug!(port = port, error = %e, "Could not join SSDP multicast group");
        }
    }

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(err)
}

#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
fn set_reuse_port(socket: &Socket, port: u16) {
    if let Err(e) = socket.set_reuse_port(true) {
        trace!(port = port, error = %e, "SO_REUSEPORT unavailable");
    }
}

#[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
fn set_reuse_port(_socket: &Socket, _port: u16) {}

/// Discover printers with the default scanner configuration
///
/// Never fails: a scan that cannot start yields an empty list.
pub async fn discover_printers(timeout: Option<Duration>, include_all: bool) -> Vec<Discovered> {
    SsdpScanner::default().discover(timeout, include_all).await
}

/// Blocking variant of [`discover_printers`] for callers outside a runtime
pub fn discover_printers_blocking(timeout: Option<Duration>, include_all: bool) -> Vec<Discovered> {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            warn!(error = %DiscoveryError::Runtime(e), "SSDP discovery failed");
            return Vec::new();
        }
    };
    runtime.block_on(discover_printers(timeout, include_all))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Config that sends nothing and listens only on `ports`
    fn quiet_config(ports: Vec<u16>) -> ScannerConfig {
        ScannerConfig {
            default_timeout: Duration::from_secs(1),
            ports,
            destinations: Vec::new(),
            search_targets: Vec::new(),
        }
    }

    fn free_udp_port() -> u16 {
        let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    }

    #[test]
    fn test_effective_timeout() {
        let config = ScannerConfig::default();
        assert_eq!(config.effective_timeout(None), MIN_DEFAULT_TIMEOUT);
        assert_eq!(
            config.effective_timeout(Some(Duration::from_secs(1))),
            Duration::from_secs(1)
        );

        let long = ScannerConfig {
            default_timeout: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(long.effective_timeout(None), Duration::from_secs(10));
    }

    #[test]
    fn test_huge_window_deadline_is_clamped() {
        let start = Instant::now();
        assert_eq!(
            scan_deadline(start, Duration::from_secs(2)),
            start + Duration::from_secs(2)
        );

        let huge = Duration::from_secs_f64(1.8e19);
        assert_eq!(scan_deadline(start, huge), start + FAR_FUTURE);
        assert_eq!(scan_deadline(start, Duration::MAX), start + FAR_FUTURE);
    }

    #[tokio::test]
    async fn test_huge_timeout_scan_does_not_panic() {
        let scanner = SsdpScanner::new(quiet_config(Vec::new()));
        let scan = tokio::spawn(async move {
            scanner
                .discover(Some(Duration::from_secs_f64(1.8e19)), false)
                .await
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!scan.is_finished());
        scan.abort();
        let joined = scan.await;
        assert!(joined.unwrap_err().is_cancelled());
    }

    #[test]
    fn test_default_config_matches_bambu_protocol() {
        let config = ScannerConfig::default();
        assert_eq!(config.ports, vec![1900, 2021, 1990]);
        assert_eq!(
            config.destinations,
            vec![Ipv4Addr::new(239, 255, 255, 250), Ipv4Addr::new(255, 255, 255, 255)]
        );
        assert_eq!(config.search_targets[0], BAMBU_ST);
        assert_eq!(config.search_targets[1], "ssdp:all");
    }

    #[tokio::test]
    async fn test_empty_network_waits_full_window() {
        let start = std::time::Instant::now();
        let found = discover_printers(Some(Duration::from_secs(1)), false).await;
        let elapsed = start.elapsed();

        assert!(found.is_empty());
        assert!(elapsed >= Duration::from_millis(950), "returned early: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(5), "overran window: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_collects_and_dedups_replies() {
        let port = free_udp_port();
        let scanner = SsdpScanner::new(quiet_config(vec![port]));

        let scan = tokio::spawn(async move {
            scanner
                .scan(Duration::from_millis(1500), DiscoveryMode::Printers)
                .await
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        let printer = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let reply = b"HTTP/1.1 200 OK\r\n\
            ST: urn:bambulab-com:device:3dprinter:1\r\n\
            USN: uuid:01S00C123456789::urn:bambulab-com:device:3dprinter:1\r\n\
            DevModel.bambu.com: X1 Carbon\r\n\
            \r\n";
        let target = ("127.0.0.1", port);
        printer.send_to(reply, target).unwrap();
        printer.send_to(reply, target).unwrap();
        printer
            .send_to(b"HTTP/1.1 200 OK\r\nST: upnp:rootdevice\r\nUSN: uuid:tv\r\n", target)
            .unwrap();

        let found = scan.await.unwrap().unwrap();
        assert_eq!(found.len(), 1);
        let record = found[0].as_printer().unwrap();
        assert_eq!(record.serial_number.as_str(), "01S00C123456789");
        assert_eq!(record.model, "X1 Carbon");
        assert_eq!(record.ip_address, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_overlapping_scans_do_not_interfere() {
        let scanner = SsdpScanner::default();
        let (a, b) = tokio::join!(
            scanner.scan(Duration::from_millis(800), DiscoveryMode::Printers),
            scanner.scan(Duration::from_millis(800), DiscoveryMode::Printers),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[test]
    fn test_blocking_wrapper() {
        let found = discover_printers_blocking(Some(Duration::from_millis(500)), false);
        assert!(found.is_empty());
    }
}
