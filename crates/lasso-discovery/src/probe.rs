//! SSDP M-SEARCH probe construction

use std::net::Ipv4Addr;

/// SSDP multicast group
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Limited broadcast address, probed alongside the multicast group
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Search target advertised by Bambu Lab printers
pub const BAMBU_ST: &str = "urn:bambulab-com:device:3dprinter:1";

/// Generic search target, for printers that ignore the vendor target
pub const ST_ALL: &str = "ssdp:all";

/// Ports Bambu printers answer discovery on
pub const BAMBU_PORTS: [u16; 3] = [1900, 2021, 1990];

const MSEARCH_VERB: &[u8] = b"M-SEARCH";

/// Build an M-SEARCH request for `search_target` addressed to `port`
pub fn build_msearch(port: u16, search_target: &str) -> Vec<u8> {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {MULTICAST_GROUP}:{port}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: {search_target}\r\n\
         \r\n"
    )
    .into_bytes()
}

/// True when `payload` is an M-SEARCH request (e.g. our own probe looped back)
pub fn is_msearch(payload: &[u8]) -> bool {
    let start = payload
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(payload.len());
    let rest = &payload[start..];
    rest.len() >= MSEARCH_VERB.len() && rest[..MSEARCH_VERB.len()].eq_ignore_ascii_case(MSEARCH_VERB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_msearch_exact_bytes() {
        assert_eq!(
            build_msearch(2021, "urn:x"),
            b"M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:2021\r\nMAN: \"ssdp:discover\"\r\nMX: 2\r\nST: urn:x\r\n\r\n"
                .to_vec()
        );
    }

    #[test]
    fn test_build_msearch_vendor_target() {
        let probe = String::from_utf8(build_msearch(1990, BAMBU_ST)).unwrap();
        assert!(probe.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(probe.contains("HOST: 239.255.255.250:1990\r\n"));
        assert!(probe.contains("ST: urn:bambulab-com:device:3dprinter:1\r\n"));
        assert!(probe.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_is_msearch() {
        assert!(is_msearch(&build_msearch(1900, ST_ALL)));
        assert!(is_msearch(b"  \r\nm-search * HTTP/1.1\r\n"));
        assert!(!is_msearch(b"HTTP/1.1 200 OK\r\n"));
        assert!(!is_msearch(b"M-SEA"));
        assert!(!is_msearch(b""));
    }
}
