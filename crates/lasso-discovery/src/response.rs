//! SSDP response header parsing

use std::collections::HashMap;
use std::net::SocketAddr;

/// Pseudo-header carrying the datagram sender's IP
pub const SENDER_IP_KEY: &str = "__ip";

/// Lower-cased header name to trimmed value
///
/// Repeated headers keep the last value seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, lower-casing the name
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Look up a header by (case-insensitive) name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Header value or the empty string
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    /// True when the header is present with a non-empty value
    pub fn has(&self, name: &str) -> bool {
        !self.get_or_empty(name).is_empty()
    }

    /// Sender IP recorded by [`parse_response`]
    pub fn sender_ip(&self) -> Option<&str> {
        self.get(SENDER_IP_KEY)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Headers {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Parse a raw SSDP datagram into headers
///
/// Invalid UTF-8 is replaced rather than rejected and lines without a colon
/// (the status line, blank lines) are skipped, so this never fails.
pub fn parse_response(data: &[u8], sender: SocketAddr) -> Headers {
    let text = String::from_utf8_lossy(data);
    let mut headers = Headers::new();

    for line in text.lines() {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim(), value.trim());
        }
    }

    headers.insert(SENDER_IP_KEY, sender.ip().to_string());
    headers
}
