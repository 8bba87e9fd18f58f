//! Bambu Lab printer recognition and normalisation

use lasso_core::{DiscoveredPrinter, SerialNumber, BAMBU_BRAND, BAMBU_MQTT_PORT};

use crate::probe::BAMBU_ST;
use crate::response::Headers;

/// Vendor-specific SSDP headers
pub const DEV_NAME: &str = "devname.bambu.com";
pub const DEV_MODEL: &str = "devmodel.bambu.com";
pub const DEV_VERSION: &str = "devversion.bambu.com";
pub const DEV_SIGNAL: &str = "devsignal.bambu.com";
pub const DEV_CONNECT: &str = "devconnect.bambu.com";

const VENDOR_NEEDLE: &str = "bambu";

/// Whether the headers describe a Bambu Lab device
///
/// Any one of these qualifies: the vendor search target in ST, NT or USN,
/// or the vendor name in SERVER or the model header. Responses to an
/// `ssdp:all` probe only match through the latter checks.
pub fn looks_like_bambu(headers: &Headers) -> bool {
    let target = BAMBU_ST.to_ascii_lowercase();
    let contains = |name: &str, needle: &str| {
        headers
            .get_or_empty(name)
            .to_ascii_lowercase()
            .contains(needle)
    };

    contains("st", target.as_str())
        || contains("nt", target.as_str())
        || contains("usn", target.as_str())
        || contains("server", VENDOR_NEEDLE)
        || contains(DEV_MODEL, VENDOR_NEEDLE)
}

/// Host part of a LOCATION URL, or "" when there is none
pub fn extract_host(location: &str) -> &str {
    let rest = location
        .strip_prefix("http://")
        .or_else(|| location.strip_prefix("https://"))
        .unwrap_or(location);
    let authority = rest.split('/').next().unwrap_or("");
    authority.split(':').next().unwrap_or("")
}

/// Serial number encoded in a USN (`uuid:<serial>::<urn>`)
pub fn extract_serial(usn: &str) -> &str {
    let usn = usn.strip_prefix("uuid:").unwrap_or(usn);
    match usn.split_once("::") {
        Some((serial, _)) => serial,
        None => usn,
    }
}

/// Turn a Bambu SSDP response into a printer record
///
/// Returns `None` for other vendors and for responses without a usable
/// serial number. `fallback_host` is used when LOCATION carries no host.
pub fn classify(headers: &Headers, fallback_host: &str) -> Option<DiscoveredPrinter> {
    if !looks_like_bambu(headers) {
        return None;
    }

    let location = headers.get_or_empty("location");
    let host = extract_host(location);
    let ip_address = if host.is_empty() { fallback_host } else { host };

    let serial = extract_serial(headers.get_or_empty("usn"));
    if serial.is_empty() {
        return None;
    }

    Some(DiscoveredPrinter {
        brand: BAMBU_BRAND.to_string(),
        serial_number: SerialNumber::new(serial),
        name: headers.get_or_empty(DEV_NAME).to_string(),
        model: headers.get_or_empty(DEV_MODEL).to_string(),
        ip_address: ip_address.to_string(),
        port: BAMBU_MQTT_PORT,
        dev_version: headers.get_or_empty(DEV_VERSION).to_string(),
        dev_signal: headers.get_or_empty(DEV_SIGNAL).to_string(),
        dev_connect: headers.get_or_empty(DEV_CONNECT).to_string(),
        st: headers.get_or_empty("st").to_string(),
        location: location.to_string(),
        server: headers.get_or_empty("server").to_string(),
    })
}
