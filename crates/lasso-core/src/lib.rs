//! Lasso Core - Shared types for the Print Lasso service
//!
//! This crate provides:
//! - Records produced by SSDP printer discovery
//! - The printer registry model and its JSON-file store

pub mod device;
pub mod printer;
pub mod registry;

pub use device::{
    Discovered, DiscoveredPrinter, SerialNumber, SsdpDevice, BAMBU_BRAND, BAMBU_MQTT_PORT,
};
pub use printer::{Printer, PrinterCreate, PrinterUpdate};
pub use registry::{PrinterRegistry, RegistryError};
