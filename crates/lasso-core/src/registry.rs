//! Persistent registry of known printers
//!
//! Records live in memory and are written back as a pretty-printed JSON
//! document after every mutation. A mutation whose write fails is undone
//! in memory. Serial numbers are unique: a second `create` for the same
//! serial is rejected.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::device::SerialNumber;
use crate::printer::{Printer, PrinterCreate, PrinterUpdate};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Printer with serial number {0} already exists")]
    Duplicate(SerialNumber),
    #[error("Printer not found: {0}")]
    NotFound(SerialNumber),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// On-disk representation of the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    printers: Vec<Printer>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Printer registry keyed by serial number
#[derive(Debug)]
pub struct PrinterRegistry {
    path: Option<PathBuf>,
    next_id: u64,
    printers: HashMap<SerialNumber, Printer>,
}

impl PrinterRegistry {
    /// Registry that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            next_id: 1,
            printers: HashMap::new(),
        }
    }

    /// Load the registry from `path`, starting empty if the file does not exist
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        let mut registry = Self::in_memory();
        registry.path = Some(path.to_path_buf());

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let file: RegistryFile = serde_json::from_str(&content)?;
            let max_id = file.printers.iter().map(|p| p.id).max().unwrap_or(0);
            registry.next_id = file.next_id.max(max_id + 1);
            registry.printers = file
                .printers
                .into_iter()
                .map(|p| (p.serial_number.clone(), p))
                .collect();
            info!(
                path = %path.display(),
                count = registry.printers.len(),
                "Loaded printer registry"
            );
        } else {
            info!(path = %path.display(), "Registry file not found, starting empty");
        }

        Ok(registry)
    }

    /// Add a printer; fails with [`RegistryError::Duplicate`] if the serial is taken
    pub fn create(&mut self, payload: PrinterCreate) -> Result<Printer, RegistryError> {
        if self.printers.contains_key(&payload.serial_number) {
            return Err(RegistryError::Duplicate(payload.serial_number));
        }

        let printer = Printer::from_create(self.next_id, payload);
        self.next_id += 1;
        self.printers
            .insert(printer.serial_number.clone(), printer.clone());
        if let Err(e) = self.save() {
            self.printers.remove(&printer.serial_number);
            self.next_id -= 1;
            return Err(e);
        }

        debug!(serial = %printer.serial_number, id = printer.id, "Printer created");
        Ok(printer)
    }

    /// Apply a partial update to an existing printer
    pub fn update(&mut self, update: PrinterUpdate) -> Result<Printer, RegistryError> {
        let serial = update.serial_number.clone();
        let printer = self
            .printers
            .get_mut(&serial)
            .ok_or_else(|| RegistryError::NotFound(serial.clone()))?;
        let previous = printer.clone();
        printer.apply(update);
        let updated = printer.clone();
        if let Err(e) = self.save() {
            self.printers.insert(serial, previous);
            return Err(e);
        }

        debug!(serial = %serial, "Printer updated");
        Ok(updated)
    }

    /// Remove a printer, returning the removed record
    pub fn delete(&mut self, serial: &SerialNumber) -> Result<Printer, RegistryError> {
        let removed = self
            .printers
            .remove(serial)
            .ok_or_else(|| RegistryError::NotFound(serial.clone()))?;
        if let Err(e) = self.save() {
            self.printers.insert(serial.clone(), removed);
            return Err(e);
        }

        debug!(serial = %serial, "Printer deleted");
        Ok(removed)
    }

    pub fn find(&self, serial: &SerialNumber) -> Option<&Printer> {
        self.printers.get(serial)
    }

    /// All printers ordered by name, then serial number
    pub fn list(&self) -> Vec<Printer> {
        let mut printers: Vec<Printer> = self.printers.values().cloned().collect();
        printers.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.serial_number.cmp(&b.serial_number))
        });
        printers
    }

    pub fn len(&self) -> usize {
        self.printers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.printers.is_empty()
    }

    fn save(&self) -> Result<(), RegistryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut printers: Vec<Printer> = self.printers.values().cloned().collect();
        printers.sort_by_key(|p| p.id);
        let file = RegistryFile {
            version: default_version(),
            next_id: self.next_id,
            printers,
        };

        let content = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
