//! Issuance ledger
//!
//! An append-only record of every certificate the CA has signed, kept as
//! newline-delimited JSON. One line per certificate:
//!
//! ```json
//! {"serial":"8f1d...","fingerprint":"SHA256:...","commonName":"leaf.example.com","notBefore":"2026-01-04T20:00:00Z","notAfter":"2026-01-05T20:00:00Z","dnsNames":["leaf.example.com"]}
//! ```
//!
//! Only `serial`, `notBefore` and `notAfter` are required when reading, so
//! files written in the older minimal format still load.
//!
//! # Durability
//!
//! Each append opens the file in append mode, writes the whole record with a
//! single `write_all`, and calls `sync_data` before returning. Appends within
//! one process are serialized by a mutex. Concurrent writers in other
//! processes are not coordinated.

use crate::certificate::SignedCertificate;
use crate::error::CAError;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use time::OffsetDateTime;

/// Durable record of issued certificates.
pub trait Ledger: Send + Sync {
    /// Record `certificate`. Returns only once the record is durable.
    fn append(&self, certificate: &SignedCertificate) -> Result<(), CAError>;
}

impl<T: Ledger + ?Sized> Ledger for std::sync::Arc<T> {
    fn append(&self, certificate: &SignedCertificate) -> Result<(), CAError> {
        (**self).append(certificate)
    }
}

/// One ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    /// Lower-case hex serial number.
    pub serial: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
}

impl LedgerRecord {
    pub fn from_certificate(certificate: &SignedCertificate) -> Self {
        let d = certificate.descriptor();
        Self {
            serial: d.serial.to_hex(),
            fingerprint: Some(certificate.fingerprint()),
            common_name: Some(d.subject.common_name.clone()),
            not_before: d.not_before,
            not_after: d.not_after,
            dns_names: d.subject_alt_names.dns.clone(),
        }
    }

    /// Parse a single ledger line.
    pub fn parse_line(line: &str) -> Result<Self, CAError> {
        serde_json::from_str(line).map_err(|e| CAError::Ledger(format!("invalid record: {}", e)))
    }

    /// The record as one newline-terminated line.
    pub fn to_line(&self) -> Result<String, CAError> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| CAError::Ledger(format!("could not marshal record: {}", e)))?;
        line.push('\n');
        Ok(line)
    }
}

/// Newline-delimited JSON ledger file.
#[derive(Debug)]
pub struct JsonLedger {
    path: PathBuf,
    write: Mutex<()>,
}

impl JsonLedger {
    /// A ledger at `path`. The file is created on the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record in file order. A missing file has no records.
    pub fn records(&self) -> Result<Vec<LedgerRecord>, CAError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = LedgerRecord::parse_line(&line).map_err(|e| {
                CAError::Ledger(format!("{} line {}: {}", self.path.display(), index + 1, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

impl Ledger for JsonLedger {
    fn append(&self, certificate: &SignedCertificate) -> Result<(), CAError> {
        let line = LedgerRecord::from_certificate(certificate).to_line()?;

        let _guard = self
            .write
            .lock()
            .map_err(|_| CAError::Ledger("ledger lock poisoned".to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CAError::Ledger(format!("could not open {}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .map_err(|e| CAError::Ledger(format!("could not write record: {}", e)))?;
        file.sync_data()
            .map_err(|e| CAError::Ledger(format!("could not sync ledger: {}", e)))?;

        log::debug!(
            "recorded certificate {} in {}",
            certificate.serial(),
            self.path.display()
        );
        Ok(())
    }
}
