//! A certificate authority whose private key lives on a hardware token.
//!
//! The host only assembles and parses certificates; every signature is made
//! by the token behind a [`platform::SigningOracle`].

#![forbid(unsafe_code)]

mod error;

/// Certificate value types: names, descriptors, public keys, signed certificates
pub mod certificate;

/// Certificate serial number generation
pub mod serial;

/// Unsigned certificate descriptors for root and leaf certificates
pub mod builder;

/// DER/PEM encoding and decoding of certificates, CSRs and public keys
pub mod codec;

/// Root initialization and CSR signing
pub mod issuance;

/// Append-only record of issued certificates
pub mod ledger;

/// CA configuration file
pub mod config;

/// Structured audit events for operations that use the CA key
pub mod audit;

/// Owner-only files for key material
pub mod secure_file;

/// Clock abstraction for certificate validity windows
pub mod time;

/// Hardware token integration
///
/// The [`platform::SigningOracle`] trait and a directory-backed software
/// token for development and tests.
pub mod platform;

#[allow(unused_imports)]
pub use error::*;

pub use builder::LeafOptions;
pub use certificate::{DistinguishedName, SignedCertificate, SubjectPublicKey};
pub use config::CAConfig;
pub use issuance::{IssuanceEngine, Issued};
pub use ledger::{JsonLedger, Ledger, LedgerRecord};
pub use platform::{HumanPrompt, KeyAlgorithm, SigningOracle, Slot};

pub mod reexports {
    pub use {log, rcgen, thiserror, x509_parser};
}
