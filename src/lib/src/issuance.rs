//! Issuance engine
//!
//! Runs the two operations that use the CA key:
//!
//! - [`IssuanceEngine::initialize`] creates a key on an empty slot and stores
//!   a self-signed CA certificate next to it.
//! - [`IssuanceEngine::sign_csr`] issues a certificate for a CSR, signed by the
//!   CA key in a slot.
//!
//! Configuration problems are detected before the token is touched. Token
//! errors are never retried. A certificate that was signed but could not be
//! written to the ledger is still returned, together with the ledger error.

use crate::audit;
use crate::builder::{build_leaf, build_root, LeafOptions};
use crate::certificate::SignedCertificate;
use crate::codec;
use crate::config::{parse_validity, CAConfig, ResolvedConfig};
use crate::error::CAError;
use crate::ledger::{JsonLedger, Ledger};
use crate::platform::{HumanPrompt, KeyPolicy, SigningOracle, Slot};
use crate::time::{SystemTimeSource, TimeSource};

/// A certificate the engine produced.
#[derive(Debug)]
pub struct Issued {
    pub certificate: SignedCertificate,
    /// PEM `CERTIFICATE` encoding of `certificate`.
    pub pem: String,
    /// Set when the certificate was signed but not recorded in the ledger.
    pub ledger_error: Option<CAError>,
}

/// Issues certificates from a CA key held by a [`SigningOracle`].
pub struct IssuanceEngine<O: SigningOracle, L: Ledger = JsonLedger> {
    oracle: O,
    ledger: Option<L>,
    prompt: Box<dyn HumanPrompt>,
    clock: Box<dyn TimeSource>,
}

impl<O: SigningOracle, L: Ledger> IssuanceEngine<O, L> {
    /// An engine reading the system clock. Without a ledger, issued
    /// certificates are not recorded.
    pub fn new(oracle: O, ledger: Option<L>, prompt: Box<dyn HumanPrompt>) -> Self {
        Self {
            oracle,
            ledger,
            prompt,
            clock: Box::new(SystemTimeSource),
        }
    }

    /// Replace the clock used for validity windows.
    pub fn with_time_source(mut self, clock: Box<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn ledger(&self) -> Option<&L> {
        self.ledger.as_ref()
    }

    /// Create the CA on the slot named in `config`.
    ///
    /// # Errors
    ///
    /// - a configuration error if any field is invalid, before the token is used
    /// - `CAError::AlreadyInitialized` if the slot already holds a certificate
    /// - `CAError::Oracle` if the token fails
    ///
    /// Once the key has been generated, a later failure leaves the slot with
    /// a key and no certificate. Running `initialize` again replaces that key.
    pub fn initialize(&self, config: &CAConfig) -> Result<Issued, CAError> {
        let resolved = config.resolve()?;
        let correlation_id = audit::new_correlation_id();
        let slot = resolved.slot.id();

        audit::log_init_attempt(
            &correlation_id,
            slot,
            resolved.algorithm.name(),
            &resolved.subject.common_name,
        );

        match self.create_root(&resolved, &correlation_id) {
            Ok(certificate) => {
                audit::log_init_success(
                    &correlation_id,
                    slot,
                    &certificate.serial().to_hex(),
                    &certificate.fingerprint(),
                );
                log::info!(
                    "certificate authority {:?} initialized on slot {}",
                    resolved.subject.common_name,
                    slot
                );
                Ok(self.finish(certificate, &correlation_id))
            }
            Err(e) => {
                audit::log_init_failure(&correlation_id, slot, e.kind().as_str(), &e.to_string());
                Err(e)
            }
        }
    }

    fn create_root(
        &self,
        config: &ResolvedConfig,
        correlation_id: &str,
    ) -> Result<SignedCertificate, CAError> {
        let slot = config.slot;
        if self.oracle.has_certificate(slot)? {
            return Err(CAError::AlreadyInitialized { slot });
        }

        let public_key = self
            .oracle
            .generate_key(slot, config.algorithm, KeyPolicy::CA)?;
        audit::log_key_generation(
            correlation_id,
            slot.id(),
            config.algorithm.name(),
            &public_key.fingerprint(),
        );

        self.self_sign_and_store(config, public_key).map_err(|e| {
            log::warn!(
                "slot {} now holds a CA key without a certificate; run init again to replace it",
                slot
            );
            e
        })
    }

    fn self_sign_and_store(
        &self,
        config: &ResolvedConfig,
        public_key: crate::certificate::SubjectPublicKey,
    ) -> Result<SignedCertificate, CAError> {
        let descriptor = build_root(
            &config.subject,
            public_key,
            config.validity,
            &config.crl,
            self.clock.as_ref(),
        )?;
        let certificate = codec::sign_descriptor(
            &descriptor,
            None,
            &self.oracle,
            config.slot,
            self.prompt.as_ref(),
        )?;
        self.oracle.store_certificate(config.slot, &certificate)?;
        Ok(certificate)
    }

    /// Issue a certificate for the PEM CSR in `csr`, signed by the CA on `slot`.
    ///
    /// `validity` is a duration such as `24h`. Nothing is written to the token.
    ///
    /// # Errors
    ///
    /// - `CAError::UnknownSlot` / `CAError::InvalidValidity` before the token is used
    /// - `CAError::Parse` for a malformed CSR or one with a bad signature
    /// - `CAError::NotFound` if the slot holds no CA certificate
    /// - `CAError::Oracle` if the token fails
    pub fn sign_csr(
        &self,
        slot: &str,
        csr: &[u8],
        validity: &str,
        options: LeafOptions,
    ) -> Result<Issued, CAError> {
        let slot: Slot = slot.parse()?;
        let validity = parse_validity(validity)?;
        let request = codec::decode_csr(csr)?;

        let correlation_id = audit::new_correlation_id();
        audit::log_issuance_attempt(&correlation_id, slot.id(), &request.subject.common_name);

        let issued = self.ca_certificate(slot).and_then(|ca| {
            let descriptor = build_leaf(&ca, &request, validity, options, self.clock.as_ref())?;
            codec::sign_descriptor(
                &descriptor,
                Some(&ca),
                &self.oracle,
                slot,
                self.prompt.as_ref(),
            )
        });

        match issued {
            Ok(certificate) => {
                audit::log_issuance_success(
                    &correlation_id,
                    slot.id(),
                    &certificate.subject().common_name,
                    &certificate.serial().to_hex(),
                    &certificate.fingerprint(),
                );
                Ok(self.finish(certificate, &correlation_id))
            }
            Err(e) => {
                audit::log_issuance_failure(
                    &correlation_id,
                    slot.id(),
                    e.kind().as_str(),
                    &e.to_string(),
                );
                Err(e)
            }
        }
    }

    /// The CA certificate on `slot`.
    pub fn ca_certificate(&self, slot: Slot) -> Result<SignedCertificate, CAError> {
        self.oracle.certificate(slot)
    }

    /// PEM `CERTIFICATE` of the CA on `slot`.
    pub fn export_ca_pem(&self, slot: Slot) -> Result<String, CAError> {
        Ok(codec::encode_certificate_pem(&self.ca_certificate(slot)?))
    }

    /// PEM `PUBLIC KEY` of the CA on `slot`.
    pub fn export_public_key_pem(&self, slot: Slot) -> Result<String, CAError> {
        let ca = self.ca_certificate(slot)?;
        Ok(codec::encode_public_key_pem(ca.public_key()))
    }

    fn finish(&self, certificate: SignedCertificate, correlation_id: &str) -> Issued {
        let ledger_error = match &self.ledger {
            Some(ledger) => ledger.append(&certificate).err(),
            None => {
                log::warn!(
                    "no ledger configured; certificate {} is not recorded",
                    certificate.serial()
                );
                None
            }
        };
        if let Some(e) = &ledger_error {
            log::error!(
                "certificate {} was issued but not recorded: {}",
                certificate.serial(),
                e
            );
            audit::log_ledger_failure(correlation_id, &certificate.serial().to_hex(), &e.to_string());
        }

        Issued {
            pem: codec::encode_certificate_pem(&certificate),
            certificate,
            ledger_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DnConfig;
    use crate::platform::software::SoftwareToken;
    use crate::platform::StaticPrompt;
    use crate::time::FixedTimeSource;
    use tempfile::tempdir;

    fn config(slot: &str) -> CAConfig {
        CAConfig {
            slot: slot.to_string(),
            algorithm: "ec256".to_string(),
            validity: "8766h".to_string(),
            subject: DnConfig {
                organization: vec!["Example".to_string()],
                common_name: "TestCA".to_string(),
                ..Default::default()
            },
            crl: vec!["http://crl.example.com/ca.crl".to_string()],
        }
    }

    fn csr_pem() -> String {
        let kp = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
        let params = rcgen::CertificateParams::new(vec!["leaf.example.com".to_string()]).unwrap();
        params.serialize_request(&kp).unwrap().pem().unwrap()
    }

    fn engine(dir: &std::path::Path) -> IssuanceEngine<SoftwareToken> {
        let token = SoftwareToken::open(dir.join("token")).unwrap();
        IssuanceEngine::new(
            token,
            Some(JsonLedger::new(dir.join("ledger.json"))),
            Box::new(StaticPrompt::new("123456")),
        )
        .with_time_source(Box::new(FixedTimeSource::from_unix_secs(1_704_067_200).unwrap()))
    }

    #[test]
    fn test_initialize_then_sign() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());

        let root = engine.initialize(&config("9c")).unwrap();
        assert!(root.ledger_error.is_none());
        assert!(root.certificate.descriptor().is_ca);
        assert_eq!(engine.ca_certificate(Slot::Signature).unwrap(), root.certificate);

        let leaf = engine
            .sign_csr("9c", csr_pem().as_bytes(), "24h", LeafOptions::default())
            .unwrap();
        assert!(leaf.pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert_eq!(leaf.certificate.descriptor().issuer.common_name, "TestCA");

        let records = engine.ledger().unwrap().records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].serial, root.certificate.serial().to_hex());
        assert_eq!(records[1].serial, leaf.certificate.serial().to_hex());
        assert_eq!(records[1].dns_names, vec!["leaf.example.com"]);
    }

    #[test]
    fn test_export() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        assert!(matches!(
            engine.export_ca_pem(Slot::Signature),
            Err(CAError::NotFound { .. })
        ));

        let root = engine.initialize(&config("9c")).unwrap();
        assert_eq!(engine.export_ca_pem(Slot::Signature).unwrap(), root.pem);
        let key_pem = engine.export_public_key_pem(Slot::Signature).unwrap();
        assert!(key_pem.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn test_sign_without_ca() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let err = engine
            .sign_csr("9a", csr_pem().as_bytes(), "24h", LeafOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "no certificate authority configured on slot 9a");
    }

    #[test]
    fn test_invalid_validity() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        engine.initialize(&config("9c")).unwrap();
        assert!(matches!(
            engine.sign_csr("9c", csr_pem().as_bytes(), "tomorrow", LeafOptions::default()),
            Err(CAError::InvalidValidity { .. })
        ));
    }

    #[test]
    fn test_ledger_failure_still_returns_certificate() {
        let dir = tempdir().unwrap();
        let token = SoftwareToken::open(dir.path().join("token")).unwrap();
        // A directory cannot be opened for appending.
        let engine: IssuanceEngine<SoftwareToken> = IssuanceEngine::new(
            token,
            Some(JsonLedger::new(dir.path())),
            Box::new(StaticPrompt::new("")),
        );

        let issued = engine.initialize(&config("9e")).unwrap();
        assert!(matches!(issued.ledger_error, Some(CAError::Ledger(_))));
        assert!(engine.oracle().has_certificate(Slot::CardAuthentication).unwrap());
    }

    #[test]
    fn test_without_ledger() {
        let dir = tempdir().unwrap();
        let token = SoftwareToken::open(dir.path().join("token")).unwrap();
        let engine: IssuanceEngine<SoftwareToken> =
            IssuanceEngine::new(token, None, Box::new(StaticPrompt::new("")));
        let issued = engine.initialize(&config("9d")).unwrap();
        assert!(issued.ledger_error.is_none());
        assert!(engine.ledger().is_none());
    }

    #[test]
    fn test_unsupported_algorithm_leaves_slot_empty() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let mut cfg = config("9c");
        cfg.algorithm = "rsa2048".to_string();
        assert!(matches!(engine.initialize(&cfg), Err(CAError::Oracle { .. })));
        assert!(!engine.oracle().has_certificate(Slot::Signature).unwrap());
    }
}
