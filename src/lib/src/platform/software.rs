/// Directory-backed software token (development/testing only)
///
/// Emulates a PIV token with plain files, one set per slot:
///
/// ```text
/// <dir>/9c.key     PKCS#8 PEM private key, mode 0600
/// <dir>/9c.crt     PEM certificate
/// <dir>/9c.policy  JSON key policy
/// ```
///
/// # Security Warning
///
/// **NOT SUITABLE FOR PRODUCTION USE**
///
/// - Private keys are readable by anyone who can read the directory
/// - No physical presence check; a "touch" is only announced
///
/// Use only for development, CI and tests.

use super::{HumanPrompt, KeyAlgorithm, KeyPolicy, PinPolicy, SigningOracle, Slot, TouchPolicy};
use crate::certificate::{SignedCertificate, SubjectPublicKey};
use crate::codec;
use crate::error::CAError;
use crate::secure_file;
use rcgen::PublicKeyData;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Software token rooted at a directory.
///
/// # Example
///
/// ```ignore
/// use yubca::platform::software::SoftwareToken;
/// use yubca::platform::{KeyAlgorithm, KeyPolicy, SigningOracle, Slot};
///
/// let token = SoftwareToken::open("/tmp/yubca-token")?;
/// let public_key = token.generate_key(Slot::Signature, KeyAlgorithm::EcP256, KeyPolicy::CA)?;
/// ```
pub struct SoftwareToken {
    dir: PathBuf,
    pin: Option<String>,
    lock: Mutex<()>,
}

impl SoftwareToken {
    /// Open (creating if needed) a token directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CAError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        log::warn!(
            "Using software token at '{}' - NOT SUITABLE FOR PRODUCTION. \
             CA keys are stored on disk without hardware protection.",
            dir.display()
        );

        Ok(SoftwareToken {
            dir,
            pin: None,
            lock: Mutex::new(()),
        })
    }

    /// Require `pin` for keys whose policy asks for one.
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, slot: Slot, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", slot.id(), extension))
    }

    fn guard(&self, slot: Slot, operation: &'static str) -> Result<std::sync::MutexGuard<'_, ()>, CAError> {
        self.lock
            .lock()
            .map_err(|_| CAError::oracle(slot, operation, "token lock poisoned"))
    }

    fn load_key(&self, slot: Slot) -> Result<rcgen::KeyPair, CAError> {
        let path = self.path(slot, "key");
        if !path.exists() {
            return Err(CAError::oracle(slot, "sign", "no key in slot"));
        }
        let pem = secure_file::read_secure_string(&path)
            .map_err(|e| CAError::oracle(slot, "sign", e))?;
        rcgen::KeyPair::from_pem(&pem).map_err(|e| CAError::oracle(slot, "sign", e))
    }

    fn load_policy(&self, slot: Slot) -> Result<KeyPolicy, CAError> {
        let path = self.path(slot, "policy");
        match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| CAError::oracle(slot, "sign", format!("corrupt key policy: {}", e))),
            // Keys imported by hand carry no policy file.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KeyPolicy::CA),
            Err(e) => Err(CAError::oracle(slot, "sign", e)),
        }
    }
}

impl SigningOracle for SoftwareToken {
    fn name(&self) -> &str {
        "Software token"
    }

    fn has_certificate(&self, slot: Slot) -> Result<bool, CAError> {
        self.path(slot, "crt")
            .try_exists()
            .map_err(|e| CAError::oracle(slot, "read certificate", e))
    }

    fn certificate(&self, slot: Slot) -> Result<SignedCertificate, CAError> {
        let path = self.path(slot, "crt");
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CAError::NotFound { slot })
            }
            Err(e) => return Err(CAError::oracle(slot, "read certificate", e)),
        };
        codec::decode_certificate_pem(&data)
    }

    fn generate_key(
        &self,
        slot: Slot,
        algorithm: KeyAlgorithm,
        policy: KeyPolicy,
    ) -> Result<SubjectPublicKey, CAError> {
        let rcgen_alg = match algorithm {
            KeyAlgorithm::EcP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            KeyAlgorithm::EcP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
            KeyAlgorithm::Ed25519 => &rcgen::PKCS_ED25519,
            KeyAlgorithm::Rsa1024 | KeyAlgorithm::Rsa2048 => {
                return Err(CAError::oracle(
                    slot,
                    "generate key",
                    format!("algorithm {} not supported by software token", algorithm),
                ))
            }
        };

        let _guard = self.guard(slot, "generate key")?;
        let key_pair = rcgen::KeyPair::generate_for(rcgen_alg)
            .map_err(|e| CAError::oracle(slot, "generate key", e))?;

        secure_file::write_secure(&self.path(slot, "key"), key_pair.serialize_pem().as_bytes())
            .map_err(|e| CAError::oracle(slot, "generate key", e))?;
        let policy_json = serde_json::to_vec(&policy)
            .map_err(|e| CAError::oracle(slot, "generate key", e))?;
        fs::write(self.path(slot, "policy"), policy_json)
            .map_err(|e| CAError::oracle(slot, "generate key", e))?;

        // A certificate for the previous key no longer matches.
        let crt = self.path(slot, "crt");
        if crt.exists() {
            fs::remove_file(&crt).map_err(|e| CAError::oracle(slot, "generate key", e))?;
        }

        log::info!("generated {} key in software token slot {}", algorithm, slot);
        SubjectPublicKey::from_spki_der(&key_pair.subject_public_key_info())
    }

    fn sign(
        &self,
        slot: Slot,
        public_key: &SubjectPublicKey,
        data: &[u8],
        prompt: &dyn HumanPrompt,
    ) -> Result<Vec<u8>, CAError> {
        let _guard = self.guard(slot, "sign")?;
        let key_pair = self.load_key(slot)?;
        if key_pair.subject_public_key_info() != public_key.spki_der() {
            return Err(CAError::oracle(
                slot,
                "sign",
                "public key does not match the key in the slot",
            ));
        }

        let policy = self.load_policy(slot)?;
        if policy.pin != PinPolicy::Never {
            let pin = prompt.pin()?;
            if let Some(expected) = &self.pin {
                if &pin != expected {
                    return Err(CAError::oracle(slot, "sign", "incorrect PIN"));
                }
            }
        }
        if policy.touch != TouchPolicy::Never {
            prompt.touch();
        }

        rcgen::SigningKey::sign(&key_pair, data).map_err(|e| CAError::oracle(slot, "sign", e))
    }

    fn store_certificate(&self, slot: Slot, certificate: &SignedCertificate) -> Result<(), CAError> {
        let _guard = self.guard(slot, "store certificate")?;
        fs::write(self.path(slot, "crt"), codec::encode_certificate_pem(certificate))
            .map_err(|e| CAError::oracle(slot, "store certificate", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_root;
    use crate::certificate::DistinguishedName;
    use crate::platform::StaticPrompt;
    use crate::time::SystemTimeSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    struct CountingPrompt {
        pin: &'static str,
        pins: AtomicUsize,
        touches: AtomicUsize,
    }

    impl CountingPrompt {
        fn new(pin: &'static str) -> Self {
            Self {
                pin,
                pins: AtomicUsize::new(0),
                touches: AtomicUsize::new(0),
            }
        }
    }

    impl HumanPrompt for CountingPrompt {
        fn pin(&self) -> Result<String, CAError> {
            self.pins.fetch_add(1, Ordering::SeqCst);
            Ok(self.pin.to_string())
        }

        fn touch(&self) {
            self.touches.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_generate_sign_store() {
        let dir = tempdir().unwrap();
        let token = SoftwareToken::open(dir.path()).unwrap();

        assert!(!token.has_certificate(Slot::Signature).unwrap());
        assert!(matches!(
            token.certificate(Slot::Signature),
            Err(CAError::NotFound { slot: Slot::Signature })
        ));

        let key = token
            .generate_key(Slot::Signature, KeyAlgorithm::EcP256, KeyPolicy::CA)
            .unwrap();
        let descriptor = build_root(
            &DistinguishedName::with_common_name("TestCA"),
            key,
            Duration::from_secs(3600),
            &[],
            &SystemTimeSource,
        )
        .unwrap();
        let prompt = CountingPrompt::new("123456");
        let cert =
            codec::sign_descriptor(&descriptor, None, &token, Slot::Signature, &prompt).unwrap();
        assert_eq!(prompt.pins.load(Ordering::SeqCst), 1);
        assert_eq!(prompt.touches.load(Ordering::SeqCst), 1);

        token.store_certificate(Slot::Signature, &cert).unwrap();
        assert!(token.has_certificate(Slot::Signature).unwrap());
        assert_eq!(token.certificate(Slot::Signature).unwrap(), cert);
        assert!(!token.has_certificate(Slot::Authentication).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let token = SoftwareToken::open(dir.path()).unwrap();
        token
            .generate_key(Slot::KeyManagement, KeyAlgorithm::Ed25519, KeyPolicy::CA)
            .unwrap();
        let mode = fs::metadata(dir.path().join("9d.key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_rsa_not_supported() {
        let dir = tempdir().unwrap();
        let token = SoftwareToken::open(dir.path()).unwrap();
        let err = token
            .generate_key(Slot::Signature, KeyAlgorithm::Rsa2048, KeyPolicy::CA)
            .unwrap_err();
        assert!(matches!(
            &err,
            CAError::Oracle { operation: "generate key", message, .. }
                if message.contains("not supported by software token")
        ));
    }

    #[test]
    fn test_wrong_pin_rejected() {
        let dir = tempdir().unwrap();
        let token = SoftwareToken::open(dir.path()).unwrap().with_pin("654321");
        let key = token
            .generate_key(Slot::Signature, KeyAlgorithm::EcP384, KeyPolicy::CA)
            .unwrap();

        let err = token
            .sign(Slot::Signature, &key, b"data", &StaticPrompt::new("123456"))
            .unwrap_err();
        assert!(matches!(&err, CAError::Oracle { message, .. } if message == "incorrect PIN"));

        let signature = token
            .sign(Slot::Signature, &key, b"data", &StaticPrompt::new("654321"))
            .unwrap();
        assert!(!signature.is_empty());
    }

    #[test]
    fn test_public_key_hint_must_match() {
        let dir = tempdir().unwrap();
        let token = SoftwareToken::open(dir.path()).unwrap();
        let first = token
            .generate_key(Slot::Signature, KeyAlgorithm::EcP256, KeyPolicy::CA)
            .unwrap();
        token
            .generate_key(Slot::Signature, KeyAlgorithm::EcP256, KeyPolicy::CA)
            .unwrap();

        let err = token
            .sign(Slot::Signature, &first, b"data", &StaticPrompt::new(""))
            .unwrap_err();
        assert!(matches!(err, CAError::Oracle { operation: "sign", .. }));
    }

    #[test]
    fn test_policy_without_pin_or_touch() {
        let dir = tempdir().unwrap();
        let token = SoftwareToken::open(dir.path()).unwrap().with_pin("999999");
        let policy = KeyPolicy {
            pin: PinPolicy::Never,
            touch: TouchPolicy::Never,
        };
        let key = token
            .generate_key(Slot::CardAuthentication, KeyAlgorithm::Ed25519, policy)
            .unwrap();

        let prompt = CountingPrompt::new("wrong");
        token.sign(Slot::CardAuthentication, &key, b"data", &prompt).unwrap();
        assert_eq!(prompt.pins.load(Ordering::SeqCst), 0);
        assert_eq!(prompt.touches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sign_empty_slot() {
        let dir = tempdir().unwrap();
        let token = SoftwareToken::open(dir.path()).unwrap();
        let other = SoftwareToken::open(dir.path().join("other")).unwrap();
        let key = other
            .generate_key(Slot::Signature, KeyAlgorithm::EcP256, KeyPolicy::CA)
            .unwrap();
        assert!(matches!(
            token.sign(Slot::Signature, &key, b"data", &StaticPrompt::new("")),
            Err(CAError::Oracle { .. })
        ));
    }
}
