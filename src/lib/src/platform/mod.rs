/// Hardware token integration
///
/// The CA private key lives in a slot of a hardware token and never leaves it.
/// Everything the engine needs from the token goes through the [`SigningOracle`]
/// trait, so the issuance logic is identical whether the backend is a YubiKey,
/// another PIV card, or the development [`software::SoftwareToken`].
///
/// # Architecture
///
/// ```text
/// ┌─────────────────────┐
/// │  IssuanceEngine     │
/// └──────────┬──────────┘
///            │
///            ▼
/// ┌─────────────────────┐        ┌──────────────┐
/// │  SigningOracle      │ ─────► │ HumanPrompt  │  (PIN, touch)
/// │     (trait)         │        └──────────────┘
/// └──────────┬──────────┘
///            │
///      ┌─────┴──────┐
///      ▼            ▼
///   PIV token    Software
///   (external)   token
/// ```
///
/// # Security Principles
///
/// 1. **Keys never exposed**: only public keys and signatures cross the trait
/// 2. **Human in the loop**: CA keys are generated with PIN and touch required on every use
/// 3. **Fail closed**: oracle errors abort the operation and are never retried

use crate::certificate::{SignedCertificate, SubjectPublicKey};
use crate::error::CAError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod software;

/// A PIV key slot on the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// 9a
    Authentication,
    /// 9c
    Signature,
    /// 9d
    KeyManagement,
    /// 9e
    CardAuthentication,
}

impl Slot {
    pub const ALL: [Slot; 4] = [
        Slot::Authentication,
        Slot::Signature,
        Slot::KeyManagement,
        Slot::CardAuthentication,
    ];

    /// The slot identifier as written in configuration, e.g. `9c`.
    pub fn id(&self) -> &'static str {
        match self {
            Slot::Authentication => "9a",
            Slot::Signature => "9c",
            Slot::KeyManagement => "9d",
            Slot::CardAuthentication => "9e",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Slot {
    type Err = CAError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "9a" => Ok(Slot::Authentication),
            "9c" => Ok(Slot::Signature),
            "9d" => Ok(Slot::KeyManagement),
            "9e" => Ok(Slot::CardAuthentication),
            other => Err(CAError::UnknownSlot(other.to_string())),
        }
    }
}

/// Key algorithms a token slot can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    EcP256,
    EcP384,
    Ed25519,
    Rsa1024,
    Rsa2048,
}

impl KeyAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::EcP256 => "ec256",
            KeyAlgorithm::EcP384 => "ec384",
            KeyAlgorithm::Ed25519 => "ed25519",
            KeyAlgorithm::Rsa1024 => "rsa1024",
            KeyAlgorithm::Rsa2048 => "rsa2048",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = CAError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ec256" | "EC256" => Ok(KeyAlgorithm::EcP256),
            "ec384" | "EC384" => Ok(KeyAlgorithm::EcP384),
            "ed25519" | "ED25519" => Ok(KeyAlgorithm::Ed25519),
            "rsa1024" | "RSA1024" => Ok(KeyAlgorithm::Rsa1024),
            "rsa2048" | "RSA2048" => Ok(KeyAlgorithm::Rsa2048),
            other => Err(CAError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// When the token requires the PIN for a private key operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinPolicy {
    Never,
    Once,
    Always,
}

/// When the token requires a physical touch for a private key operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPolicy {
    Never,
    Cached,
    Always,
}

/// Usage policy attached to a key when it is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeyPolicy {
    pub pin: PinPolicy,
    pub touch: TouchPolicy,
}

impl KeyPolicy {
    /// The fixed policy for CA keys: PIN and touch on every signature.
    pub const CA: KeyPolicy = KeyPolicy {
        pin: PinPolicy::Always,
        touch: TouchPolicy::Always,
    };
}

/// Interaction with the operator while the token is waiting.
///
/// Calls block until the human answers; there is no timeout.
pub trait HumanPrompt: Send + Sync {
    /// Ask for the PIN. An empty answer should be mapped to the token's default PIN.
    fn pin(&self) -> Result<String, CAError>;

    /// Tell the operator the token is waiting for a touch.
    fn touch(&self);
}

/// Non-interactive prompt that always answers with a fixed PIN.
#[derive(Debug, Clone)]
pub struct StaticPrompt {
    pin: String,
}

impl StaticPrompt {
    pub fn new(pin: impl Into<String>) -> Self {
        Self { pin: pin.into() }
    }
}

impl HumanPrompt for StaticPrompt {
    fn pin(&self) -> Result<String, CAError> {
        Ok(self.pin.clone())
    }

    fn touch(&self) {
        log::debug!("touch requested (non-interactive prompt)");
    }
}

/// The token-resident CA key, seen from the host.
///
/// # Signature format
///
/// `sign` signs the message `data` (not a digest) with the slot key:
///
/// - EC-256: DER `ECDSA-Sig-Value` over SHA-256
/// - EC-384: DER `ECDSA-Sig-Value` over SHA-384
/// - Ed25519: 64 raw bytes
/// - RSA: PKCS#1 v1.5 with SHA-256
///
/// Implementations that talk to real hardware block inside `sign` while the
/// operator enters the PIN and touches the device. Once a signature request has
/// reached the token it cannot be cancelled.
pub trait SigningOracle: Send + Sync {
    /// Human-readable backend name, e.g. "YubiKey 5 NFC" or "Software token".
    fn name(&self) -> &str;

    /// Whether a certificate is stored on `slot`.
    fn has_certificate(&self, slot: Slot) -> Result<bool, CAError>;

    /// The certificate stored on `slot`.
    ///
    /// # Errors
    ///
    /// - `CAError::NotFound` if the slot holds no certificate
    /// - `CAError::Oracle` for any other token failure
    fn certificate(&self, slot: Slot) -> Result<SignedCertificate, CAError>;

    /// Generate a new key pair in `slot`, replacing any key already there.
    fn generate_key(
        &self,
        slot: Slot,
        algorithm: KeyAlgorithm,
        policy: KeyPolicy,
    ) -> Result<SubjectPublicKey, CAError>;

    /// Sign `data` with the private key in `slot`.
    ///
    /// `public_key` is the key the caller expects to be in the slot; backends
    /// must refuse to sign if it does not match.
    fn sign(
        &self,
        slot: Slot,
        public_key: &SubjectPublicKey,
        data: &[u8],
        prompt: &dyn HumanPrompt,
    ) -> Result<Vec<u8>, CAError>;

    /// Store `certificate` on `slot`.
    fn store_certificate(&self, slot: Slot, certificate: &SignedCertificate)
        -> Result<(), CAError>;
}

impl<T: SigningOracle + ?Sized> SigningOracle for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn has_certificate(&self, slot: Slot) -> Result<bool, CAError> {
        (**self).has_certificate(slot)
    }

    fn certificate(&self, slot: Slot) -> Result<SignedCertificate, CAError> {
        (**self).certificate(slot)
    }

    fn generate_key(
        &self,
        slot: Slot,
        algorithm: KeyAlgorithm,
        policy: KeyPolicy,
    ) -> Result<SubjectPublicKey, CAError> {
        (**self).generate_key(slot, algorithm, policy)
    }

    fn sign(
        &self,
        slot: Slot,
        public_key: &SubjectPublicKey,
        data: &[u8],
        prompt: &dyn HumanPrompt,
    ) -> Result<Vec<u8>, CAError> {
        (**self).sign(slot, public_key, data, prompt)
    }

    fn store_certificate(
        &self,
        slot: Slot,
        certificate: &SignedCertificate,
    ) -> Result<(), CAError> {
        (**self).store_certificate(slot, certificate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_parse() {
        assert_eq!("9a".parse::<Slot>().unwrap(), Slot::Authentication);
        assert_eq!("9c".parse::<Slot>().unwrap(), Slot::Signature);
        assert_eq!("9d".parse::<Slot>().unwrap(), Slot::KeyManagement);
        assert_eq!("9e".parse::<Slot>().unwrap(), Slot::CardAuthentication);
        assert!(matches!(
            "9z".parse::<Slot>(),
            Err(CAError::UnknownSlot(s)) if s == "9z"
        ));
        assert!("9C".parse::<Slot>().is_err());
    }

    #[test]
    fn test_slot_display_roundtrip() {
        for slot in Slot::ALL {
            assert_eq!(slot.to_string().parse::<Slot>().unwrap(), slot);
        }
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("ec256".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::EcP256);
        assert_eq!("EC384".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::EcP384);
        assert_eq!("ED25519".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Ed25519);
        assert_eq!("rsa1024".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Rsa1024);
        assert_eq!("RSA2048".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Rsa2048);
        assert!(matches!(
            "Ec256".parse::<KeyAlgorithm>(),
            Err(CAError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_ca_policy_requires_pin_and_touch() {
        assert_eq!(KeyPolicy::CA.pin, PinPolicy::Always);
        assert_eq!(KeyPolicy::CA.touch, TouchPolicy::Always);
    }

    #[test]
    fn test_static_prompt() {
        let prompt = StaticPrompt::new("123456");
        assert_eq!(prompt.pin().unwrap(), "123456");
        prompt.touch();
    }
}
