//! Certificate value types shared by the builder, codec and engine.
//!
//! A [`CertificateDescriptor`] is everything that goes into a certificate
//! before it is signed. A [`SignedCertificate`] is what comes back: the DER
//! bytes plus the descriptor parsed back out of them.

use crate::error::CAError;
use crate::serial::SerialNumber;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::IpAddr;
use time::OffsetDateTime;
use x509_parser::prelude::FromDer;
use x509_parser::x509::SubjectPublicKeyInfo;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_ED25519: &str = "1.3.101.112";
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_P384: &str = "1.3.132.0.34";

/// An X.509 distinguished name.
///
/// Every attribute but the common name may repeat. Attributes render and
/// encode in the order C, ST, L, O, OU, CN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinguishedName {
    pub country: Vec<String>,
    pub province: Vec<String>,
    pub locality: Vec<String>,
    pub organization: Vec<String>,
    pub organizational_unit: Vec<String>,
    pub common_name: String,
}

impl DistinguishedName {
    /// A name with only a common name set.
    pub fn with_common_name(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Default::default()
        }
    }

    /// `(short name, value)` pairs in encoding order. An empty CN is skipped.
    pub fn attributes(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        let groups: [(&'static str, &Vec<String>); 5] = [
            ("C", &self.country),
            ("ST", &self.province),
            ("L", &self.locality),
            ("O", &self.organization),
            ("OU", &self.organizational_unit),
        ];
        for (tag, values) in groups {
            out.extend(values.iter().map(|v| (tag, v.as_str())));
        }
        if !self.common_name.is_empty() {
            out.push(("CN", self.common_name.as_str()));
        }
        out
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .attributes()
            .into_iter()
            .map(|(tag, value)| format!("{}={}", tag, value))
            .collect();
        f.write_str(&rendered.join(", "))
    }
}

/// Subject alternative names, grouped by kind. Order within each kind is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltNames {
    pub dns: Vec<String>,
    pub ip: Vec<IpAddr>,
    pub uri: Vec<String>,
    pub email: Vec<String>,
}

impl SubjectAltNames {
    pub fn is_empty(&self) -> bool {
        self.dns.is_empty() && self.ip.is_empty() && self.uri.is_empty() && self.email.is_empty()
    }
}

/// The key usage bits this CA sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyUsage {
    pub digital_signature: bool,
    pub key_cert_sign: bool,
    pub crl_sign: bool,
}

impl KeyUsage {
    /// digitalSignature, keyCertSign and cRLSign.
    pub const CA: KeyUsage = KeyUsage {
        digital_signature: true,
        key_cert_sign: true,
        crl_sign: true,
    };

    /// digitalSignature only.
    pub const END_ENTITY: KeyUsage = KeyUsage {
        digital_signature: true,
        key_cert_sign: false,
        crl_sign: false,
    };
}

/// The extended key usages this CA sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub server_auth: bool,
    pub client_auth: bool,
}

impl ExtendedKeyUsage {
    pub fn is_empty(&self) -> bool {
        !self.server_auth && !self.client_auth
    }
}

/// Public key algorithm families the codec can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicKeyAlgorithm {
    EcP256,
    EcP384,
    Ed25519,
    Rsa,
}

impl PublicKeyAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            PublicKeyAlgorithm::EcP256 => "ECDSA P-256",
            PublicKeyAlgorithm::EcP384 => "ECDSA P-384",
            PublicKeyAlgorithm::Ed25519 => "Ed25519",
            PublicKeyAlgorithm::Rsa => "RSA",
        }
    }

    /// OID of the signature algorithm a key of this family signs with.
    pub fn signature_algorithm_oid(&self) -> &'static [u64] {
        match self {
            PublicKeyAlgorithm::EcP256 => &[1, 2, 840, 10045, 4, 3, 2],
            PublicKeyAlgorithm::EcP384 => &[1, 2, 840, 10045, 4, 3, 3],
            PublicKeyAlgorithm::Ed25519 => &[1, 3, 101, 112],
            PublicKeyAlgorithm::Rsa => &[1, 2, 840, 113549, 1, 1, 11],
        }
    }
}

impl fmt::Display for PublicKeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A subject public key, kept as its DER `SubjectPublicKeyInfo`.
#[derive(Clone, PartialEq, Eq)]
pub struct SubjectPublicKey {
    algorithm: PublicKeyAlgorithm,
    spki_der: Vec<u8>,
    key_bits: Vec<u8>,
}

impl SubjectPublicKey {
    /// Parse a DER `SubjectPublicKeyInfo`.
    ///
    /// Only EC P-256/P-384, Ed25519 and RSA keys are accepted.
    pub fn from_spki_der(der: &[u8]) -> Result<Self, CAError> {
        let (rest, spki) = SubjectPublicKeyInfo::from_der(der)
            .map_err(|e| CAError::Parse(format!("malformed public key: {}", e)))?;
        if !rest.is_empty() {
            return Err(CAError::Parse(
                "trailing data after public key".to_string(),
            ));
        }
        Self::from_parsed(&spki)
    }

    pub(crate) fn from_parsed(spki: &SubjectPublicKeyInfo<'_>) -> Result<Self, CAError> {
        let algorithm = match spki.algorithm.algorithm.to_id_string().as_str() {
            OID_RSA_ENCRYPTION => PublicKeyAlgorithm::Rsa,
            OID_ED25519 => PublicKeyAlgorithm::Ed25519,
            OID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .and_then(|p| p.as_oid().ok())
                    .map(|oid| oid.to_id_string())
                    .ok_or_else(|| CAError::Parse("EC public key without a named curve".to_string()))?;
                match curve.as_str() {
                    OID_CURVE_P256 => PublicKeyAlgorithm::EcP256,
                    OID_CURVE_P384 => PublicKeyAlgorithm::EcP384,
                    other => {
                        return Err(CAError::Parse(format!("unsupported EC curve {}", other)))
                    }
                }
            }
            other => {
                return Err(CAError::Parse(format!(
                    "unsupported public key algorithm {}",
                    other
                )))
            }
        };
        Ok(Self {
            algorithm,
            spki_der: spki.raw.to_vec(),
            key_bits: spki.subject_public_key.data.to_vec(),
        })
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    /// The full DER `SubjectPublicKeyInfo`.
    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    /// Content of the `subjectPublicKey` BIT STRING.
    pub fn key_bits(&self) -> &[u8] {
        &self.key_bits
    }

    /// `SHA256:` followed by the base64 SHA-256 of the `SubjectPublicKeyInfo`.
    pub fn fingerprint(&self) -> String {
        sha256_fingerprint(&self.spki_der)
    }
}

impl fmt::Debug for SubjectPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubjectPublicKey")
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Everything that goes into a certificate, before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDescriptor {
    /// X.509 version number as displayed (3 for v3).
    pub version: u32,
    pub serial: SerialNumber,
    pub issuer: DistinguishedName,
    pub subject: DistinguishedName,
    /// DER of the issuer `Name` exactly as the issuing CA carries it. When
    /// set it is written verbatim instead of encoding `issuer`.
    pub issuer_der: Option<Vec<u8>>,
    /// DER of the subject `Name` exactly as requested. When set it is written
    /// verbatim instead of encoding `subject`.
    pub subject_der: Option<Vec<u8>>,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub key_usage: KeyUsage,
    pub extended_key_usage: ExtendedKeyUsage,
    pub is_ca: bool,
    pub subject_alt_names: SubjectAltNames,
    pub crl_distribution_points: Vec<String>,
    pub public_key: SubjectPublicKey,
}

impl CertificateDescriptor {
    /// Check the structural invariants the encoder relies on.
    pub fn validate(&self) -> Result<(), CAError> {
        if self.not_before > self.not_after {
            return Err(CAError::Certificate(format!(
                "notBefore {} is after notAfter {}",
                self.not_before, self.not_after
            )));
        }
        if self.is_ca && !(self.key_usage.key_cert_sign && self.key_usage.crl_sign) {
            return Err(CAError::Certificate(
                "CA certificate without keyCertSign and cRLSign".to_string(),
            ));
        }
        Ok(())
    }
}

/// A signed certificate: its DER encoding and the fields parsed out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificate {
    pub(crate) der: Vec<u8>,
    pub(crate) descriptor: CertificateDescriptor,
    pub(crate) signature_algorithm: String,
    pub(crate) signature: Vec<u8>,
    pub(crate) subject_key_id: Option<Vec<u8>>,
    pub(crate) authority_key_id: Option<Vec<u8>>,
}

impl SignedCertificate {
    /// Parse a DER certificate. See [`crate::codec::parse_certificate`].
    pub fn from_der(der: &[u8]) -> Result<Self, CAError> {
        crate::codec::parse_certificate(der)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn descriptor(&self) -> &CertificateDescriptor {
        &self.descriptor
    }

    /// Signature algorithm name, or the dotted OID if it is not one this CA uses.
    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn subject_key_id(&self) -> Option<&[u8]> {
        self.subject_key_id.as_deref()
    }

    pub fn authority_key_id(&self) -> Option<&[u8]> {
        self.authority_key_id.as_deref()
    }

    pub fn serial(&self) -> &SerialNumber {
        &self.descriptor.serial
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.descriptor.subject
    }

    /// DER of the subject `Name` as it appears in the certificate.
    pub fn subject_der(&self) -> Option<&[u8]> {
        self.descriptor.subject_der.as_deref()
    }

    pub fn public_key(&self) -> &SubjectPublicKey {
        &self.descriptor.public_key
    }

    /// `SHA256:` followed by the base64 SHA-256 of the DER certificate.
    pub fn fingerprint(&self) -> String {
        sha256_fingerprint(&self.der)
    }
}

fn sha256_fingerprint(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!(
        "SHA256:{}",
        base64::engine::general_purpose::STANDARD.encode(digest)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_name() -> DistinguishedName {
        DistinguishedName {
            country: vec!["US".into()],
            province: vec!["California".into()],
            locality: vec!["San Francisco".into()],
            organization: vec!["Example Corp".into()],
            organizational_unit: vec!["Security".into(), "PKI".into()],
            common_name: "Example CA".into(),
        }
    }

    #[test]
    fn test_dn_display_order() {
        assert_eq!(
            full_name().to_string(),
            "C=US, ST=California, L=San Francisco, O=Example Corp, OU=Security, OU=PKI, CN=Example CA"
        );
        assert_eq!(
            DistinguishedName::with_common_name("leaf").to_string(),
            "CN=leaf"
        );
        assert_eq!(DistinguishedName::default().to_string(), "");
    }

    #[test]
    fn test_public_key_from_rcgen_keys() {
        use rcgen::PublicKeyData;

        let cases = [
            (&rcgen::PKCS_ECDSA_P256_SHA256, PublicKeyAlgorithm::EcP256),
            (&rcgen::PKCS_ECDSA_P384_SHA384, PublicKeyAlgorithm::EcP384),
            (&rcgen::PKCS_ED25519, PublicKeyAlgorithm::Ed25519),
        ];
        for (alg, expected) in cases {
            let kp = rcgen::KeyPair::generate_for(alg).unwrap();
            let spki = kp.subject_public_key_info();
            let key = SubjectPublicKey::from_spki_der(&spki).unwrap();
            assert_eq!(key.algorithm(), expected);
            assert_eq!(key.spki_der(), spki.as_slice());
            assert_eq!(key.key_bits(), kp.der_bytes());
            assert!(key.fingerprint().starts_with("SHA256:"));
        }
    }

    #[test]
    fn test_public_key_rejects_garbage() {
        assert!(matches!(
            SubjectPublicKey::from_spki_der(b"not a key"),
            Err(CAError::Parse(_))
        ));
    }

    #[test]
    fn test_fingerprint_format() {
        // SHA-256 of the empty string
        assert_eq!(
            sha256_fingerprint(b""),
            "SHA256:47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn test_descriptor_validate() {
        let kp = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
        let key = SubjectPublicKey::from_spki_der(&rcgen::PublicKeyData::subject_public_key_info(&kp))
            .unwrap();
        let now = OffsetDateTime::from_unix_timestamp(1704067200).unwrap();
        let mut d = CertificateDescriptor {
            version: 3,
            serial: SerialNumber::from_der_integer(&[1]),
            issuer: full_name(),
            subject: full_name(),
            issuer_der: None,
            subject_der: None,
            not_before: now,
            not_after: now,
            key_usage: KeyUsage::CA,
            extended_key_usage: ExtendedKeyUsage::default(),
            is_ca: true,
            subject_alt_names: SubjectAltNames::default(),
            crl_distribution_points: vec![],
            public_key: key,
        };
        assert!(d.validate().is_ok());

        d.key_usage = KeyUsage::END_ENTITY;
        assert!(matches!(d.validate(), Err(CAError::Certificate(_))));

        d.is_ca = false;
        d.not_after = now - time::Duration::seconds(1);
        assert!(matches!(d.validate(), Err(CAError::Certificate(_))));
    }
}
