/// Certificate descriptor construction
///
/// The builders turn subject material and a validity period into an unsigned
/// [`CertificateDescriptor`]. They read the clock through a [`TimeSource`] and
/// draw a fresh serial on every call, but touch neither the token nor the
/// ledger.
///
/// # Profiles
///
/// | | root | leaf |
/// |---|---|---|
/// | issuer | itself | CA certificate subject |
/// | basicConstraints | CA | CA only with `is_ca` |
/// | keyUsage | digitalSignature, keyCertSign, cRLSign | digitalSignature (+ keyCertSign, cRLSign with `is_ca`) |
/// | extKeyUsage | none | serverAuth / clientAuth only when asked |
/// | SANs | none | copied from the CSR |
/// | CRL distribution points | from configuration | none |

use crate::certificate::{
    CertificateDescriptor, DistinguishedName, ExtendedKeyUsage, KeyUsage, SignedCertificate,
    SubjectAltNames, SubjectPublicKey,
};
use crate::codec::CertificateRequest;
use crate::error::CAError;
use crate::serial::SerialNumber;
use crate::time::{checked_add, TimeSource};
use std::time::Duration;

/// X.509 v3.
pub const CERTIFICATE_VERSION: u32 = 3;

/// Usage flags requested for an end-entity or intermediate certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeafOptions {
    /// Issue an intermediate CA certificate.
    pub is_ca: bool,
    /// Add the serverAuth extended key usage.
    pub server_auth: bool,
    /// Add the clientAuth extended key usage.
    pub client_auth: bool,
}

/// Descriptor for a self-signed CA certificate.
pub fn build_root(
    subject: &DistinguishedName,
    public_key: SubjectPublicKey,
    validity: Duration,
    crl_urls: &[String],
    clock: &dyn TimeSource,
) -> Result<CertificateDescriptor, CAError> {
    let not_before = clock.now()?;
    let not_after = checked_add(not_before, validity)?;

    Ok(CertificateDescriptor {
        version: CERTIFICATE_VERSION,
        serial: SerialNumber::generate()?,
        issuer: subject.clone(),
        subject: subject.clone(),
        issuer_der: None,
        subject_der: None,
        not_before,
        not_after,
        key_usage: KeyUsage::CA,
        extended_key_usage: ExtendedKeyUsage::default(),
        is_ca: true,
        subject_alt_names: SubjectAltNames::default(),
        crl_distribution_points: crl_urls.to_vec(),
        public_key,
    })
}

/// Descriptor for a certificate issued to `csr` by `issuer`.
///
/// The CSR subject and SANs are copied as they are. No name policy is applied.
/// Both names keep their original DER: the subject as the CSR encoded it and
/// the issuer as the CA certificate carries it.
pub fn build_leaf(
    issuer: &SignedCertificate,
    csr: &CertificateRequest,
    validity: Duration,
    options: LeafOptions,
    clock: &dyn TimeSource,
) -> Result<CertificateDescriptor, CAError> {
    let not_before = clock.now()?;
    let not_after = checked_add(not_before, validity)?;

    let key_usage = if options.is_ca {
        KeyUsage::CA
    } else {
        KeyUsage::END_ENTITY
    };

    Ok(CertificateDescriptor {
        version: CERTIFICATE_VERSION,
        serial: SerialNumber::generate()?,
        issuer: issuer.subject().clone(),
        subject: csr.subject.clone(),
        issuer_der: issuer.subject_der().map(<[u8]>::to_vec),
        subject_der: Some(csr.subject_der.clone()),
        not_before,
        not_after,
        key_usage,
        extended_key_usage: ExtendedKeyUsage {
            server_auth: options.server_auth,
            client_auth: options.client_auth,
        },
        is_ca: options.is_ca,
        subject_alt_names: csr.subject_alt_names.clone(),
        crl_distribution_points: Vec::new(),
        public_key: csr.public_key.clone(),
    })
}
