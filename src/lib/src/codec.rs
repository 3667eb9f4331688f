//! Certificate codec
//!
//! DER and PEM in and out of the value types in [`crate::certificate`]:
//!
//! - CSRs are decoded with `x509-parser` and their self-signature is checked.
//! - Descriptors are encoded to a DER `TBSCertificate` with `yasna`. The token
//!   behind the [`SigningOracle`] signs those bytes and the signature is
//!   wrapped into the final certificate.
//! - Certificates coming back from the encoder or the token are parsed with
//!   `x509-parser` into a [`SignedCertificate`].
//!
//! Names taken from a CSR or a CA certificate keep their original DER, so an
//! issued certificate carries them byte for byte. Names built from
//! configuration are encoded one attribute per RDN, as PrintableString where
//! the value allows and UTF8String otherwise.

use crate::certificate::{
    CertificateDescriptor, DistinguishedName, ExtendedKeyUsage, KeyUsage, PublicKeyAlgorithm,
    SignedCertificate, SubjectAltNames, SubjectPublicKey,
};
use crate::error::CAError;
use crate::platform::{HumanPrompt, SigningOracle, Slot};
use crate::serial::SerialNumber;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::net::IpAddr;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::prelude::{FromDer, X509Certificate};
use x509_parser::x509::{SubjectPublicKeyInfo, X509Name};
use yasna::models::{GeneralizedTime, ObjectIdentifier, UTCTime};
use yasna::{DERWriter, DERWriterSeq, Tag};

pub const PEM_CERTIFICATE: &str = "CERTIFICATE";
pub const PEM_CERTIFICATE_REQUEST: &str = "CERTIFICATE REQUEST";
pub const PEM_PUBLIC_KEY: &str = "PUBLIC KEY";

const OID_COUNTRY: &[u64] = &[2, 5, 4, 6];
const OID_PROVINCE: &[u64] = &[2, 5, 4, 8];
const OID_LOCALITY: &[u64] = &[2, 5, 4, 7];
const OID_ORGANIZATION: &[u64] = &[2, 5, 4, 10];
const OID_ORGANIZATIONAL_UNIT: &[u64] = &[2, 5, 4, 11];
const OID_COMMON_NAME: &[u64] = &[2, 5, 4, 3];

const OID_SUBJECT_KEY_ID: &[u64] = &[2, 5, 29, 14];
const OID_KEY_USAGE: &[u64] = &[2, 5, 29, 15];
const OID_SUBJECT_ALT_NAME: &[u64] = &[2, 5, 29, 17];
const OID_BASIC_CONSTRAINTS: &[u64] = &[2, 5, 29, 19];
const OID_CRL_DISTRIBUTION_POINTS: &[u64] = &[2, 5, 29, 31];
const OID_AUTHORITY_KEY_ID: &[u64] = &[2, 5, 29, 35];
const OID_EXT_KEY_USAGE: &[u64] = &[2, 5, 29, 37];

const OID_KP_SERVER_AUTH: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 3, 1];
const OID_KP_CLIENT_AUTH: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 3, 2];

/// DER of a `Name` with no RDNs.
const EMPTY_NAME: &[u8] = &[0x30, 0x00];

/// Length of subject and authority key identifiers.
const KEY_ID_LEN: usize = 20;

/// The parts of a CSR that end up in the issued certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub subject: DistinguishedName,
    /// DER of the subject `Name` as it appears in the request.
    pub subject_der: Vec<u8>,
    pub subject_alt_names: SubjectAltNames,
    pub public_key: SubjectPublicKey,
}

/// Decode a PEM `CERTIFICATE REQUEST`.
///
/// Only the first PEM block is read. The request must carry a valid
/// self-signature.
pub fn decode_csr(bytes: &[u8]) -> Result<CertificateRequest, CAError> {
    let block = pem::parse(bytes)
        .map_err(|e| CAError::Parse(format!("could not decode PEM block: {}", e)))?;
    if block.tag() != PEM_CERTIFICATE_REQUEST {
        return Err(CAError::Parse(format!(
            "expected {}, got {:?}",
            PEM_CERTIFICATE_REQUEST,
            block.tag()
        )));
    }

    let (_, csr) = X509CertificationRequest::from_der(block.contents())
        .map_err(|e| CAError::Parse(format!("malformed certificate request: {}", e)))?;
    csr.verify_signature()
        .map_err(|e| CAError::Parse(format!("certificate request signature is invalid: {:?}", e)))?;

    let info = &csr.certification_request_info;
    let subject = name_from_x509(&info.subject)?;
    let public_key = SubjectPublicKey::from_parsed(&info.subject_pki)?;

    let mut subject_alt_names = SubjectAltNames::default();
    if let Some(extensions) = csr.requested_extensions() {
        for ext in extensions {
            if let ParsedExtension::SubjectAlternativeName(san) = ext {
                append_general_names(&mut subject_alt_names, &san.general_names)?;
            }
        }
    }

    Ok(CertificateRequest {
        subject,
        subject_der: info.subject.as_raw().to_vec(),
        subject_alt_names,
        public_key,
    })
}

/// Parse a DER certificate into a [`SignedCertificate`].
pub fn parse_certificate(der: &[u8]) -> Result<SignedCertificate, CAError> {
    let (rest, cert) = X509Certificate::from_der(der)
        .map_err(|e| CAError::Parse(format!("malformed certificate: {}", e)))?;
    if !rest.is_empty() {
        return Err(CAError::Parse(
            "trailing data after certificate".to_string(),
        ));
    }

    let key_usage = cert
        .key_usage()?
        .map(|ext| KeyUsage {
            digital_signature: ext.value.digital_signature(),
            key_cert_sign: ext.value.key_cert_sign(),
            crl_sign: ext.value.crl_sign(),
        })
        .unwrap_or_default();
    let extended_key_usage = cert
        .extended_key_usage()?
        .map(|ext| ExtendedKeyUsage {
            server_auth: ext.value.server_auth,
            client_auth: ext.value.client_auth,
        })
        .unwrap_or_default();
    let is_ca = cert.basic_constraints()?.map(|ext| ext.value.ca).unwrap_or(false);

    let mut subject_alt_names = SubjectAltNames::default();
    if let Some(san) = cert.subject_alternative_name()? {
        append_general_names(&mut subject_alt_names, &san.value.general_names)?;
    }

    let mut crl_distribution_points = Vec::new();
    let mut subject_key_id = None;
    let mut authority_key_id = None;
    for ext in cert.extensions() {
        match ext.parsed_extension() {
            ParsedExtension::CRLDistributionPoints(crl) => {
                for point in crl.points.iter() {
                    if let Some(DistributionPointName::FullName(names)) = &point.distribution_point {
                        crl_distribution_points.extend(names.iter().filter_map(|name| match name {
                            GeneralName::URI(uri) => Some(uri.to_string()),
                            _ => None,
                        }));
                    }
                }
            }
            ParsedExtension::SubjectKeyIdentifier(ski) => subject_key_id = Some(ski.0.to_vec()),
            ParsedExtension::AuthorityKeyIdentifier(aki) => {
                authority_key_id = aki.key_identifier.as_ref().map(|k| k.0.to_vec())
            }
            _ => {}
        }
    }

    let descriptor = CertificateDescriptor {
        version: cert.version().0 + 1,
        serial: SerialNumber::from_der_integer(cert.raw_serial()),
        issuer: name_from_x509(cert.issuer())?,
        subject: name_from_x509(cert.subject())?,
        issuer_der: Some(cert.issuer().as_raw().to_vec()),
        subject_der: Some(cert.subject().as_raw().to_vec()),
        not_before: cert.validity().not_before.to_datetime(),
        not_after: cert.validity().not_after.to_datetime(),
        key_usage,
        extended_key_usage,
        is_ca,
        subject_alt_names,
        crl_distribution_points,
        public_key: SubjectPublicKey::from_parsed(cert.public_key())?,
    };

    Ok(SignedCertificate {
        der: der.to_vec(),
        descriptor,
        signature_algorithm: signature_algorithm_name(
            &cert.signature_algorithm.algorithm.to_id_string(),
        ),
        signature: cert.signature_value.data.to_vec(),
        subject_key_id,
        authority_key_id,
    })
}

/// Decode a PEM `CERTIFICATE` and parse it.
pub fn decode_certificate_pem(bytes: &[u8]) -> Result<SignedCertificate, CAError> {
    let block = pem::parse(bytes)
        .map_err(|e| CAError::Parse(format!("could not decode PEM block: {}", e)))?;
    if block.tag() != PEM_CERTIFICATE {
        return Err(CAError::Parse(format!(
            "expected {}, got {:?}",
            PEM_CERTIFICATE,
            block.tag()
        )));
    }
    parse_certificate(block.contents())
}

pub fn encode_certificate_pem(certificate: &SignedCertificate) -> String {
    encode_pem(PEM_CERTIFICATE, certificate.der())
}

pub fn encode_public_key_pem(public_key: &SubjectPublicKey) -> String {
    encode_pem(PEM_PUBLIC_KEY, public_key.spki_der())
}

fn encode_pem(tag: &str, der: &[u8]) -> String {
    let config = pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF);
    pem::encode_config(&pem::Pem::new(tag, der.to_vec()), config)
}

/// DER `Name` for `name`, one RDN per attribute value in C, ST, L, O, OU, CN order.
pub fn encode_name(name: &DistinguishedName) -> Vec<u8> {
    let groups: [(&[u64], &Vec<String>); 5] = [
        (OID_COUNTRY, &name.country),
        (OID_PROVINCE, &name.province),
        (OID_LOCALITY, &name.locality),
        (OID_ORGANIZATION, &name.organization),
        (OID_ORGANIZATIONAL_UNIT, &name.organizational_unit),
    ];
    let mut attributes: Vec<(&[u64], &str)> = Vec::new();
    for (oid, values) in groups {
        attributes.extend(values.iter().map(|v| (oid, v.as_str())));
    }
    if !name.common_name.is_empty() {
        attributes.push((OID_COMMON_NAME, name.common_name.as_str()));
    }

    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for (oid, value) in attributes {
                writer.next().write_set(|writer| {
                    writer.next().write_sequence(|writer| {
                        writer.next().write_oid(&ObjectIdentifier::from_slice(oid));
                        if is_printable(value) {
                            writer.next().write_printable_string(value);
                        } else {
                            writer.next().write_utf8_string(value);
                        }
                    });
                });
            }
        });
    })
}

/// Characters the encoder accepts in a PrintableString.
fn is_printable(value: &str) -> bool {
    value.bytes().all(|b| {
        b.is_ascii_alphanumeric()
            || matches!(
                b,
                b' ' | b'\'' | b'(' | b')' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'='
            )
    })
}

/// Encode the `TBSCertificate` for `descriptor`.
///
/// `algorithm` is the family of the signing key and `authority_key_id` the
/// issuer's subject key identifier, if it has one.
pub fn encode_tbs_certificate(
    descriptor: &CertificateDescriptor,
    algorithm: PublicKeyAlgorithm,
    authority_key_id: Option<&[u8]>,
) -> Result<Vec<u8>, CAError> {
    descriptor.validate()?;
    let not_before = asn1_time(descriptor.not_before)?;
    let not_after = asn1_time(descriptor.not_after)?;
    for value in descriptor
        .subject_alt_names
        .dns
        .iter()
        .chain(&descriptor.subject_alt_names.uri)
        .chain(&descriptor.subject_alt_names.email)
        .chain(&descriptor.crl_distribution_points)
    {
        ia5(value)?;
    }

    let issuer = descriptor
        .issuer_der
        .clone()
        .unwrap_or_else(|| encode_name(&descriptor.issuer));
    let subject = descriptor
        .subject_der
        .clone()
        .unwrap_or_else(|| encode_name(&descriptor.subject));
    let subject_is_empty = subject == EMPTY_NAME;

    Ok(yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_tagged(Tag::context(0), |writer| {
                writer.write_u8(2);
            });
            writer
                .next()
                .write_bigint_bytes(descriptor.serial.as_bytes(), true);
            write_signature_algorithm(writer.next(), algorithm);
            writer.next().write_der(&issuer);
            writer.next().write_sequence(|writer| {
                not_before.write(writer.next());
                not_after.write(writer.next());
            });
            writer.next().write_der(&subject);
            writer.next().write_der(descriptor.public_key.spki_der());
            writer.next().write_tagged(Tag::context(3), |writer| {
                writer.write_sequence(|writer| {
                    write_extensions(writer, descriptor, authority_key_id, subject_is_empty)
                });
            });
        });
    }))
}

fn write_extensions(
    writer: &mut DERWriterSeq,
    descriptor: &CertificateDescriptor,
    authority_key_id: Option<&[u8]>,
    subject_is_empty: bool,
) {
    let ku = descriptor.key_usage;
    // digitalSignature(0), keyCertSign(5), cRLSign(6)
    let mut ku_bits = 0u8;
    if ku.digital_signature {
        ku_bits |= 0x80;
    }
    if ku.key_cert_sign {
        ku_bits |= 0x04;
    }
    if ku.crl_sign {
        ku_bits |= 0x02;
    }
    if ku_bits != 0 {
        let len = 8 - ku_bits.trailing_zeros() as usize;
        write_extension(writer.next(), OID_KEY_USAGE, true, |writer| {
            writer.write_bitvec_bytes(&[ku_bits], len)
        });
    }

    let eku = descriptor.extended_key_usage;
    if !eku.is_empty() {
        write_extension(writer.next(), OID_EXT_KEY_USAGE, false, |writer| {
            writer.write_sequence(|writer| {
                if eku.server_auth {
                    writer.next().write_oid(&ObjectIdentifier::from_slice(OID_KP_SERVER_AUTH));
                }
                if eku.client_auth {
                    writer.next().write_oid(&ObjectIdentifier::from_slice(OID_KP_CLIENT_AUTH));
                }
            })
        });
    }

    write_extension(writer.next(), OID_BASIC_CONSTRAINTS, true, |writer| {
        writer.write_sequence(|writer| {
            if descriptor.is_ca {
                writer.next().write_bool(true);
            }
        })
    });

    let ski = key_identifier(&descriptor.public_key);
    write_extension(writer.next(), OID_SUBJECT_KEY_ID, false, |writer| {
        writer.write_bytes(&ski)
    });

    if let Some(aki) = authority_key_id {
        write_extension(writer.next(), OID_AUTHORITY_KEY_ID, false, |writer| {
            writer.write_sequence(|writer| {
                writer
                    .next()
                    .write_tagged_implicit(Tag::context(0), |writer| writer.write_bytes(aki))
            })
        });
    }

    let sans = &descriptor.subject_alt_names;
    if !sans.is_empty() {
        // An empty subject makes the SAN extension the only identity, so it must be critical.
        write_extension(writer.next(), OID_SUBJECT_ALT_NAME, subject_is_empty, |writer| {
            writer.write_sequence(|writer| {
                for dns in &sans.dns {
                    writer
                        .next()
                        .write_tagged_implicit(Tag::context(2), |writer| writer.write_ia5_string(dns));
                }
                for ip in &sans.ip {
                    writer.next().write_tagged_implicit(Tag::context(7), |writer| match ip {
                        IpAddr::V4(v4) => writer.write_bytes(&v4.octets()),
                        IpAddr::V6(v6) => writer.write_bytes(&v6.octets()),
                    });
                }
                for uri in &sans.uri {
                    writer
                        .next()
                        .write_tagged_implicit(Tag::context(6), |writer| writer.write_ia5_string(uri));
                }
                for email in &sans.email {
                    writer
                        .next()
                        .write_tagged_implicit(Tag::context(1), |writer| writer.write_ia5_string(email));
                }
            })
        });
    }

    if !descriptor.crl_distribution_points.is_empty() {
        write_extension(writer.next(), OID_CRL_DISTRIBUTION_POINTS, false, |writer| {
            writer.write_sequence(|writer| {
                // DistributionPoint { distributionPoint [0] { fullName [0] GeneralNames } }
                writer.next().write_sequence(|writer| {
                    writer.next().write_tagged_implicit(Tag::context(0), |writer| {
                        writer.write_sequence(|writer| {
                            writer.next().write_tagged_implicit(Tag::context(0), |writer| {
                                writer.write_sequence(|writer| {
                                    for url in &descriptor.crl_distribution_points {
                                        writer
                                            .next()
                                            .write_tagged_implicit(Tag::context(6), |writer| {
                                                writer.write_ia5_string(url)
                                            });
                                    }
                                })
                            })
                        })
                    })
                })
            })
        });
    }
}

fn write_extension(
    writer: DERWriter,
    oid: &[u64],
    critical: bool,
    value: impl FnOnce(DERWriter),
) {
    writer.write_sequence(|writer| {
        writer.next().write_oid(&ObjectIdentifier::from_slice(oid));
        if critical {
            writer.next().write_bool(true);
        }
        writer.next().write_bytes(&yasna::construct_der(value));
    })
}

fn write_signature_algorithm(writer: DERWriter, algorithm: PublicKeyAlgorithm) {
    writer.write_sequence(|writer| {
        writer
            .next()
            .write_oid(&ObjectIdentifier::from_slice(algorithm.signature_algorithm_oid()));
        // RSA carries explicit NULL parameters; ECDSA and Ed25519 carry none.
        if algorithm == PublicKeyAlgorithm::Rsa {
            writer.next().write_null();
        }
    })
}

/// Truncated SHA-256 of the `subjectPublicKey` bits.
fn key_identifier(public_key: &SubjectPublicKey) -> Vec<u8> {
    Sha256::digest(public_key.key_bits())[..KEY_ID_LEN].to_vec()
}

/// UTCTime through 2049, GeneralizedTime from 2050 on.
enum Asn1Time {
    Utc(UTCTime),
    Generalized(GeneralizedTime),
}

impl Asn1Time {
    fn write(&self, writer: DERWriter) {
        match self {
            Asn1Time::Utc(t) => writer.write_utctime(t),
            Asn1Time::Generalized(t) => writer.write_generalized_time(t),
        }
    }
}

fn asn1_time(t: OffsetDateTime) -> Result<Asn1Time, CAError> {
    let t = t
        .to_offset(UtcOffset::UTC)
        .replace_nanosecond(0)
        .map_err(|e| CAError::TimeError(e.to_string()))?;
    let encoded = if (1950..2050).contains(&t.year()) {
        UTCTime::from_datetime_opt(t).map(Asn1Time::Utc)
    } else {
        GeneralizedTime::from_datetime_opt(t).map(Asn1Time::Generalized)
    };
    encoded.ok_or_else(|| CAError::TimeError(format!("{} cannot be encoded in a certificate", t)))
}

/// Encode `descriptor` and have the token in `slot` sign it.
///
/// With `issuer` unset the certificate is self-signed with the descriptor's
/// own key. The returned certificate has been parsed back and its signature
/// verified against the signing key.
pub fn sign_descriptor(
    descriptor: &CertificateDescriptor,
    issuer: Option<&SignedCertificate>,
    oracle: &dyn SigningOracle,
    slot: Slot,
    prompt: &dyn HumanPrompt,
) -> Result<SignedCertificate, CAError> {
    let signing_key = issuer.map_or(&descriptor.public_key, |ca| ca.public_key());
    let algorithm = signing_key.algorithm();
    let tbs = encode_tbs_certificate(
        descriptor,
        algorithm,
        issuer.and_then(|ca| ca.subject_key_id()),
    )?;

    log::debug!("requesting signature from {} slot {}", oracle.name(), slot);
    let signature = oracle.sign(slot, signing_key, &tbs, prompt)?;

    let der = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_der(&tbs);
            write_signature_algorithm(writer.next(), algorithm);
            writer.next().write_bitvec_bytes(&signature, signature.len() * 8);
        })
    });

    let signed = parse_certificate(&der)?;
    verify_signature(&signed, signing_key, slot)?;
    Ok(signed)
}

fn verify_signature(
    certificate: &SignedCertificate,
    signing_key: &SubjectPublicKey,
    slot: Slot,
) -> Result<(), CAError> {
    let (_, cert) = X509Certificate::from_der(certificate.der())
        .map_err(|e| CAError::Parse(format!("malformed certificate: {}", e)))?;
    let (_, spki) = SubjectPublicKeyInfo::from_der(signing_key.spki_der())
        .map_err(|e| CAError::Parse(format!("malformed public key: {}", e)))?;
    cert.verify_signature(Some(&spki)).map_err(|e| {
        CAError::oracle(
            slot,
            "sign",
            format!("signature does not verify against the CA public key: {:?}", e),
        )
    })
}

/// Human-readable summary of a certificate, as printed by `inspect`.
pub fn describe(certificate: &SignedCertificate) -> String {
    let d = certificate.descriptor();
    let mut out = String::new();
    let _ = writeln!(out, "Version:        {}", d.version);
    let _ = writeln!(out, "Serial:         {}", d.serial);
    let _ = writeln!(out, "Issuer:         {}", d.issuer);
    let _ = writeln!(out, "Subject:        {}", d.subject);
    let _ = writeln!(
        out,
        "Validity:       {} to {}",
        format_time(d.not_before),
        format_time(d.not_after)
    );
    let _ = writeln!(out, "Algorithm:      {}", certificate.signature_algorithm());
    let _ = writeln!(
        out,
        "Public Key:     {} {}",
        d.public_key.algorithm(),
        d.public_key.fingerprint()
    );
    let _ = writeln!(out, "Fingerprint:    {}", certificate.fingerprint());
    if let Some(aki) = certificate.authority_key_id() {
        let _ = writeln!(out, "AuthorityKeyID: {}", hex::encode(aki));
    }
    if let Some(ski) = certificate.subject_key_id() {
        let _ = writeln!(out, "SubjectKeyID:   {}", hex::encode(ski));
    }
    if !d.crl_distribution_points.is_empty() {
        out.push_str("CRL URLs:\n");
        for url in &d.crl_distribution_points {
            let _ = writeln!(out, "  {}", url);
        }
    }
    out
}

fn format_time(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.to_string())
}

fn signature_algorithm_name(oid: &str) -> String {
    match oid {
        "1.2.840.10045.4.3.2" => "ECDSA-SHA256".to_string(),
        "1.2.840.10045.4.3.3" => "ECDSA-SHA384".to_string(),
        "1.3.101.112" => "Ed25519".to_string(),
        "1.2.840.113549.1.1.11" => "SHA256-RSA".to_string(),
        other => other.to_string(),
    }
}

fn ia5(value: &str) -> Result<&str, CAError> {
    if value.is_ascii() {
        Ok(value)
    } else {
        Err(CAError::Certificate(format!("{:?} is not an IA5 string", value)))
    }
}

fn name_from_x509(name: &X509Name<'_>) -> Result<DistinguishedName, CAError> {
    fn collect<'a, 'b: 'a>(
        attrs: impl Iterator<Item = &'a x509_parser::x509::AttributeTypeAndValue<'b>>,
    ) -> Result<Vec<String>, CAError> {
        attrs
            .map(|attr| {
                attr.as_str()
                    .map(str::to_string)
                    .map_err(|e| CAError::Parse(format!("undecodable name attribute: {:?}", e)))
            })
            .collect()
    }

    Ok(DistinguishedName {
        country: collect(name.iter_country())?,
        province: collect(name.iter_state_or_province())?,
        locality: collect(name.iter_locality())?,
        organization: collect(name.iter_organization())?,
        organizational_unit: collect(name.iter_organizational_unit())?,
        common_name: collect(name.iter_common_name())?
            .into_iter()
            .next()
            .unwrap_or_default(),
    })
}

fn append_general_names(
    out: &mut SubjectAltNames,
    names: &[GeneralName<'_>],
) -> Result<(), CAError> {
    for name in names {
        match name {
            GeneralName::DNSName(dns) => out.dns.push(dns.to_string()),
            GeneralName::URI(uri) => out.uri.push(uri.to_string()),
            GeneralName::RFC822Name(email) => out.email.push(email.to_string()),
            GeneralName::IPAddress(bytes) => {
                let bytes: &[u8] = bytes;
                let ip = if let Ok(v4) = <[u8; 4]>::try_from(bytes) {
                    IpAddr::from(v4)
                } else if let Ok(v6) = <[u8; 16]>::try_from(bytes) {
                    IpAddr::from(v6)
                } else {
                    return Err(CAError::Parse(format!(
                        "IP address SAN of {} bytes",
                        bytes.len()
                    )));
                };
                out.ip.push(ip);
            }
            other => log::debug!("ignoring unsupported SAN {:?}", other),
        }
    }
    Ok(())
}
