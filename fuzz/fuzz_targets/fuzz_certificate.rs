//! Fuzz target for certificate parsing
//!
//! Covers DER certificates as read back from a token slot and PEM input,
//! then the `inspect` rendering of anything that parsed.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yubca::codec;

fuzz_target!(|data: &[u8]| {
    if let Ok(certificate) = codec::parse_certificate(data) {
        let _ = codec::describe(&certificate);
        let _ = codec::encode_certificate_pem(&certificate);
    }
    if let Ok(certificate) = codec::decode_certificate_pem(data) {
        let _ = certificate.fingerprint();
    }
});
