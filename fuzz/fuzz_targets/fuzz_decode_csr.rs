//! Fuzz target for certificate request decoding
//!
//! `decode_csr` is the only path where bytes from outside the CA reach the
//! parser before a signature is made. It handles:
//! - PEM framing and block tags
//! - PKCS#10 DER structure
//! - Subject names and requested extensions
//! - Public key algorithms and self-signature verification
//!
//! Decoding must return an error, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yubca::codec;

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = codec::decode_csr(data) {
        let _ = request.subject.to_string();
        let _ = request.public_key.fingerprint();
        let _ = request.subject_alt_names.is_empty();
    }
});
