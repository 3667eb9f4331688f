//! Certificate serial numbers.
//!
//! Serials are 16 bytes from the operating system CSPRNG, read as an unsigned
//! big-endian integer. The leading byte is never zero, so the encoded integer
//! always keeps its full width and parses back to the same bytes.

use crate::error::CAError;
use std::fmt;

/// Width in bytes of generated serial numbers.
pub const SERIAL_LEN: usize = 16;

/// A certificate serial number, as unsigned big-endian bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber(Vec<u8>);

impl SerialNumber {
    /// Draw a fresh serial from the OS random source.
    ///
    /// Fails with `CAError::Entropy` if the source is unavailable; callers must
    /// abort issuance rather than fall back to anything weaker.
    pub fn generate() -> Result<Self, CAError> {
        Self::generate_with(|buf| getrandom::fill(buf).map_err(|e| CAError::Entropy(e.to_string())))
    }

    /// Draw a serial from `fill`. Draws whose leading byte is zero are discarded.
    pub(crate) fn generate_with<F>(mut fill: F) -> Result<Self, CAError>
    where
        F: FnMut(&mut [u8]) -> Result<(), CAError>,
    {
        let mut bytes = [0u8; SERIAL_LEN];
        loop {
            fill(&mut bytes)?;
            if bytes[0] != 0 {
                return Ok(SerialNumber(bytes.to_vec()));
            }
        }
    }

    /// Serial from the content octets of a DER INTEGER.
    ///
    /// The sign-padding zero bytes are dropped.
    pub fn from_der_integer(raw: &[u8]) -> Self {
        let start = raw
            .iter()
            .position(|b| *b != 0)
            .unwrap_or(raw.len().saturating_sub(1));
        SerialNumber(raw[start..].to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lower-case hex, as recorded in the ledger.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerialNumber({})", self.to_hex())
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_serials_are_unique_and_full_width() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let serial = SerialNumber::generate().unwrap();
            assert_eq!(serial.as_bytes().len(), SERIAL_LEN);
            assert_ne!(serial.as_bytes()[0], 0);
            assert_eq!(serial.to_hex().len(), SERIAL_LEN * 2);
            assert!(seen.insert(serial), "duplicate serial generated");
        }
    }

    #[test]
    fn test_leading_zero_draw_is_resampled() {
        let mut calls = 0;
        let serial = SerialNumber::generate_with(|buf| {
            calls += 1;
            let fill = if calls == 1 { 0x00 } else { 0xab };
            buf.iter_mut().for_each(|b| *b = fill);
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 2);
        assert_eq!(serial.as_bytes(), &[0xab; SERIAL_LEN]);
    }

    #[test]
    fn test_entropy_failure_aborts() {
        let result = SerialNumber::generate_with(|_| Err(CAError::Entropy("no device".into())));
        assert!(matches!(result, Err(CAError::Entropy(_))));
    }

    #[test]
    fn test_from_der_integer_strips_sign_padding() {
        let serial = SerialNumber::from_der_integer(&[0x00, 0x80, 0x01]);
        assert_eq!(serial.as_bytes(), &[0x80, 0x01]);
        assert_eq!(serial.to_hex(), "8001");

        let zero = SerialNumber::from_der_integer(&[0x00]);
        assert_eq!(zero.as_bytes(), &[0x00]);
    }
}
