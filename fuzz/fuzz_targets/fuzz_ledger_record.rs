//! Fuzz target for ledger record parsing
//!
//! Ledger files may be edited by hand or truncated by a crash. Parsing a
//! line must fail cleanly, and any accepted record must serialize again.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yubca::LedgerRecord;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(record) = LedgerRecord::parse_line(line) {
        let encoded = record.to_line().expect("accepted record must encode");
        let reparsed = LedgerRecord::parse_line(encoded.trim_end()).expect("encoded record must parse");
        assert_eq!(record, reparsed);
    }
});
