//! Fuzz target for entry name sanitization with arbitrary string input.
//!
//! Key security properties being tested:
//! - No `..` segment survives normalization
//! - No backslash survives normalization
//! - Sanitization is idempotent
//!
//! Run with: cargo +nightly fuzz run entry_name

#![no_main]

use libfuzzer_sys::fuzz_target;
use rezip::entry_name::sanitize;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(name) = sanitize(raw) else {
        return;
    };
    let normalized = name.as_str();

    assert!(
        !normalized.split('/').any(|segment| segment == ".."),
        "Path traversal found in normalized name: {:?}",
        normalized
    );
    assert!(
        !normalized.contains('\\'),
        "Backslash in normalized name: {:?}",
        normalized
    );
    assert!(
        normalized == "/" || !normalized.starts_with('/'),
        "Absolute name accepted: {:?}",
        normalized
    );

    let again = sanitize(normalized).expect("normalized names stay valid");
    assert_eq!(again.as_str(), normalized);
});
