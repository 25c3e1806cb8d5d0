//! Fuzz target for Transformer::process with arbitrary byte input.
//!
//! This target runs potentially malformed or adversarial containers through
//! the whole engine: header parsing, inflation, name sanitization, nested
//! archive descent and output writing. The goal is to find panics, hangs,
//! or unbounded allocations.
//!
//! Run with: cargo +nightly fuzz run transform

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use rezip::{ActionSet, ArchiveAction, BufferedAction, Transformer, ZipReader};

fuzz_target!(|data: &[u8]| {
    let registry = ActionSet::new()
        .with(ArchiveAction::new())
        .with(BufferedAction::identity("all").rename_prefix("a/", "b/"));
    let transformer = Transformer::new(&registry);

    // Sequential path. We don't care about the result, only that it returns.
    let mut output = Vec::new();
    if let Ok(record) = transformer.process("fuzz.zip", data, &mut output) {
        // Whatever the engine wrote must read back.
        let check = ZipReader::with_index(Cursor::new(&output));
        assert!(check.is_ok(), "unreadable output for {}", record);
    }

    // Indexed path.
    if let Ok(reader) = ZipReader::with_index(Cursor::new(data)) {
        let _ = transformer.process_archive("fuzz.zip", reader, Vec::new());
    }
});
