//! Fuzz target for training data parsing.

#![no_main]

use bn_core::learning::Dataset;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = Dataset::parse(text);
    }
});
