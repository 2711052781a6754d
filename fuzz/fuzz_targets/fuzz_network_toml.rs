//! Fuzz target for TOML network files.

#![no_main]

use bn_core::network::{FileFormat, NetworkFile};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(file) = NetworkFile::parse(text, FileFormat::Toml) {
            if file.nodes.len() <= 8 && file.nodes.iter().all(|n| n.states <= 8) {
                let _ = file.build();
            }
        }
    }
});
