//! Fuzz target for inference config parsing and validation.

#![no_main]

use bn_core::config::InferenceConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(config) = InferenceConfig::from_toml_str(text) {
            let _ = config.validate();
        }
    }
});
