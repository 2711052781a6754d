//! Fuzz target for JSON network files.
//!
//! Parsing and building must only ever return errors. Small networks that
//! build are also propagated, which exercises the message recursion on
//! arbitrary (possibly loopy) structure.

#![no_main]

use bn_core::inference::{BeliefPropConfig, BeliefPropagator};
use bn_core::network::{FileFormat, NetworkFile};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(file) = NetworkFile::parse(text, FileFormat::Json) else {
        return;
    };
    // Keep the joint small enough to stay fast.
    if file.nodes.len() > 6 || file.nodes.iter().any(|n| n.states > 4) {
        return;
    }
    if let Ok(net) = file.build() {
        let _ = BeliefPropagator::new(BeliefPropConfig::single_sweep()).propagate(&net);
    }
});
