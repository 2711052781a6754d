//! Fuzz target for CPT construction, lookup and normalization.
//!
//! Arbitrary shapes, keys and weights must never panic, and a successful
//! normalization must leave every row summing to one.

#![no_main]

use arbitrary::Arbitrary;
use bn_core::table::ConditionalProbabilityTable;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    states: u8,
    parents: Vec<u8>,
    writes: Vec<(Vec<u8>, Vec<f64>)>,
}

fuzz_target!(|input: Input| {
    let states = usize::from(input.states % 6);
    let parents: Vec<usize> = input.parents.iter().take(4).map(|p| usize::from(p % 5)).collect();
    let Ok(mut cpt) = ConditionalProbabilityTable::new(states, &parents) else {
        return;
    };
    for (key, weights) in input.writes.iter().take(16) {
        let key: Vec<usize> = key.iter().map(|&k| usize::from(k)).collect();
        let _ = cpt.set_probabilities(&key, weights);
        let _ = cpt.probabilities(&key);
    }
    if cpt.normalize().is_ok() {
        for row in cpt.rows() {
            let sum: f64 = row.probabilities.iter().sum();
            assert!(row.probabilities.is_empty() || (sum - 1.0).abs() < 1e-6);
        }
    }
});
