// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Deterministic `sample_rand` derivation from a trace id.
//!
//! Every service seeing a trace must derive the same value from the same trace
//! id, whatever language its SDK is written in. The algorithm is therefore
//! fixed bit-for-bit:
//!
//! 1. Seed material is the UTF-8 trace id followed by its SHA-512 digest, read
//!    as a single big-endian unsigned integer.
//! 2. That integer, split into 32-bit words least significant first, is the
//!    `init_by_array` key of an MT19937 generator.
//! 3. One 53-bit uniform draw is taken: `((a >> 5) * 2^26 + (b >> 6)) / 2^53`.
//!
//! ```text
//! derive("00000000000000000000000000000000") == 0.8766381713144122
//! ```

use rand_mt::Mt;
use sha2::{Digest, Sha512};

/// Derives a reproducible value in `[0, 1)` from a trace id.
#[must_use]
pub fn derive(trace_id: &str) -> f64 {
    DeterministicRandom::from_trace_id(trace_id).next_f64()
}

/// Stream of uniform values seeded from a trace id. The first value is
/// [`derive`]; later ones are only needed to re-draw out of range values.
pub struct DeterministicRandom(Mt);

impl DeterministicRandom {
    #[must_use]
    pub fn from_trace_id(trace_id: &str) -> Self {
        Self(Mt::new_with_key(seed_key(trace_id)))
    }

    /// Next value in `[0, 1)` with 53 bits of precision.
    pub fn next_f64(&mut self) -> f64 {
        let a = f64::from(self.0.next_u32() >> 5);
        let b = f64::from(self.0.next_u32() >> 6);
        (a * 67_108_864.0 + b) * (1.0 / 9_007_199_254_740_992.0)
    }
}

/// Builds the `init_by_array` key for a trace id.
fn seed_key(trace_id: &str) -> Vec<u32> {
    let mut material = trace_id.as_bytes().to_vec();
    material.extend_from_slice(&Sha512::digest(trace_id.as_bytes()));

    // Leading zero bytes do not contribute to the integer's width.
    let start = material
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(material.len());
    let significant = &material[start..];

    let mut key: Vec<u32> = significant
        .rchunks(4)
        .map(|chunk| chunk.iter().fold(0u32, |word, &b| (word << 8) | u32::from(b)))
        .collect();
    if key.is_empty() {
        key.push(0);
    }
    key
}
