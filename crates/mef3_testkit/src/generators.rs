//! Property-based test generators using proptest.
//!
//! Provides strategies for generating sample buffers and writer settings,
//! and the property tests that tie them to the segment writer.

use mef3_core::WriterConfig;
use proptest::prelude::*;

/// Strategy for generating a slowly varying signal (mostly one-byte
/// differences) of the given length range.
pub fn smooth_samples_strategy(
    len: std::ops::Range<usize>,
) -> impl Strategy<Value = Vec<i32>> {
    (any::<i16>(), prop::collection::vec(-100i32..=100, len)).prop_map(|(start, steps)| {
        let mut value = i32::from(start);
        steps
            .into_iter()
            .map(|step| {
                value = value.saturating_add(step);
                value
            })
            .collect()
    })
}

/// Strategy for generating arbitrary `i32` samples, extremes included.
pub fn wild_samples_strategy(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(
        prop_oneof![
            8 => any::<i32>(),
            1 => Just(i32::MIN),
            1 => Just(i32::MAX),
        ],
        len,
    )
}

/// Strategy for generating non-empty sample buffers of mixed character.
pub fn samples_strategy() -> impl Strategy<Value = Vec<i32>> {
    prop_oneof![
        3 => smooth_samples_strategy(1..2000),
        1 => wild_samples_strategy(1..300),
    ]
}

/// Strategy for generating block sizes, small ones favoured.
pub fn samples_per_block_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![
        3 => 1u32..64,
        2 => 64u32..1024,
        1 => 1024u32..5000,
    ]
}

/// Strategy for generating sampling frequencies (Hz).
pub fn sampling_frequency_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(250.0),
        Just(1000.0),
        Just(32_556.0),
        0.5f64..50_000.0,
    ]
}

/// Strategy for generating units conversion factors of either sign.
pub fn conversion_factor_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(1.0),
        Just(-1.0),
        0.001f64..10.0,
        -10.0f64..-0.001,
    ]
}

/// Strategy for generating writer configurations.
pub fn writer_config_strategy() -> impl Strategy<Value = WriterConfig> {
    (samples_per_block_strategy(), prop::option::of(2u32..100)).prop_map(|(spb, lossy)| {
        let config = WriterConfig::new()
            .samples_per_block(spb)
            .sync_on_finish(false);
        match lossy {
            Some(scale) => config.lossy(scale),
            None => config,
        }
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
