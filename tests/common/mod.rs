//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use spectra_rs::{Channel, ChannelRegistry, WorkerPool};
use std::sync::Arc;
use std::time::Duration;

/// How long tests wait for a calculation
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Registry backed by a small pool
pub fn small_registry() -> ChannelRegistry {
    ChannelRegistry::new(WorkerPool::new(2).expect("pool"))
}

/// Wait until `channel` has completed `count` cycles
pub fn wait_for(channel: &Arc<Channel>, count: u64) {
    assert!(
        channel.wait_for_count(count, test_timeout()),
        "channel '{}' stuck at {} cycles, expected {}",
        channel.name(),
        channel.calc_count(),
        count
    );
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Assert two slices are element-wise approximately equal
pub fn assert_slice_eq(actual: &[f64], expected: &[f64], epsilon: f64) {
    assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
    for (a, b) in actual.iter().zip(expected) {
        assert_float_eq(*a, *b, epsilon);
    }
}
