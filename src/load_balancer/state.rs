//! Balancer-wide mutable state.
//!
//! One explicitly owned object holds the active algorithm and the two lifetime
//! counters. It is shared via `Arc` with the selection engine, both dispatchers
//! and the admin surface.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::load_balancer::algorithm::Algorithm;

#[derive(Debug, Default)]
pub struct BalancerState {
    algorithm: AtomicU8,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl BalancerState {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm: AtomicU8::new(algorithm as u8),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        Algorithm::from(self.algorithm.load(Ordering::Acquire))
    }

    /// Switch the active algorithm by name. Affects the next selection only.
    /// Returns the algorithm actually in effect.
    pub fn set_algorithm(&self, name: &str) -> Algorithm {
        let algorithm = Algorithm::from_name(name);
        self.set(algorithm);
        algorithm
    }

    pub fn set(&self, algorithm: Algorithm) {
        let previous = Algorithm::from(self.algorithm.swap(algorithm as u8, Ordering::AcqRel));
        if previous != algorithm {
            tracing::info!(from = %previous, to = %algorithm, "Load balancing algorithm changed");
        }
    }

    pub fn record_success(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
