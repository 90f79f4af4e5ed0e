//! Deterministic random number generation.
//!
//! RULE: Nothing in the pipeline may call any platform RNG.
//! All randomness flows through EstimatorRng instances derived
//! from the single master seed of the scan.
//!
//! Each estimator gets its own RNG stream, seeded deterministically
//! from (master_seed XOR slot index). Estimators that carry their own
//! generator are seeded from the first draw of their stream. This means:
//!   - Adding a new estimator never changes existing estimators' streams.
//!   - Each estimator's stream is fully reproducible in isolation.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single estimator.
pub struct EstimatorRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl EstimatorRng {
    /// Create an estimator RNG from the master seed and a stable
    /// slot index. The index must never change once assigned.
    pub fn new(master_seed: u64, slot_index: u64) -> Self {
        let derived_seed = master_seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Draw a seed for an estimator that owns its own generator.
    pub fn next_seed(&mut self) -> u64 {
        self.inner.next_u64()
    }
}

/// All estimator RNGs for a single scan, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_estimator(&self, slot: EstimatorSlot) -> EstimatorRng {
        EstimatorRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable estimator slot assignments.
/// NEVER reorder or remove entries; only append.
/// Reordering changes every estimator's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum EstimatorSlot {
    Density = 0,
    Isolation = 1,
}

impl EstimatorSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Density => "density",
            Self::Isolation => "isolation",
        }
    }
}
