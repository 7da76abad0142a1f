//! Dynamic execution counters.

use serde::{Deserialize, Serialize};

/// Counters collected while a guest function runs.
///
/// Every counter only ever increases during a run. `taken + not_taken ==
/// branches` because branch-exchange and branch-with-link always count as
/// taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// Instructions fetched (one per fetch-decode-execute cycle).
    pub instructions: u64,
    /// Add, move, subtract, reverse-subtract, multiply, compare, and.
    pub data_processing: u64,
    /// Loads and stores.
    pub memory: u64,
    /// Branch, branch-with-link and branch-exchange.
    pub branches: u64,
    pub taken: u64,
    pub not_taken: u64,
}

impl Analysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn record_branch(&mut self, taken: bool) {
        if taken {
            self.taken += 1;
        } else {
            self.not_taken += 1;
        }
    }
}
