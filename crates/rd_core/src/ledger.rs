//! crates/rd_core/src/ledger.rs
//! Run-scoped record of cumulative withdrawals per (donor branch, product).
//!
//! Created empty at run start, mutated by both allocation rounds and dropped
//! after materialization. It is passed explicitly as `&mut`; there is no
//! global instance.

use std::collections::BTreeMap;

use crate::ids::{BranchId, ProductIndex};

/// Units a donor can still give: `floor(max(0, original - withdrawn))`.
///
/// Negative or non-finite originals yield 0.
#[inline]
pub fn calculate_available_surplus(original: f64, withdrawn: f64) -> f64 {
    let left = original - withdrawn;
    if !left.is_finite() || left <= 0.0 {
        return 0.0;
    }
    left.floor()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WithdrawalLedger {
    entries: BTreeMap<(BranchId, ProductIndex), f64>,
}

impl WithdrawalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative amount taken from `donor` for `product` (0 when untouched).
    pub fn withdrawn(&self, donor: &BranchId, product: ProductIndex) -> f64 {
        self.entries.get(&(donor.clone(), product)).copied().unwrap_or(0.0)
    }

    /// Add a withdrawal. Non-positive amounts are ignored.
    pub fn record(&mut self, donor: &BranchId, product: ProductIndex, amount: f64) {
        if !(amount > 0.0) {
            return;
        }
        *self.entries.entry((donor.clone(), product)).or_insert(0.0) += amount;
    }

    /// Whole units still available from `donor` given its original surplus.
    pub fn available(&self, donor: &BranchId, product: ProductIndex, original: f64) -> f64 {
        calculate_available_surplus(original, self.withdrawn(donor, product))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BranchId, ProductIndex, f64)> {
        self.entries.iter().map(|((b, p), v)| (b, *p, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
