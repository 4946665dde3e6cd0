//! Donor ordering policies for the source search.
//!
//! A policy ranks the branches that may give a product to `receiver`. It sees
//! the current ledger so drained donors are never offered. The receiver is
//! always excluded.

use rd_core::determinism::cmp_f64_desc;
use rd_core::ids::{BranchId, ProductIndex};
use rd_core::{BranchData, DonorOrderPolicy, Params, WithdrawalLedger};

pub trait DonorOrder {
    fn order(
        &self,
        product: ProductIndex,
        receiver: &BranchId,
        data: &BranchData,
        ledger: &WithdrawalLedger,
    ) -> Vec<BranchId>;
}

/// Default policy: most available surplus first, ties broken by branch order.
#[derive(Clone, Copy, Debug, Default)]
pub struct SurplusDescending;

impl DonorOrder for SurplusDescending {
    fn order(
        &self,
        product: ProductIndex,
        receiver: &BranchId,
        data: &BranchData,
        ledger: &WithdrawalLedger,
    ) -> Vec<BranchId> {
        let mut ranked: Vec<(f64, &BranchId)> = with_available(product, receiver, data, ledger).collect();
        // Stable: equal availability keeps snapshot order.
        ranked.sort_by(|a, b| cmp_f64_desc(a.0, b.0));
        ranked.into_iter().map(|(_, b)| b.clone()).collect()
    }
}

/// Fixed preference list. Listed branches come first in list order, the rest
/// follow in snapshot order.
#[derive(Clone, Debug, Default)]
pub struct BranchPriority {
    pub priority: Vec<BranchId>,
}

impl DonorOrder for BranchPriority {
    fn order(
        &self,
        product: ProductIndex,
        receiver: &BranchId,
        data: &BranchData,
        ledger: &WithdrawalLedger,
    ) -> Vec<BranchId> {
        let rank = |b: &BranchId| self.priority.iter().position(|p| p == b).unwrap_or(usize::MAX);
        let mut ranked: Vec<&BranchId> = with_available(product, receiver, data, ledger).map(|(_, b)| b).collect();
        ranked.sort_by_key(|b| rank(b));
        ranked.into_iter().cloned().collect()
    }
}

/// Policy object selected by params.
pub fn policy_for(params: &Params) -> Box<dyn DonorOrder> {
    match params.donor_order {
        DonorOrderPolicy::SurplusDesc => Box::new(SurplusDescending),
        DonorOrderPolicy::BranchPriority => Box::new(BranchPriority { priority: params.branch_priority.clone() }),
    }
}

// ----- helpers -----

/// Candidate donors in snapshot order with their current availability (> 0 only).
fn with_available<'a>(
    product: ProductIndex,
    receiver: &'a BranchId,
    data: &'a BranchData,
    ledger: &'a WithdrawalLedger,
) -> impl Iterator<Item = (f64, &'a BranchId)> + 'a {
    data.branches().iter().filter(move |b| *b != receiver).filter_map(move |b| {
        let original = data.row(b, product)?.surplus_quantity;
        let available = ledger.available(b, product, original);
        (available > 0.0).then_some((available, b))
    })
}
