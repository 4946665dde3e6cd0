//! crates/rd_pipeline/src/allocate.rs
//! Round 1: proportional entitlements for scarce products, then a source
//! search for every (product, branch) pair, products outer and branches in
//! snapshot order inner.

use tracing::debug;

use rd_algo::{compute_allocations, find_sources, policy_for, AlgoError, AllocationMap, BalanceFloor};
use rd_core::{BranchData, Params, TransferPlan, WithdrawalLedger};

/// Totals of round 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FirstRoundStats {
    pub scarce_products: usize,
    pub withdrawals: u64,
    pub units: u64,
}

pub struct FirstRound {
    pub plan: TransferPlan,
    pub allocations: AllocationMap,
    pub stats: FirstRoundStats,
}

pub fn allocate_first_round(
    data: &BranchData,
    params: &Params,
    ledger: &mut WithdrawalLedger,
) -> Result<FirstRound, AlgoError> {
    let allocations = compute_allocations(data, &params.weights, params.inverse_balance_epsilon)?;
    let floor = BalanceFloor::new(params.balance_limit);
    let order = policy_for(params);

    let mut plan = TransferPlan::new();
    let mut stats = FirstRoundStats { scarce_products: allocations.len(), ..Default::default() };

    for product in 0..data.product_count() {
        if let Some(entry) = allocations.get(&product) {
            debug!(product, entitlements = ?entry, "scarce product");
        }
        for branch in data.branches() {
            let found = find_sources(branch, product, data, ledger, &allocations, &floor, order.as_ref())?;
            if !found.withdrawals.is_empty() {
                debug!(
                    product,
                    branch = %branch,
                    received = found.received(),
                    donors = found.withdrawals.len(),
                    "withdrawals recorded"
                );
            }
            stats.withdrawals += found.withdrawals.len() as u64;
            stats.units += found.received();
            plan.insert(branch.clone(), product, found.records);
        }
    }
    Ok(FirstRound { plan, allocations, stats })
}
