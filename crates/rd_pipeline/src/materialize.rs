//! crates/rd_pipeline/src/materialize.rs
//! Flatten the per-(branch, product) record lists into the tables that
//! reports and summaries read. Product order, then snapshot branch order.

use std::collections::BTreeMap;

use serde::Serialize;

use rd_core::ids::{BranchId, ProductIndex};
use rd_core::rounding::floor_units;
use rd_core::{BranchData, Round, TransferPlan, WithdrawalLedger};

/// Units withdrawn from one donor for one receiver, all products, both rounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PairTotal {
    pub from: BranchId,
    pub to: BranchId,
    pub units: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransferLine {
    pub from: BranchId,
    pub to: BranchId,
    pub product: ProductIndex,
    pub code: String,
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub quantity: u64,
    pub round: Round,
}

/// A need left (partly) unmet after both rounds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShortageLine {
    pub branch: BranchId,
    pub product: ProductIndex,
    pub code: String,
    pub product_name: String,
    pub needed: u64,
    pub received: u64,
    pub remaining: u64,
}

/// Surplus a donor still holds once the ledger is settled.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RemainingSurplusLine {
    pub branch: BranchId,
    pub product: ProductIndex,
    pub code: String,
    pub product_name: String,
    pub original: u64,
    pub withdrawn: u64,
    pub remaining: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Materialized {
    pub total_shortage: u64,
    pub total_transferred: u64,
    pub pair_totals: Vec<PairTotal>,
    pub transfers: Vec<TransferLine>,
    pub shortages: Vec<ShortageLine>,
    pub remaining_surplus: Vec<RemainingSurplusLine>,
}

pub fn materialize(data: &BranchData, plan: &TransferPlan, ledger: &WithdrawalLedger) -> Materialized {
    let mut out = Materialized::default();
    let mut pairs: BTreeMap<(usize, usize), u64> = BTreeMap::new();

    for product in 0..data.product_count() {
        for branch in data.branches() {
            let Some(row) = data.row(branch, product) else { continue };

            for rec in plan.records(branch, product) {
                let Some(donor) = rec.available_branch.as_ref() else { continue };
                if rec.surplus_from_branch == 0 {
                    continue;
                }
                if let (Some(f), Some(t)) = (data.position(donor), data.position(branch)) {
                    *pairs.entry((f, t)).or_insert(0) += rec.surplus_from_branch;
                }
                out.total_transferred += rec.surplus_from_branch;
                out.transfers.push(TransferLine {
                    from: donor.clone(),
                    to: branch.clone(),
                    product,
                    code: row.code.clone(),
                    product_name: row.product_name.clone(),
                    unit: row.unit.clone(),
                    quantity: rec.surplus_from_branch,
                    round: rec.round,
                });
            }

            let remaining = plan.final_remaining(branch, product);
            out.total_shortage += remaining;
            if remaining > 0 {
                out.shortages.push(ShortageLine {
                    branch: branch.clone(),
                    product,
                    code: row.code.clone(),
                    product_name: row.product_name.clone(),
                    needed: remaining + plan.transferred(branch, product),
                    received: plan.transferred(branch, product),
                    remaining,
                });
            }

            let original = floor_units(row.surplus_quantity);
            if original > 0 {
                let withdrawn = floor_units(ledger.withdrawn(branch, product));
                out.remaining_surplus.push(RemainingSurplusLine {
                    branch: branch.clone(),
                    product,
                    code: row.code.clone(),
                    product_name: row.product_name.clone(),
                    original,
                    withdrawn,
                    remaining: floor_units(ledger.available(branch, product, row.surplus_quantity)),
                });
            }
        }
    }

    let ids = data.branches();
    out.pair_totals = pairs
        .into_iter()
        .map(|((f, t), units)| PairTotal { from: ids[f].clone(), to: ids[t].clone(), units })
        .collect();
    out
}
