//! crates/rd_pipeline/src/build_plan.rs
//! Assemble the canonical plan document and its content ID.
//!
//! The ID is `PLAN:<sha256>` over the canonical JSON of every field except `id`,
//! so two runs over the same snapshot and params yield the same ID.

use serde::{Deserialize, Serialize};

use rd_core::ids::{BranchId, ProductIndex};
use rd_core::{BranchData, TransferPlan, WithdrawalLedger, WithdrawalRecord};
use rd_io::hasher;

use crate::materialize::Materialized;
use crate::PipelineError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub branch: BranchId,
    pub product: ProductIndex,
    pub code: String,
    pub records: Vec<WithdrawalRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub branch: BranchId,
    pub product: ProductIndex,
    pub withdrawn: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTotals {
    pub transferred: u64,
    pub shortage: u64,
    pub transfers: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanDoc {
    pub id: String,
    pub branches: Vec<BranchId>,
    pub product_count: usize,
    pub entries: Vec<PlanEntry>,
    pub ledger: Vec<LedgerEntry>,
    pub totals: PlanTotals,
}

#[derive(Serialize)]
struct PlanBody<'a> {
    branches: &'a [BranchId],
    product_count: usize,
    entries: &'a [PlanEntry],
    ledger: &'a [LedgerEntry],
    totals: &'a PlanTotals,
}

pub fn build_plan(
    data: &BranchData,
    plan: &TransferPlan,
    ledger: &WithdrawalLedger,
    materialized: &Materialized,
) -> Result<PlanDoc, PipelineError> {
    let mut entries = Vec::with_capacity(plan.len());
    for product in 0..data.product_count() {
        for branch in data.branches() {
            let records = plan.records(branch, product);
            if records.is_empty() {
                return Err(PipelineError::Build(format!("no record list for branch {branch}, product {product}")));
            }
            entries.push(PlanEntry {
                branch: branch.clone(),
                product,
                code: data.row(branch, product).map(|r| r.code.clone()).unwrap_or_default(),
                records: records.to_vec(),
            });
        }
    }

    let ledger: Vec<LedgerEntry> = ledger
        .iter()
        .map(|(b, p, w)| LedgerEntry { branch: b.clone(), product: p, withdrawn: w })
        .collect();

    let totals = PlanTotals {
        transferred: materialized.total_transferred,
        shortage: materialized.total_shortage,
        transfers: materialized.transfers.len() as u64,
    };

    let body = PlanBody {
        branches: data.branches(),
        product_count: data.product_count(),
        entries: &entries,
        ledger: &ledger,
        totals: &totals,
    };
    let id = hasher::plan_id_from_canonical(&body)?;

    Ok(PlanDoc {
        id,
        branches: data.branches().to_vec(),
        product_count: data.product_count(),
        entries,
        ledger,
        totals,
    })
}
