//! Proportional allocation for scarce products.
//!
//! Contract:
//! - A product is scarce iff `total_needed > 0`, `total_surplus > 0` and
//!   `total_surplus < total_needed` (negative quantities clipped to 0).
//! - Score per branch: `w.activity*norm(avg_sales) + w.need*norm(needed)
//!   + w.inverse_balance*norm(1/(balance+eps))`, min-max normalized across all
//!   of the product's branches; a flat metric normalizes to 1.0 everywhere.
//! - Needing branches share `floor(total_surplus)` by `score / Σscore`; if
//!   Σscore ≤ 0 the share falls back to `needed / total_needed`.
//! - Rounding loss: unassigned units first go to zero-recipients, then branches
//!   holding more than one unit hand one unit each to the next zero-recipient,
//!   pass after pass, until either side runs out.
//!
//! Determinism:
//! - Zero-recipients are served by (positive share first, avg_sales ↓,
//!   balance ↑, branch order). Donors are visited in branch order.

use std::collections::{BTreeMap, VecDeque};

use rd_core::determinism::{cmp_f64_asc, cmp_f64_desc};
use rd_core::ids::{BranchId, ProductIndex};
use rd_core::rounding::floor_units;
use rd_core::{BranchData, ScoreWeights};

use crate::{row_of, AlgoError};

/// product index → {needing branch → entitled units}. Only scarce products appear.
pub type AllocationMap = BTreeMap<ProductIndex, BTreeMap<BranchId, u64>>;

/// One needing branch as seen by the share computation.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub branch: BranchId,
    pub score: f64,
    pub needed: f64,
    pub avg_sales: f64,
    pub balance: f64,
}

/// Entitlements for every scarce product of the snapshot.
pub fn compute_allocations(
    data: &BranchData,
    weights: &ScoreWeights,
    epsilon: f64,
) -> Result<AllocationMap, AlgoError> {
    let mut out = AllocationMap::new();
    for product in 0..data.product_count() {
        if let Some(entry) = allocate_product(data, product, weights, epsilon)? {
            out.insert(product, entry);
        }
    }
    Ok(out)
}

/// Entitlements for one product, or `None` when it is not scarce.
pub fn allocate_product(
    data: &BranchData,
    product: ProductIndex,
    weights: &ScoreWeights,
    epsilon: f64,
) -> Result<Option<BTreeMap<BranchId, u64>>, AlgoError> {
    let branches = data.branches();
    let mut activity = Vec::with_capacity(branches.len());
    let mut needed = Vec::with_capacity(branches.len());
    let mut inverse = Vec::with_capacity(branches.len());
    let mut balance = Vec::with_capacity(branches.len());
    let mut total_needed = 0.0_f64;
    let mut total_surplus = 0.0_f64;

    for b in branches {
        let row = row_of(data, b, product)?;
        let need = row.needed_quantity.max(0.0);
        total_needed += need;
        total_surplus += row.surplus_quantity.max(0.0);
        activity.push(row.avg_sales);
        needed.push(need);
        inverse.push(1.0 / (row.balance.max(0.0) + epsilon));
        balance.push(row.balance);
    }

    if !(total_needed > 0.0 && total_surplus > 0.0 && total_surplus < total_needed) {
        return Ok(None);
    }

    let na = min_max_normalize(&activity);
    let nn = min_max_normalize(&needed);
    let ni = min_max_normalize(&inverse);

    let candidates: Vec<Candidate> = branches
        .iter()
        .enumerate()
        .filter(|(i, _)| needed[*i] > 0.0)
        .map(|(i, b)| Candidate {
            branch: b.clone(),
            score: weights.activity * na[i] + weights.need * nn[i] + weights.inverse_balance * ni[i],
            needed: needed[i],
            avg_sales: activity[i],
            balance: balance[i],
        })
        .collect();

    let units = distribute_by_scores(&candidates, total_needed, total_surplus);
    Ok(Some(
        candidates
            .into_iter()
            .zip(units)
            .map(|(c, u)| (c.branch, u))
            .collect(),
    ))
}

/// Split `floor(total_surplus)` among `candidates` (in branch order) and
/// recover rounding loss. Returns units aligned with `candidates`.
pub fn distribute_by_scores(candidates: &[Candidate], total_needed: f64, total_surplus: f64) -> Vec<u64> {
    let score_sum: f64 = candidates.iter().map(|c| c.score).sum();
    let shares: Vec<f64> = if score_sum > 0.0 {
        candidates.iter().map(|c| c.score / score_sum).collect()
    } else {
        candidates.iter().map(|c| c.needed / total_needed).collect()
    };

    let mut units: Vec<u64> = shares.iter().map(|s| floor_units(s * total_surplus)).collect();
    redistribute_rounding_loss(candidates, &shares, &mut units, floor_units(total_surplus));
    units
}

// ----- helpers -----

/// Min-max normalization; a flat (or empty) vector maps to all 1.0.
fn min_max_normalize(xs: &[f64]) -> Vec<f64> {
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if !(span > 0.0) || !span.is_finite() {
        return vec![1.0; xs.len()];
    }
    xs.iter().map(|x| (x - min) / span).collect()
}

fn redistribute_rounding_loss(candidates: &[Candidate], shares: &[f64], units: &mut [u64], pool: u64) {
    let mut zero: Vec<usize> = (0..units.len()).filter(|&i| units[i] == 0).collect();
    if zero.is_empty() {
        return;
    }
    // Stable sort keeps branch order as the last key.
    zero.sort_by(|&a, &b| {
        (shares[b] > 0.0)
            .cmp(&(shares[a] > 0.0))
            .then_with(|| cmp_f64_desc(candidates[a].avg_sales, candidates[b].avg_sales))
            .then_with(|| cmp_f64_asc(candidates[a].balance, candidates[b].balance))
    });
    let mut pending: VecDeque<usize> = zero.into();

    let assigned: u64 = units.iter().sum();
    let mut leftover = pool.saturating_sub(assigned);
    while leftover > 0 {
        match pending.pop_front() {
            Some(i) => {
                units[i] += 1;
                leftover -= 1;
            }
            None => break,
        }
    }

    // One-for-one moves from branches holding more than one unit.
    while !pending.is_empty() {
        let mut moved = false;
        for donor in 0..units.len() {
            if units[donor] <= 1 {
                continue;
            }
            let Some(recipient) = pending.pop_front() else { break };
            units[donor] -= 1;
            units[recipient] += 1;
            moved = true;
        }
        if !moved {
            break;
        }
    }
}
