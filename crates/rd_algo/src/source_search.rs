//! Surplus source search for one (receiving branch, product) pair.
//!
//! Contract:
//! - `needed ≤ 0` → sentinel with remaining 0.
//! - Balance at/above the ceiling, or a non-positive target → sentinel with
//!   `ceil(needed)`.
//! - Otherwise walk the donor order; each withdrawal takes
//!   `ceil(min(remaining, target, available))` and updates the ledger at once.
//! - The last record carries the final `ceil(remaining)`; earlier records
//!   keep the value they had when written.
//!
//! The list is never empty.

use rd_core::ids::{BranchId, ProductIndex};
use rd_core::rounding::{ceil_non_negative, ceil_units, floor_units};
use rd_core::{BranchData, Round, WithdrawalLedger, WithdrawalRecord};

use crate::balance_floor::BalanceFloor;
use crate::donor_order::DonorOrder;
use crate::proportional::AllocationMap;
use crate::{row_of, AlgoError};

/// Outcome of one search: the pair's record list and the ledger deltas it applied.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceSearch {
    pub records: Vec<WithdrawalRecord>,
    pub withdrawals: Vec<(BranchId, u64)>,
}

impl SourceSearch {
    fn sentinel(remaining: u64) -> Self {
        SourceSearch { records: vec![WithdrawalRecord::sentinel(remaining)], withdrawals: Vec::new() }
    }

    pub fn received(&self) -> u64 {
        self.withdrawals.iter().map(|(_, u)| u).sum()
    }
}

pub fn find_sources(
    branch: &BranchId,
    product: ProductIndex,
    data: &BranchData,
    ledger: &mut WithdrawalLedger,
    allocations: &AllocationMap,
    floor: &BalanceFloor,
    order: &dyn DonorOrder,
) -> Result<SourceSearch, AlgoError> {
    let row = row_of(data, branch, product)?;
    let needed = row.needed_quantity;
    let balance = row.balance;

    if !(needed > 0.0) {
        return Ok(SourceSearch::sentinel(0));
    }
    if floor.should_skip(balance) {
        return Ok(SourceSearch::sentinel(ceil_units(needed)));
    }

    let allocation = allocations.get(&product).and_then(|m| m.get(branch)).map(|u| *u as f64);
    let mut target = floor.target_amount(needed, balance, allocation);
    if !(target > 0.0) {
        return Ok(SourceSearch::sentinel(ceil_units(needed)));
    }

    let mut remaining = needed;
    let mut out = SourceSearch { records: Vec::new(), withdrawals: Vec::new() };

    for donor in order.order(product, branch, data, ledger) {
        if remaining <= 0.0 || target <= 0.0 {
            break;
        }
        if &donor == branch {
            continue;
        }
        let original = row_of(data, &donor, product)?.surplus_quantity;
        let available = ledger.available(&donor, product, original);
        if available <= 0.0 {
            continue;
        }
        let amount = remaining.min(target).min(available).ceil();
        if amount <= 0.0 {
            continue;
        }

        ledger.record(&donor, product, amount);
        remaining = ceil_non_negative(remaining - amount);
        target = ceil_non_negative(target - amount);

        let units = ceil_units(amount);
        out.records.push(WithdrawalRecord {
            surplus_from_branch: units,
            available_branch: Some(donor.clone()),
            surplus_remaining: floor_units(available - amount),
            remaining_needed: ceil_units(remaining),
            round: Round::First,
        });
        out.withdrawals.push((donor, units));
    }

    match out.records.last_mut() {
        None => Ok(SourceSearch::sentinel(ceil_units(remaining))),
        Some(last) => {
            last.remaining_needed = ceil_units(remaining);
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::donor_order::SurplusDescending;
    use rd_core::ProductRow;
    use std::collections::BTreeMap;

    fn b(s: &str) -> BranchId {
        s.parse().unwrap()
    }

    fn row(balance: f64, needed: f64, surplus: f64) -> Vec<ProductRow> {
        vec![ProductRow {
            code: "P".into(),
            product_name: "Cough syrup 100ml".into(),
            unit: Some("bottle".into()),
            avg_sales: 2.0,
            balance,
            needed_quantity: needed,
            surplus_quantity: surplus,
        }]
    }

    fn search(data: &BranchData, ledger: &mut WithdrawalLedger) -> SourceSearch {
        find_sources(
            &b("A"),
            0,
            data,
            ledger,
            &AllocationMap::new(),
            &BalanceFloor::default(),
            &SurplusDescending,
        )
        .unwrap()
    }

    #[test]
    fn no_donors_yields_full_need_sentinel() {
        let data = BranchData::new(vec![(b("A"), row(10.0, 25.0, 0.0)), (b("B"), row(0.0, 0.0, 0.0))]).unwrap();
        let got = search(&data, &mut WithdrawalLedger::new());
        assert_eq!(got.records, vec![WithdrawalRecord::sentinel(25)]);
        assert!(got.withdrawals.is_empty());
    }

    #[test]
    fn at_ceiling_is_denied() {
        let data = BranchData::new(vec![(b("A"), row(35.0, 10.0, 0.0)), (b("B"), row(0.0, 0.0, 50.0))]).unwrap();
        let mut ledger = WithdrawalLedger::new();
        let got = search(&data, &mut ledger);
        assert_eq!(got.records, vec![WithdrawalRecord::sentinel(10)]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn headroom_caps_single_withdrawal() {
        let data = BranchData::new(vec![(b("A"), row(20.0, 15.0, 0.0)), (b("B"), row(0.0, 0.0, 50.0))]).unwrap();
        let mut ledger = WithdrawalLedger::new();
        let got = search(&data, &mut ledger);
        assert_eq!(
            got.records,
            vec![WithdrawalRecord {
                surplus_from_branch: 10,
                available_branch: Some(b("B")),
                surplus_remaining: 40,
                remaining_needed: 5,
                round: Round::First,
            }]
        );
        assert_eq!(ledger.withdrawn(&b("B"), 0), 10.0);
    }

    #[test]
    fn short_donor_leaves_remaining_on_last_record() {
        let data = BranchData::new(vec![(b("A"), row(5.0, 8.0, 0.0)), (b("B"), row(0.0, 0.0, 3.0))]).unwrap();
        let got = search(&data, &mut WithdrawalLedger::new());
        assert_eq!(got.records.len(), 1);
        assert_eq!(got.records[0].surplus_from_branch, 3);
        assert_eq!(got.records[0].surplus_remaining, 0);
        assert_eq!(got.records[0].remaining_needed, 5);
        assert_eq!(got.received(), 3);
    }

    #[test]
    fn walks_several_donors_with_decreasing_need() {
        let data = BranchData::new(vec![
            (b("A"), row(0.0, 12.0, 0.0)),
            (b("B"), row(0.0, 0.0, 4.0)),
            (b("C"), row(0.0, 0.0, 6.0)),
            (b("D"), row(0.0, 0.0, 9.0)),
        ])
        .unwrap();
        let got = search(&data, &mut WithdrawalLedger::new());
        let trail: Vec<(&str, u64, u64)> = got
            .records
            .iter()
            .map(|r| (r.donor_label(), r.surplus_from_branch, r.remaining_needed))
            .collect();
        assert_eq!(trail, vec![("D", 9, 3), ("C", 3, 0)]);
    }

    #[test]
    fn allocation_entry_caps_target() {
        let data = BranchData::new(vec![(b("A"), row(0.0, 20.0, 0.0)), (b("B"), row(0.0, 0.0, 8.0))]).unwrap();
        let mut alloc = AllocationMap::new();
        alloc.insert(0, BTreeMap::from([(b("A"), 3)]));
        let got = find_sources(
            &b("A"),
            0,
            &data,
            &mut WithdrawalLedger::new(),
            &alloc,
            &BalanceFloor::default(),
            &SurplusDescending,
        )
        .unwrap();
        assert_eq!(got.records[0].surplus_from_branch, 3);
        assert_eq!(got.records[0].remaining_needed, 17);
    }

    #[test]
    fn no_need_is_zero_sentinel() {
        let data = BranchData::new(vec![(b("A"), row(0.0, -2.0, 0.0)), (b("B"), row(0.0, 0.0, 8.0))]).unwrap();
        let got = search(&data, &mut WithdrawalLedger::new());
        assert_eq!(got.records, vec![WithdrawalRecord::sentinel(0)]);
    }

    #[test]
    fn unknown_branch_is_an_error() {
        let data = BranchData::new(vec![(b("B"), row(0.0, 0.0, 8.0))]).unwrap();
        let err = find_sources(
            &b("A"),
            0,
            &data,
            &mut WithdrawalLedger::new(),
            &AllocationMap::new(),
            &BalanceFloor::default(),
            &SurplusDescending,
        )
        .unwrap_err();
        assert_eq!(err, AlgoError::UnknownBranch(b("A")));
    }
}
