// crates/rd_algo/tests/properties.rs
//
// Run-level properties over random snapshots: both rounds, shared ledger.

use std::collections::BTreeMap;

use proptest::prelude::*;

use rd_algo::proportional::{distribute_by_scores, Candidate};
use rd_algo::{compute_allocations, find_sources, redistribute, BalanceFloor, BranchPriority, DonorOrder, SurplusDescending};
use rd_core::{BranchData, BranchId, ProductRow, ScoreWeights, TransferPlan, WithdrawalLedger};

const LIMIT: f64 = 30.0;

fn arb_row() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    // Half-unit steps so fractional balances and needs show up.
    (0u32..=10, 0u32..=80, 0u32..=60, 0u32..=60).prop_map(|(a, bal, need, sur)| {
        (a as f64, bal as f64 / 2.0, need as f64 / 2.0, sur as f64 / 2.0)
    })
}

fn arb_data() -> impl Strategy<Value = BranchData> {
    (2usize..=5, 1usize..=3)
        .prop_flat_map(|(nb, np)| prop::collection::vec(prop::collection::vec(arb_row(), np), nb))
        .prop_map(|tables| {
            let tables = tables
                .into_iter()
                .enumerate()
                .map(|(i, rows)| {
                    let rows = rows
                        .into_iter()
                        .enumerate()
                        .map(|(p, (avg_sales, balance, needed, surplus))| ProductRow {
                            code: format!("P{p}"),
                            product_name: format!("product {p}"),
                            unit: None,
                            avg_sales,
                            balance,
                            needed_quantity: needed,
                            surplus_quantity: surplus,
                        })
                        .collect();
                    (BranchId::new(format!("b{i}")).unwrap(), rows)
                })
                .collect();
            BranchData::new(tables).unwrap()
        })
}

fn run(data: &BranchData, order: &dyn DonorOrder) -> (TransferPlan, WithdrawalLedger) {
    let floor = BalanceFloor::new(LIMIT);
    let alloc = compute_allocations(data, &ScoreWeights::default(), 0.1).unwrap();
    let mut ledger = WithdrawalLedger::new();
    let mut plan = TransferPlan::new();
    for product in 0..data.product_count() {
        for branch in data.branches() {
            let found = find_sources(branch, product, data, &mut ledger, &alloc, &floor, order).unwrap();
            plan.insert(branch.clone(), product, found.records);
        }
    }
    redistribute(data, &mut plan, &mut ledger, &floor).unwrap();
    (plan, ledger)
}

fn given_by_donor(plan: &TransferPlan) -> BTreeMap<(BranchId, usize), u64> {
    let mut out = BTreeMap::new();
    for (_, product, records) in plan.iter() {
        for r in records {
            if let Some(d) = &r.available_branch {
                *out.entry((d.clone(), product)).or_insert(0) += r.surplus_from_branch;
            }
        }
    }
    out
}

proptest! {
    #[test]
    fn donors_never_give_more_than_they_hold(data in arb_data(), by_priority in any::<bool>()) {
        let order: Box<dyn DonorOrder> = if by_priority {
            Box::new(BranchPriority { priority: data.branches().iter().rev().cloned().collect() })
        } else {
            Box::new(SurplusDescending)
        };
        let (plan, ledger) = run(&data, order.as_ref());
        for ((donor, product), given) in given_by_donor(&plan) {
            let original = data.row(&donor, product).unwrap().surplus_quantity;
            prop_assert!(given as f64 <= original, "{donor} p{product}: gave {given} of {original}");
            prop_assert_eq!(ledger.withdrawn(&donor, product), given as f64);
        }
    }

    #[test]
    fn receivers_stay_under_ceiling(data in arb_data()) {
        let (plan, _) = run(&data, &SurplusDescending);
        for branch in data.branches() {
            for product in 0..data.product_count() {
                let row = data.row(branch, product).unwrap();
                let received = plan.transferred(branch, product) as f64;
                if row.balance >= LIMIT {
                    prop_assert_eq!(received, 0.0);
                } else {
                    prop_assert!(row.balance + received <= LIMIT + 1.0);
                }
            }
        }
    }

    #[test]
    fn lists_are_non_empty_and_need_only_falls(data in arb_data()) {
        let (plan, _) = run(&data, &SurplusDescending);
        prop_assert_eq!(plan.len(), data.branches().len() * data.product_count());
        for (_, _, records) in plan.iter() {
            prop_assert!(!records.is_empty());
            for w in records.windows(2) {
                prop_assert!(w[1].remaining_needed <= w[0].remaining_needed);
            }
            if records.len() == 1 && records[0].is_sentinel() {
                prop_assert_eq!(records[0].donor_label(), "");
            }
        }
    }

    #[test]
    fn every_scored_branch_is_rescued(
        scores in prop::collection::vec(1u32..=100, 1..8),
        extra in 0u64..20,
    ) {
        let candidates: Vec<Candidate> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| Candidate {
                branch: BranchId::new(format!("b{i}")).unwrap(),
                score: *s as f64 / 100.0,
                needed: 50.0,
                avg_sales: (i % 3) as f64,
                balance: 1.0,
            })
            .collect();
        let total_needed = 50.0 * candidates.len() as f64;
        let total_surplus = (candidates.len() as u64 + extra) as f64;
        prop_assume!(total_surplus < total_needed);

        let units = distribute_by_scores(&candidates, total_needed, total_surplus);
        prop_assert!(units.iter().all(|u| *u >= 1), "{:?}", units);
        prop_assert!(units.iter().sum::<u64>() <= total_surplus as u64);
    }
}
