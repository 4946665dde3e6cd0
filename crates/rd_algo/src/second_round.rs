//! Second-round redistribution.
//!
//! Recovers surplus the balance floor kept away in round 1. Per product:
//! - transferred = Σ units already in the branch's list; current = balance + transferred.
//! - Eligible iff `needed > 0`, `current < limit` and `needed - transferred > 0`;
//!   capacity = `min(needed - transferred, limit - current)`.
//! - Eligible branches are served by (current ↑, avg_sales ↓), then branch order.
//! - Donors are scanned in branch order; each withdrawal takes
//!   `floor(min(available, capacity))` whole units.
//!
//! Round 2 does not consult proportional entitlements. It shares round 1's ledger.

use rd_core::determinism::{cmp_f64_asc, cmp_f64_desc};
use rd_core::ids::{BranchId, ProductIndex};
use rd_core::rounding::{ceil_units, floor_units};
use rd_core::{BranchData, Round, TransferPlan, WithdrawalLedger, WithdrawalRecord};

use crate::balance_floor::BalanceFloor;
use crate::{row_of, AlgoError};

/// Totals of one second-round pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SecondRoundStats {
    pub records: u64,
    pub units: u64,
}

impl SecondRoundStats {
    fn absorb(&mut self, other: SecondRoundStats) {
        self.records += other.records;
        self.units += other.units;
    }
}

/// Run the second round over every product of the snapshot.
pub fn redistribute(
    data: &BranchData,
    plan: &mut TransferPlan,
    ledger: &mut WithdrawalLedger,
    floor: &BalanceFloor,
) -> Result<SecondRoundStats, AlgoError> {
    let mut stats = SecondRoundStats::default();
    for product in 0..data.product_count() {
        stats.absorb(redistribute_product(product, data, plan, ledger, floor)?);
    }
    Ok(stats)
}

struct Eligible<'a> {
    branch: &'a BranchId,
    needed: f64,
    transferred: f64,
    current: f64,
    avg_sales: f64,
    capacity: f64,
}

pub fn redistribute_product(
    product: ProductIndex,
    data: &BranchData,
    plan: &mut TransferPlan,
    ledger: &mut WithdrawalLedger,
    floor: &BalanceFloor,
) -> Result<SecondRoundStats, AlgoError> {
    let mut eligible: Vec<Eligible<'_>> = Vec::new();
    for branch in data.branches() {
        let row = row_of(data, branch, product)?;
        let transferred = plan.transferred(branch, product) as f64;
        let current = row.balance + transferred;
        let outstanding = row.needed_quantity - transferred;
        if row.needed_quantity > 0.0 && current < floor.limit && outstanding > 0.0 {
            eligible.push(Eligible {
                branch,
                needed: row.needed_quantity,
                transferred,
                current,
                avg_sales: row.avg_sales,
                capacity: outstanding.min(floor.limit - current),
            });
        }
    }
    // Stable: equal keys keep branch order.
    eligible.sort_by(|a, b| {
        cmp_f64_asc(a.current, b.current).then_with(|| cmp_f64_desc(a.avg_sales, b.avg_sales))
    });

    let mut stats = SecondRoundStats::default();
    for mut e in eligible {
        for donor in data.branches() {
            if e.capacity < 1.0 {
                break;
            }
            if donor == e.branch {
                continue;
            }
            let original = row_of(data, donor, product)?.surplus_quantity;
            let available = ledger.available(donor, product, original);
            let amount = available.min(e.capacity).floor();
            if amount <= 0.0 {
                continue;
            }

            ledger.record(donor, product, amount);
            e.capacity -= amount;
            e.transferred += amount;

            let units = floor_units(amount);
            plan.append(
                e.branch,
                product,
                WithdrawalRecord {
                    surplus_from_branch: units,
                    available_branch: Some(donor.clone()),
                    surplus_remaining: floor_units(available - amount),
                    remaining_needed: ceil_units(e.needed - e.transferred),
                    round: Round::Second,
                },
            );
            stats.records += 1;
            stats.units += units;
        }
    }
    Ok(stats)
}
