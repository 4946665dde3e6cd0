//! crates/rd_pipeline/src/redistribute.rs
//! Round 2 over the same ledger; skipped when `second_round` is off.

use tracing::{debug, info};

use rd_algo::{redistribute, AlgoError, BalanceFloor, SecondRoundStats};
use rd_core::{BranchData, Params, TransferPlan, WithdrawalLedger};

pub fn run_second_round(
    data: &BranchData,
    params: &Params,
    plan: &mut TransferPlan,
    ledger: &mut WithdrawalLedger,
) -> Result<SecondRoundStats, AlgoError> {
    if !params.second_round {
        info!("second round disabled");
        return Ok(SecondRoundStats::default());
    }
    let stats = redistribute(data, plan, ledger, &BalanceFloor::new(params.balance_limit))?;
    if stats.records > 0 {
        debug!(records = stats.records, units = stats.units, "stranded surplus rescued");
    }
    Ok(stats)
}
