// crates/rd_algo/src/lib.rs
#![forbid(unsafe_code)]

use core::fmt;

use rd_core::ids::{BranchId, ProductIndex};

pub mod balance_floor;
pub mod donor_order;
pub mod proportional;
pub mod second_round;
pub mod source_search;

// Convenience re-exports (pipeline imports these from crate root)
pub use balance_floor::BalanceFloor;
pub use donor_order::{policy_for, BranchPriority, DonorOrder, SurplusDescending};
pub use proportional::{compute_allocations, AllocationMap};
pub use second_round::{redistribute, redistribute_product, SecondRoundStats};
pub use source_search::{find_sources, SourceSearch};

// ----------------------------- Errors -----------------------------

/// Failures inside per-product processing. These abort the run; the engine
/// never skips a product silently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AlgoError {
    /// A branch table has no row at this index.
    MissingRow { branch: BranchId, product: ProductIndex },
    /// A branch referenced by the plan or a policy is not part of the snapshot.
    UnknownBranch(BranchId),
}

impl fmt::Display for AlgoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgoError::MissingRow { branch, product } => {
                write!(f, "branch {branch} has no row at product index {product}")
            }
            AlgoError::UnknownBranch(b) => write!(f, "unknown branch: {b}"),
        }
    }
}

impl std::error::Error for AlgoError {}

// ----------------------------- helpers -----------------------------

pub(crate) fn row_of<'a>(
    data: &'a rd_core::BranchData,
    branch: &BranchId,
    product: ProductIndex,
) -> Result<&'a rd_core::ProductRow, AlgoError> {
    if !data.contains(branch) {
        return Err(AlgoError::UnknownBranch(branch.clone()));
    }
    data.row(branch, product).ok_or_else(|| AlgoError::MissingRow {
        branch: branch.clone(),
        product,
    })
}
