//! rd_core: Core types, domains, ordering helpers, and the withdrawal ledger.
//!
//! This crate is **I/O-free**. It defines stable types/APIs used across the
//! engine (`rd_io`, `rd_algo`, `rd_pipeline`, `rd_report`, `rd_cli`).
//!
//! - Branch tokens: `BranchId`; product positions: `ProductIndex`
//! - Snapshot rows: `ProductRow`, `BranchData`
//! - Allocation output: `WithdrawalRecord`, `TransferPlan`
//! - Run-scoped state: `WithdrawalLedger`
//! - Numeric policy (ceil for needs, floor for availability)
//! - Params with defaults and domain validation
//!
//! Serialization derives are gated behind the `serde` feature.

#![forbid(unsafe_code)]

pub mod determinism;
pub mod entities;
pub mod ids;
pub mod ledger;
pub mod rounding;
pub mod variables;

pub mod errors {
    use core::fmt;

    /// Minimal error set for core-domain validation & parsing.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum CoreError {
        InvalidToken,
        EmptyBranchSet,
        DuplicateBranch,
        MisalignedTables,
        DomainOutOfRange(&'static str),
    }

    impl fmt::Display for CoreError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CoreError::InvalidToken => write!(f, "invalid token"),
                CoreError::EmptyBranchSet => write!(f, "empty branch set"),
                CoreError::DuplicateBranch => write!(f, "duplicate branch"),
                CoreError::MisalignedTables => write!(f, "branch tables are not index-aligned"),
                CoreError::DomainOutOfRange(k) => write!(f, "domain out of range: {k}"),
            }
        }
    }

    impl std::error::Error for CoreError {}
}

pub use entities::{BranchData, ProductRow, Round, TransferPlan, WithdrawalRecord};
pub use errors::CoreError;
pub use ids::{BranchId, ProductIndex};
pub use ledger::{calculate_available_surplus, WithdrawalLedger};
pub use variables::{DonorOrderPolicy, Params, ScoreWeights};
