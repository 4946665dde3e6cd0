//! rd_pipeline: deterministic pipeline surface
//! (load → validate → allocate → redistribute → materialize → build plan → build run record).
//!
//! File and hashing work is delegated to `rd_io`, allocation math to `rd_algo`.
//! The ledger lives here for the length of one run and is handed to both rounds
//! by `&mut`.

#![forbid(unsafe_code)]

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use rd_algo::AlgoError;
use rd_core::{BranchData, TransferPlan, WithdrawalLedger};
use rd_io::loader::{self, LoadedContext};
use rd_io::IoError;

pub mod allocate;
pub mod build_plan;
pub mod build_run_record;
pub mod materialize;
pub mod redistribute;
pub mod validate;

pub use build_plan::PlanDoc;
pub use build_run_record::{RunCounts, RunRecordDoc};
pub use materialize::Materialized;
pub use validate::{Severity, ValidationIssue, ValidationReport};

/// Engine identity echoed in every run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMeta {
    pub vendor: String,
    pub name: String,
    pub version: String,
    pub build: String,
}

impl EngineMeta {
    pub fn current() -> Self {
        EngineMeta {
            vendor: "rd".to_string(),
            name: "rd_engine".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            build: option_env!("RD_BUILD").unwrap_or("dev").to_string(),
        }
    }
}

/// Inputs already loaded by rd_io. `timestamp_utc` pins the run clock
/// (RFC3339); `None` reads the system clock.
#[derive(Debug)]
pub struct PipelineCtx {
    pub loaded: LoadedContext,
    pub engine_meta: EngineMeta,
    pub timestamp_utc: Option<String>,
}

impl PipelineCtx {
    pub fn new(loaded: LoadedContext) -> Self {
        PipelineCtx { loaded, engine_meta: EngineMeta::current(), timestamp_utc: None }
    }
}

#[derive(Debug)]
pub struct PipelineOutputs {
    pub plan: PlanDoc,
    pub run_record: RunRecordDoc,
    pub materialized: Materialized,
    pub transfers: TransferPlan,
    pub data: BranchData,
    pub validation: ValidationReport,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error("validation failed with {} error(s)", .0.error_count())]
    Validate(ValidationReport),

    #[error("allocation failed: {0}")]
    Allocate(#[from] AlgoError),

    #[error("build error: {0}")]
    Build(String),
}

// ------------------------------------------------------------------------------------------------
// Public API
// ------------------------------------------------------------------------------------------------

/// Run every stage over a preloaded context.
pub fn run_with_ctx(ctx: PipelineCtx) -> Result<PipelineOutputs, PipelineError> {
    let PipelineCtx { loaded, engine_meta, timestamp_utc } = ctx;

    info!(branches = loaded.branches.len(), "validate");
    let validation = validate::validate(&loaded);
    if !validation.pass {
        return Err(PipelineError::Validate(validation));
    }
    for w in validation.warnings() {
        tracing::warn!(code = w.code, "{}", w.message);
    }

    let data = BranchData::new(loaded.branches.iter().map(|b| (b.id.clone(), b.rows.clone())).collect())
        .map_err(|e| PipelineError::Build(e.to_string()))?;
    let params = &loaded.params;
    let mut ledger = WithdrawalLedger::new();

    info!(products = data.product_count(), donor_order = %params.donor_order, "allocate: first round");
    let first = allocate::allocate_first_round(&data, params, &mut ledger)?;
    let mut transfers = first.plan;
    info!(
        scarce = first.stats.scarce_products,
        withdrawals = first.stats.withdrawals,
        units = first.stats.units,
        "first round done"
    );

    let second = redistribute::run_second_round(&data, params, &mut transfers, &mut ledger)?;
    info!(records = second.records, units = second.units, "second round done");

    let materialized = materialize::materialize(&data, &transfers, &ledger);
    info!(
        transferred = materialized.total_transferred,
        shortage = materialized.total_shortage,
        "materialized"
    );

    let plan = build_plan::build_plan(&data, &transfers, &ledger, &materialized)?;

    let counts = RunCounts {
        branches: data.branches().len(),
        products: data.product_count(),
        scarce_products: first.stats.scarce_products,
        first_round_withdrawals: first.stats.withdrawals,
        first_round_units: first.stats.units,
        second_round_records: second.records,
        second_round_units: second.units,
        shortage_units: materialized.total_shortage,
    };
    let run_record = build_run_record::build_run_record(
        build_run_record::RunRecordInputs {
            engine: &engine_meta,
            timestamp_utc: timestamp_utc.as_deref(),
            manifest_id: loaded.manifest_id.as_deref(),
            params,
            params_sha256: &loaded.params_sha256,
            input_digests: loaded.input_digests(),
            counts,
        },
        &plan,
    )?;
    info!(plan_id = %plan.id, run_id = %run_record.id, "run complete");

    Ok(PipelineOutputs { plan, run_record, materialized, transfers, data, validation })
}

/// Load a manifest with rd_io, then run the pipeline.
pub fn run_from_manifest<P: AsRef<Path>>(path: P) -> Result<PipelineOutputs, PipelineError> {
    let loaded = loader::load_all_from_manifest(path.as_ref())?;
    run_with_ctx(PipelineCtx::new(loaded))
}

/// Validation alone; nothing is allocated.
pub fn validate_only(loaded: &LoadedContext) -> ValidationReport {
    validate::validate(loaded)
}
