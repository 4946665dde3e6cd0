// crates/rd_cli/src/main.rs
//
// Exit codes, error mapping, logging init, and the run path
// (load → overrides → pipeline → artifacts → self-verify → reports).

mod args;

mod exitcodes {
    pub const OK: u8 = 0;
    pub const VALIDATION: u8 = 2;
    pub const SELF_VERIFY: u8 = 3;
    pub const IO: u8 = 4;
    pub const ENGINE: u8 = 5;
}

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use args::{parse_and_validate as parse_cli, Args};
use rd_io::loader::{self, LoadedContext};
use rd_io::{canonical_json, hasher, params::check_params, IoError};
use rd_pipeline::{run_with_ctx, PipelineCtx, PipelineError, PipelineOutputs, ValidationReport};
use rd_report::{build_model, KeywordClassifier, ReportError};

const PLAN_JSON: &str = "plan.json";
const RUN_RECORD_JSON: &str = "run_record.json";

/// Central error type for CLI → exit-code mapping.
#[derive(Debug, Error)]
enum MainError {
    /// Input shape, manifest, params, digest expectations, validation report errors.
    #[error("{0}")]
    Validation(String),
    /// Written artifact does not hash to what the run recorded.
    #[error("self-verify: {0}")]
    SelfVerify(String),
    #[error("{0}")]
    Io(String),
    /// Allocation or snapshot/plan assembly failure inside the engine.
    #[error("engine: {0}")]
    Engine(String),
}

impl MainError {
    fn exit_code(&self) -> u8 {
        match self {
            MainError::Validation(_) => exitcodes::VALIDATION,
            MainError::SelfVerify(_) => exitcodes::SELF_VERIFY,
            MainError::Io(_) => exitcodes::IO,
            MainError::Engine(_) => exitcodes::ENGINE,
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_cli() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("rd: error: {e}");
            return ExitCode::from(exitcodes::VALIDATION);
        }
    };
    init_logging(args.quiet);

    let res = if args.validate_only { validate_only(&args) } else { run_once(&args) };
    match res {
        Ok(()) => ExitCode::from(exitcodes::OK),
        Err(e) => {
            error!(exit_code = e.exit_code(), "{e}");
            eprintln!("rd: error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// stderr subscriber; `RD_LOG` wins over the default directive.
fn init_logging(quiet: bool) {
    let default = if quiet { "rd=warn" } else { "rd=info" };
    let filter = EnvFilter::try_from_env("RD_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests in one process) is not an error worth surfacing.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

// ------------------------------------------------------------------------------------------------
// Paths
// ------------------------------------------------------------------------------------------------

fn validate_only(args: &Args) -> Result<(), MainError> {
    let loaded = load(args)?;
    let report = rd_pipeline::validate_only(&loaded);
    log_report(&report);
    if !report.pass {
        return Err(MainError::Validation(format!("validation failed with {} error(s)", report.error_count())));
    }
    if !args.quiet {
        eprintln!("validate-only: inputs OK ({} branches)", loaded.branches.len());
    }
    Ok(())
}

fn run_once(args: &Args) -> Result<(), MainError> {
    let loaded = load(args)?;
    let mut ctx = PipelineCtx::new(loaded);
    ctx.timestamp_utc = args.timestamp.clone();

    let outs = run_with_ctx(ctx).map_err(map_pipeline_err)?;

    write_artifacts(&args.out, &outs)?;
    verify_written_plan(&args.out.join(PLAN_JSON), &outs)?;
    maybe_render_reports(args, &outs)?;

    info!(
        out = %args.out.display(),
        transferred = outs.materialized.total_transferred,
        shortage = outs.materialized.total_shortage,
        "artifacts written"
    );
    if !args.quiet {
        eprintln!("run: artifacts written to {}", args.out.display());
    }
    Ok(())
}

/// Load inputs for either mode, then apply CLI param overrides.
fn load(args: &Args) -> Result<LoadedContext, MainError> {
    let mut loaded = match &args.manifest {
        Some(manifest) => loader::load_all_from_manifest(manifest).map_err(map_io_err)?,
        None => loader::load_from_paths(&args.branch, args.params.as_deref()).map_err(map_io_err)?,
    };

    if let Some(limit) = args.balance_limit {
        loaded.params.balance_limit = limit;
    }
    if let Some(order) = args.donor_order {
        loaded.params.donor_order = order;
    }
    if args.no_second_round {
        loaded.params.second_round = false;
    }
    check_params(&loaded.params).map_err(map_io_err)?;
    loaded.params_sha256 = hasher::sha256_canonical(&loaded.params).map_err(map_io_err)?;
    Ok(loaded)
}

fn write_artifacts(out_dir: &Path, outs: &PipelineOutputs) -> Result<(), MainError> {
    fs::create_dir_all(out_dir).map_err(|e| MainError::Io(format!("mkdir {}: {e}", out_dir.display())))?;
    canonical_json::write_canonical_file(&out_dir.join(PLAN_JSON), &outs.plan)
        .map_err(|e| MainError::Io(format!("write {PLAN_JSON}: {e}")))?;
    canonical_json::write_canonical_file(&out_dir.join(RUN_RECORD_JSON), &outs.run_record)
        .map_err(|e| MainError::Io(format!("write {RUN_RECORD_JSON}: {e}")))?;
    Ok(())
}

/// The bytes on disk must hash to the digest the run record names.
fn verify_written_plan(path: &Path, outs: &PipelineOutputs) -> Result<(), MainError> {
    let on_disk = hasher::sha256_file(path).map_err(map_io_err)?;
    if on_disk != outs.run_record.outputs.plan_sha256 {
        return Err(MainError::SelfVerify(format!(
            "{} hashes to {on_disk}, run record says {}",
            path.display(),
            outs.run_record.outputs.plan_sha256
        )));
    }
    Ok(())
}

fn maybe_render_reports(args: &Args, outs: &PipelineOutputs) -> Result<(), MainError> {
    if args.render.is_empty() {
        return Ok(());
    }
    let model = build_model(outs, &KeywordClassifier).map_err(map_report_err)?;

    for fmt in &args.render {
        match fmt.as_str() {
            "json" => render_json_report(&model, &args.out)?,
            "csv" => render_csv_reports(&model, &args.out, args.per_branch)?,
            other => return Err(MainError::Validation(format!("unknown renderer: {other}"))),
        }
    }
    Ok(())
}

fn render_json_report(model: &rd_report::ReportModel, out_dir: &Path) -> Result<(), MainError> {
    #[cfg(feature = "report-json")]
    {
        rd_report::render_json::write_json_report(out_dir, model).map_err(map_report_err)?;
        Ok(())
    }
    #[cfg(not(feature = "report-json"))]
    {
        let _ = (model, out_dir);
        Err(MainError::Validation("json renderer not enabled (build with feature `report-json`)".into()))
    }
}

fn render_csv_reports(model: &rd_report::ReportModel, out_dir: &Path, per_branch: bool) -> Result<(), MainError> {
    #[cfg(feature = "report-csv")]
    {
        let written = rd_report::render_csv::write_csv_reports(out_dir, model, per_branch).map_err(map_report_err)?;
        info!(files = written.len(), "csv reports written");
        Ok(())
    }
    #[cfg(not(feature = "report-csv"))]
    {
        let _ = (model, out_dir, per_branch);
        Err(MainError::Validation("csv renderer not enabled (build with feature `report-csv`)".into()))
    }
}

// ------------------------------------------------------------------------------------------------
// Error mapping
// ------------------------------------------------------------------------------------------------

fn map_io_err(e: IoError) -> MainError {
    use IoError::*;
    match e {
        Read { .. } | Path(_) | Limit(_) => MainError::Io(e.to_string()),
        Csv { .. } | Json { .. } | MissingColumns { .. } | Manifest(_) | Params(_) | Misaligned(_) | Hash(_) => {
            MainError::Validation(e.to_string())
        }
    }
}

fn map_pipeline_err(e: PipelineError) -> MainError {
    match e {
        PipelineError::Io(io) => map_io_err(io),
        PipelineError::Validate(report) => {
            log_report(&report);
            MainError::Validation(format!("validation failed with {} error(s)", report.error_count()))
        }
        PipelineError::Allocate(a) => MainError::Engine(a.to_string()),
        PipelineError::Build(m) => MainError::Engine(m),
    }
}

fn map_report_err(e: ReportError) -> MainError {
    match e {
        ReportError::Io(io) => MainError::Io(io.to_string()),
        ReportError::Csv(m) => MainError::Io(m),
        ReportError::UnknownCategory(_) => MainError::Engine(e.to_string()),
    }
}

fn log_report(report: &ValidationReport) {
    for i in &report.issues {
        match i.severity {
            rd_pipeline::Severity::Error => error!(code = i.code, where_ = ?i.where_, "{}", i.message),
            rd_pipeline::Severity::Warning => warn!(code = i.code, where_ = ?i.where_, "{}", i.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_exit_codes() {
        let build = map_pipeline_err(PipelineError::Build("branch tables are not aligned".into()));
        assert_eq!(build.exit_code(), exitcodes::ENGINE);
        assert_eq!(build.to_string(), "engine: branch tables are not aligned");

        let io = map_pipeline_err(PipelineError::Io(IoError::Params("balance_limit must be > 0".into())));
        assert_eq!(io.exit_code(), exitcodes::VALIDATION);
    }
}
