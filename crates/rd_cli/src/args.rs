// crates/rd_cli/src/args.rs
//
// Offline, deterministic CLI argument surface.
//
// Rules:
// - No networked paths (reject any scheme:// like http/https/file)
// - Exactly one of: --manifest  XOR  one or more --branch ID=PATH
// - --params only in explicit mode (the manifest carries its own)
// - Output: --out dir, --render [json|csv]*
// - --validate-only loads and validates without allocating

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

use rd_core::{BranchId, DonorOrderPolicy};
use rd_io::looks_like_url;

/// Parsed CLI arguments (raw).
#[derive(Debug, Parser, Clone)]
#[command(
    name = "rd",
    disable_help_subcommand = true,
    about = "Offline, deterministic pharmacy surplus redistribution"
)]
pub struct Args {
    // --- Mode selection ---
    /// Run manifest JSON (mutually exclusive with --branch/--params).
    #[arg(long, conflicts_with_all = ["branch", "params"])]
    pub manifest: Option<PathBuf>,

    // --- Explicit mode ---
    /// Branch table as ID=PATH (CSV or .json). Repeat for every branch, in snapshot order.
    #[arg(long, value_parser = parse_branch_spec)]
    pub branch: Vec<(BranchId, PathBuf)>,
    /// Params JSON path.
    #[arg(long)]
    pub params: Option<PathBuf>,

    // --- Output & rendering ---
    /// Output directory (default: current directory).
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
    /// Report renderer(s) to emit. Omit to skip reports.
    #[arg(long, value_parser = ["json", "csv"])]
    pub render: Vec<String>,
    /// With `--render csv`, also write one transfers_<branch>.csv per receiving branch.
    #[arg(long)]
    pub per_branch: bool,

    // --- Param overrides ---
    /// Balance ceiling override (> 0).
    #[arg(long)]
    pub balance_limit: Option<f64>,
    /// Donor ordering policy override.
    #[arg(long, value_parser = parse_donor_order)]
    pub donor_order: Option<DonorOrderPolicy>,
    /// Skip the stranded-surplus second round.
    #[arg(long)]
    pub no_second_round: bool,

    // --- Determinism & control ---
    /// Pin the run timestamp (RFC3339). Defaults to the system clock.
    #[arg(long)]
    pub timestamp: Option<String>,
    /// Load and validate inputs only; nothing is allocated or written.
    #[arg(long)]
    pub validate_only: bool,
    /// Only warnings and errors on stderr.
    #[arg(long)]
    pub quiet: bool,
}

/// Argument errors. Keep messages short and stable (scripts grep them).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("missing required flag: {0}")]
    Missing(&'static str),
    #[error("path must be local file (no scheme): {0}")]
    NonLocalPath(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("duplicate --branch id: {0}")]
    DuplicateBranch(String),
    #[error("--per-branch requires --render csv")]
    PerBranchWithoutCsv,
}

/// `ID=PATH` → (BranchId, PathBuf).
pub fn parse_branch_spec(s: &str) -> Result<(BranchId, PathBuf), String> {
    let (id, path) = s.split_once('=').ok_or_else(|| format!("expected ID=PATH, got {s:?}"))?;
    let id = parse_branch_id(id.trim())?;
    let path = path.trim();
    if path.is_empty() {
        return Err(format!("empty path for branch {id}"));
    }
    Ok((id, PathBuf::from(path)))
}

pub fn parse_branch_id(s: &str) -> Result<BranchId, String> {
    s.parse::<BranchId>().map_err(|e| e.to_string())
}

pub fn parse_donor_order(s: &str) -> Result<DonorOrderPolicy, String> {
    s.parse::<DonorOrderPolicy>().map_err(|e| e.to_string())
}

/// Entry point used by main.rs
pub fn parse_and_validate() -> Result<Args, CliError> {
    check(Args::parse())
}

/// Mode, locality and existence checks, then path normalization.
pub fn check(mut args: Args) -> Result<Args, CliError> {
    for p in iter_all_paths(&args) {
        ensure_local_path(p)?;
    }

    if let Some(manifest) = &args.manifest {
        ensure_local_exists(manifest, "--manifest")?;
        args.manifest = Some(normalize_path(manifest));
    } else {
        validate_explicit_mode(&args)?;
        args.branch = args.branch.into_iter().map(|(id, p)| (id, normalize_path(&p))).collect();
        args.params = args.params.take().map(|p| normalize_path(&p));
    }

    if args.per_branch && !args.render.iter().any(|r| r == "csv") {
        return Err(CliError::PerBranchWithoutCsv);
    }

    args.out = normalize_path(&args.out);
    Ok(args)
}

fn validate_explicit_mode(a: &Args) -> Result<(), CliError> {
    if a.branch.is_empty() {
        return Err(CliError::Missing("--manifest or --branch"));
    }
    let mut seen: Vec<&BranchId> = Vec::with_capacity(a.branch.len());
    for (id, path) in &a.branch {
        if seen.contains(&id) {
            return Err(CliError::DuplicateBranch(id.to_string()));
        }
        seen.push(id);
        ensure_local_exists(path, "--branch")?;
    }
    if let Some(p) = &a.params {
        ensure_local_exists(p, "--params")?;
    }
    Ok(())
}

fn iter_all_paths(args: &Args) -> impl Iterator<Item = &Path> {
    args.manifest
        .as_deref()
        .into_iter()
        .chain(args.branch.iter().map(|(_, p)| p.as_path()))
        .chain(args.params.as_deref())
        .chain(std::iter::once(args.out.as_path()))
}

#[inline]
fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    match p.to_str() {
        Some(s) if looks_like_url(s) => Err(CliError::NonLocalPath(s.to_string())),
        _ => Ok(()),
    }
}

fn ensure_local_exists(p: &Path, label: &'static str) -> Result<(), CliError> {
    ensure_local_path(p)?;
    match fs::metadata(p) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(CliError::NotFound(format!("{label} {}", p.display()))),
    }
}

/// Best-effort absolute path; falls back to CWD-joined when the path does not exist yet.
fn normalize_path(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(p)
        }
    })
}
