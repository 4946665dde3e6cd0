//! Loader: read branch tables (CSV or JSON), params and the run manifest, check
//! required columns and cross-branch alignment, and return a typed
//! `LoadedContext` for the pipeline. No network I/O.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use rd_core::{BranchId, Params, ProductRow};

use crate::hasher::{sha256_canonical, sha256_hex};
use crate::manifest::load_and_resolve_manifest;
use crate::params::load_params;
use crate::IoError;

/// Columns every branch table must carry. `unit` is optional.
pub const REQUIRED_COLUMNS: [&str; 6] =
    ["code", "product_name", "balance", "needed_quantity", "surplus_quantity", "avg_sales"];

const MAX_TABLE_BYTES: u64 = 64 * 1024 * 1024;
const MAX_ROWS: usize = 1_000_000;

// ----------------------------- Public types -----------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
}

impl TableFormat {
    /// `.json` → JSON, anything else → CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => TableFormat::Json,
            _ => TableFormat::Csv,
        }
    }
}

/// One loaded branch table plus the digest of its raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedBranch {
    pub id: BranchId,
    pub path: PathBuf,
    pub rows: Vec<ProductRow>,
    pub sha256: String,
}

/// Everything the pipeline needs, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedContext {
    pub manifest_id: Option<String>,
    pub branches: Vec<LoadedBranch>,
    pub params: Params,
    pub params_sha256: String,
}

impl LoadedContext {
    pub fn input_digests(&self) -> BTreeMap<String, String> {
        self.branches.iter().map(|b| (b.id.to_string(), b.sha256.clone())).collect()
    }
}

// ----------------------------- Orchestration -----------------------------

/// Manifest → params → branch tables → alignment.
pub fn load_all_from_manifest(path: &Path) -> Result<LoadedContext, IoError> {
    let resolved = load_and_resolve_manifest(path)?;
    let mut ctx = load_from_paths(&resolved.branches, resolved.params_path.as_deref())?;
    ctx.manifest_id = resolved.id;
    Ok(ctx)
}

/// Explicit mode: branch files given directly, optional params file.
pub fn load_from_paths(branches: &[(BranchId, PathBuf)], params_path: Option<&Path>) -> Result<LoadedContext, IoError> {
    let params = match params_path {
        Some(p) => load_params(p)?,
        None => Params::default(),
    };
    let params_sha256 = sha256_canonical(&params)?;

    let mut loaded = Vec::with_capacity(branches.len());
    for (id, path) in branches {
        loaded.push(load_branch_table(id, path)?);
    }
    check_alignment(&loaded)?;

    Ok(LoadedContext { manifest_id: None, branches: loaded, params, params_sha256 })
}

// ----------------------------- Targeted loaders -----------------------------

pub fn load_branch_table(id: &BranchId, path: &Path) -> Result<LoadedBranch, IoError> {
    let bytes = read_with_limit(path)?;
    let sha256 = sha256_hex(&bytes);
    let rows = match TableFormat::from_path(path) {
        TableFormat::Csv => parse_csv_table(id, path, &bytes)?,
        TableFormat::Json => parse_json_table(id, path, &bytes)?,
    };
    Ok(LoadedBranch { id: id.clone(), path: path.to_path_buf(), rows, sha256 })
}

/// CSV with a header row; cells are trimmed and empty numeric cells read as 0.
pub fn parse_csv_table(id: &BranchId, path: &Path, bytes: &[u8]) -> Result<Vec<ProductRow>, IoError> {
    let ctx = path.display().to_string();
    let csv_err = |msg: String| IoError::Csv { path: ctx.clone(), msg };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = rdr.headers().map_err(|e| csv_err(e.to_string()))?.clone();
    let index: BTreeMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();
    require_columns(id, path, |c| index.contains_key(c))?;
    let col = |name: &str| index.get(name).copied();

    let mut rows = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let line = i + 2;
        let rec = rec.map_err(|e| csv_err(format!("line {line}: {e}")))?;
        if rows.len() >= MAX_ROWS {
            return Err(IoError::Limit(format!("{ctx}: more than {MAX_ROWS} rows")));
        }
        let text = |name: &str| col(name).and_then(|c| rec.get(c)).unwrap_or("").to_string();
        let num = |name: &str| -> Result<f64, IoError> {
            let cell = col(name).and_then(|c| rec.get(c)).unwrap_or("");
            parse_number(cell).ok_or_else(|| csv_err(format!("line {line}, column {name}: not a number: {cell:?}")))
        };
        let unit = text("unit");
        rows.push(ProductRow {
            code: text("code"),
            product_name: text("product_name"),
            unit: (!unit.is_empty()).then_some(unit),
            avg_sales: num("avg_sales")?,
            balance: num("balance")?,
            needed_quantity: num("needed_quantity")?,
            surplus_quantity: num("surplus_quantity")?,
        });
    }
    Ok(rows)
}

/// JSON array of row objects. The required-column check runs on the key union.
pub fn parse_json_table(id: &BranchId, path: &Path, bytes: &[u8]) -> Result<Vec<ProductRow>, IoError> {
    let ctx = path.display().to_string();
    let json_err = |msg: String| IoError::Json { path: ctx.clone(), msg };

    let objects: Vec<Map<String, Value>> =
        serde_json::from_slice(bytes).map_err(|e| json_err(format!("expected an array of row objects: {e}")))?;
    if objects.len() > MAX_ROWS {
        return Err(IoError::Limit(format!("{ctx}: more than {MAX_ROWS} rows")));
    }
    require_columns(id, path, |c| objects.iter().any(|o| o.contains_key(c)))?;

    let mut rows = Vec::with_capacity(objects.len());
    for (i, obj) in objects.iter().enumerate() {
        let text = |name: &str| match obj.get(name) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let num = |name: &str| -> Result<f64, IoError> {
            let v = match obj.get(name) {
                None | Some(Value::Null) => Some(0.0),
                Some(Value::Number(n)) => n.as_f64(),
                Some(Value::String(s)) => parse_number(s),
                Some(_) => None,
            };
            v.ok_or_else(|| json_err(format!("row {i}, key {name}: not a number")))
        };
        let unit = text("unit");
        rows.push(ProductRow {
            code: text("code"),
            product_name: text("product_name"),
            unit: (!unit.is_empty()).then_some(unit),
            avg_sales: num("avg_sales")?,
            balance: num("balance")?,
            needed_quantity: num("needed_quantity")?,
            surplus_quantity: num("surplus_quantity")?,
        });
    }
    Ok(rows)
}

/// Same row count everywhere and the same product code at every index.
pub fn check_alignment(branches: &[LoadedBranch]) -> Result<(), IoError> {
    let Some(first) = branches.first() else { return Ok(()) };
    for b in &branches[1..] {
        if b.rows.len() != first.rows.len() {
            return Err(IoError::Misaligned(format!(
                "branch {} has {} rows, branch {} has {}",
                first.id,
                first.rows.len(),
                b.id,
                b.rows.len()
            )));
        }
        for (i, (x, y)) in first.rows.iter().zip(&b.rows).enumerate() {
            if x.code != y.code {
                return Err(IoError::Misaligned(format!(
                    "row {i}: code {:?} in {} vs {:?} in {}",
                    x.code, first.id, y.code, b.id
                )));
            }
        }
    }
    Ok(())
}

// ----------------------------- helpers -----------------------------

fn read_with_limit(path: &Path) -> Result<Vec<u8>, IoError> {
    let read_err = |e| IoError::Read { path: path.display().to_string(), source: e };
    let f = File::open(path).map_err(read_err)?;
    let mut buf = Vec::new();
    f.take(MAX_TABLE_BYTES + 1).read_to_end(&mut buf).map_err(read_err)?;
    if buf.len() as u64 > MAX_TABLE_BYTES {
        return Err(IoError::Limit(format!("{} exceeds {MAX_TABLE_BYTES} bytes", path.display())));
    }
    Ok(buf)
}

fn require_columns(id: &BranchId, path: &Path, has: impl Fn(&str) -> bool) -> Result<(), IoError> {
    let missing: Vec<String> = REQUIRED_COLUMNS.iter().filter(|c| !has(**c)).map(|c| c.to_string()).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(IoError::MissingColumns { branch: id.to_string(), path: path.display().to_string(), columns: missing })
    }
}

/// Empty → 0; otherwise a plain float.
fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(0.0);
    }
    cell.parse::<f64>().ok()
}
