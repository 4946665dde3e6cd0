//! render_csv.rs: flat CSV views of the report model.
//!
//! One header row per file, rows in model order. Empty optional cells stay empty.

use std::path::{Path, PathBuf};

use serde::Serialize;

use rd_io::canonical_json::write_bytes_atomic;

use crate::{ReportError, ReportModel, TransferRow};

pub const TRANSFERS_CSV: &str = "transfers.csv";
pub const SHORTAGES_CSV: &str = "shortages.csv";
pub const SURPLUS_REMAINING_CSV: &str = "surplus_remaining.csv";

const TRANSFER_COLUMNS: &[&str] = &["from", "to", "code", "product_name", "unit", "quantity", "round", "category"];
const SHORTAGE_COLUMNS: &[&str] = &["branch", "code", "product_name", "needed", "received", "remaining", "category"];
const REMAINING_COLUMNS: &[&str] = &["branch", "code", "product_name", "original", "withdrawn", "remaining"];

/// Header is written by hand so a table with no rows still names its columns.
fn to_csv<'a, T: Serialize + 'a>(columns: &[&str], rows: impl IntoIterator<Item = &'a T>) -> Result<Vec<u8>, ReportError> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    w.write_record(columns).map_err(|e| ReportError::Csv(e.to_string()))?;
    for row in rows {
        w.serialize(row).map_err(|e| ReportError::Csv(e.to_string()))?;
    }
    w.into_inner().map_err(|e| ReportError::Csv(e.to_string()))
}

pub fn transfers_csv(model: &ReportModel) -> Result<Vec<u8>, ReportError> {
    to_csv(TRANSFER_COLUMNS, &model.transfers)
}

pub fn shortages_csv(model: &ReportModel) -> Result<Vec<u8>, ReportError> {
    to_csv(SHORTAGE_COLUMNS, &model.shortages)
}

pub fn surplus_remaining_csv(model: &ReportModel) -> Result<Vec<u8>, ReportError> {
    to_csv(REMAINING_COLUMNS, &model.remaining_surplus)
}

/// `transfers_<branch>.csv` bodies, one per receiving branch.
pub fn per_branch_transfers(model: &ReportModel) -> Result<Vec<(String, Vec<u8>)>, ReportError> {
    model
        .receivers()
        .into_iter()
        .map(|b| {
            let rows: Vec<&TransferRow> = model.transfers.iter().filter(|t| &t.to == b).collect();
            Ok((format!("transfers_{b}.csv"), to_csv(TRANSFER_COLUMNS, rows)?))
        })
        .collect()
}

/// Write the CSV set into `dir`; returns written paths in write order.
pub fn write_csv_reports(dir: &Path, model: &ReportModel, per_branch: bool) -> Result<Vec<PathBuf>, ReportError> {
    let mut files = vec![
        (TRANSFERS_CSV.to_string(), transfers_csv(model)?),
        (SHORTAGES_CSV.to_string(), shortages_csv(model)?),
        (SURPLUS_REMAINING_CSV.to_string(), surplus_remaining_csv(model)?),
    ];
    if per_branch {
        files.extend(per_branch_transfers(model)?);
    }

    let mut written = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let path = dir.join(name);
        write_bytes_atomic(&path, &bytes)?;
        written.push(path);
    }
    Ok(written)
}
