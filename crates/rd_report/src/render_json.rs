//! render_json.rs: report.json renderer.
//! Canonical bytes (sorted keys, LF) so the file hashes the same across runs.

use std::path::{Path, PathBuf};

use rd_io::canonical_json::{to_canonical_bytes, write_bytes_atomic};

use crate::{ReportError, ReportModel};

pub const REPORT_JSON: &str = "report.json";

pub fn render_json(model: &ReportModel) -> Result<Vec<u8>, ReportError> {
    Ok(to_canonical_bytes(model)?)
}

/// Write `report.json` into `dir` and return its path.
pub fn write_json_report(dir: &Path, model: &ReportModel) -> Result<PathBuf, ReportError> {
    let path = dir.join(REPORT_JSON);
    write_bytes_atomic(&path, &render_json(model)?)?;
    Ok(path)
}
