//! Params file loading. Every field is defaulted, unknown keys are rejected,
//! and domains are checked before the engine sees the values.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rd_core::variables::{validate_domains, Params};

use crate::IoError;

const MAX_PARAMS_BYTES: u64 = 1024 * 1024;

pub fn load_params(path: &Path) -> Result<Params, IoError> {
    let f = File::open(path).map_err(|e| IoError::Read { path: path.display().to_string(), source: e })?;
    let mut buf = Vec::new();
    f.take(MAX_PARAMS_BYTES + 1)
        .read_to_end(&mut buf)
        .map_err(|e| IoError::Read { path: path.display().to_string(), source: e })?;
    if buf.len() as u64 > MAX_PARAMS_BYTES {
        return Err(IoError::Limit(format!("{} exceeds {MAX_PARAMS_BYTES} bytes", path.display())));
    }
    parse_params(&buf).map_err(|e| match e {
        IoError::Params(msg) => IoError::Params(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn parse_params(bytes: &[u8]) -> Result<Params, IoError> {
    let p: Params = serde_json::from_slice(bytes).map_err(|e| IoError::Params(e.to_string()))?;
    check_params(&p)?;
    Ok(p)
}

/// Domain check with the io error shape.
pub fn check_params(p: &Params) -> Result<(), IoError> {
    validate_domains(p).map_err(|e| IoError::Params(e.to_string()))
}
