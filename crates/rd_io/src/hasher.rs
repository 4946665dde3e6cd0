//! crates/rd_io/src/hasher.rs
//!
//! Deterministic hashing and ID builders for canonical artifacts.
//!
//! - Hex digests are **lowercase** 64-hex.
//! - `sha256_canonical(..)` hashes JSON values/structs through canonical_json.
//! - `sha256_hex(..)` / `sha256_file(..)` hash **raw bytes/files** (branch inputs).
//! - `PLAN:<hex>` derives from the canonical plan body; `RUN:<ts>-<hex>` uses an
//!   RFC3339 UTC timestamp plus a hash of the canonical run record body.

#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical_json::to_canonical_bytes;
use crate::IoError;

/* ---------------------------------- Helpers ---------------------------------- */

#[inline]
pub fn is_lower_hex_64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/* ------------------------------- Raw hashing ------------------------------- */

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 over a reader stream (raw, not canonicalized).
pub fn sha256_stream<R: Read>(reader: &mut R) -> Result<String, IoError> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(|e| IoError::Hash(e.to_string()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_file(path: &Path) -> Result<String, IoError> {
    let f = File::open(path).map_err(|e| IoError::Read { path: path.display().to_string(), source: e })?;
    sha256_stream(&mut BufReader::new(f))
}

/* ---------------------------- Canonical hashing ---------------------------- */

pub fn sha256_canonical<T: Serialize>(value: &T) -> Result<String, IoError> {
    Ok(sha256_hex(&to_canonical_bytes(value)?))
}

/* ---------------------------- Artifact ID builders ---------------------------- */

/// `PLAN:<hex>` over the canonical plan body.
pub fn plan_id_from_canonical<T: Serialize>(body: &T) -> Result<String, IoError> {
    Ok(format!("PLAN:{}", sha256_canonical(body)?))
}

/// Normalize an RFC3339 timestamp to UTC seconds with a trailing `Z`.
pub fn normalize_timestamp(ts: &str) -> Result<String, IoError> {
    let parsed = DateTime::parse_from_rfc3339(ts.trim())
        .map_err(|e| IoError::Hash(format!("invalid timestamp {ts:?}: {e}")))?;
    Ok(parsed.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// `RUN:<ts>-<hex>` where `<hex>` hashes the canonical run body.
pub fn run_id_from_canonical<T: Serialize>(timestamp_utc: &str, body: &T) -> Result<String, IoError> {
    let ts = normalize_timestamp(timestamp_utc)?;
    Ok(format!("RUN:{ts}-{}", sha256_canonical(body)?))
}

/* ------------------------------------ Tests ------------------------------------ */
