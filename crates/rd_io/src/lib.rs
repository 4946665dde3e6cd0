//! crates/rd_io/src/lib.rs
//! Offline I/O for the engine.
//!
//! - Branch tables (CSV or JSON) with required-column and alignment checks.
//! - Run manifest and params files.
//! - Canonical JSON and SHA-256 digests / ID builders.
//!
//! Shared error type `IoError`; details live in submodules.

#![forbid(unsafe_code)]

use thiserror::Error;

pub mod canonical_json;
pub mod hasher;
pub mod loader;
pub mod manifest;
pub mod params;

/// Unified error for rd_io.
#[derive(Debug, Error)]
pub enum IoError {
    /// Opening or reading an input file.
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV shape or cell errors, with line/column context in `msg`.
    #[error("csv error in {path}: {msg}")]
    Csv { path: String, msg: String },

    /// JSON parse/shape errors.
    #[error("json error in {path}: {msg}")]
    Json { path: String, msg: String },

    /// A branch table lacks required columns. All missing columns are listed.
    #[error("branch {branch} ({path}) is missing required columns: {}", .columns.join(", "))]
    MissingColumns {
        branch: String,
        path: String,
        columns: Vec<String>,
    },

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("params error: {0}")]
    Params(String),

    /// Branch tables disagree on row count or product code at an index.
    #[error("branch tables are not aligned: {0}")]
    Misaligned(String),

    /// Filesystem / path errors on output (create_dir_all, rename, fsync).
    #[error("io/path error: {0}")]
    Path(String),

    #[error("hash error: {0}")]
    Hash(String),

    /// Input exceeded a size or row bound.
    #[error("limit exceeded: {0}")]
    Limit(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Json { path: "-".to_string(), msg: e.to_string() }
    }
}

/// Returns true if `s` looks like a URL (any `<scheme>://`, plus bare http/https).
#[inline]
pub fn looks_like_url(s: &str) -> bool {
    let s = s.trim();
    s.contains("://") || s.starts_with("http:") || s.starts_with("https:")
}

pub mod prelude {
    pub use crate::{IoError, IoResult};

    pub use crate::canonical_json::{to_canonical_bytes, write_canonical_file};
    pub use crate::hasher::{sha256_canonical, sha256_hex};
    pub use crate::loader::{load_all_from_manifest, load_from_paths, LoadedBranch, LoadedContext};
}
