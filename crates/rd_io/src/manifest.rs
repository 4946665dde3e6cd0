// crates/rd_io/src/manifest.rs
//
// Run manifest: which branch tables to load and where the params live.
//
// • Offline-only: any path with a scheme is rejected.
// • Paths are relative to the manifest's directory unless absolute.
// • Digests (if provided) are 64-lower-hex over the raw bytes of the branch file,
//   and only for branches listed in the manifest.
// • `id` is optional and non-normative.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use rd_core::ids::BranchId;

use crate::hasher::{is_lower_hex_64, sha256_file};
use crate::{looks_like_url, IoError};

const MAX_MANIFEST_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchEntry {
    pub id: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub id: Option<String>,
    pub branches: Vec<BranchEntry>,
    #[serde(default)]
    pub params_path: Option<String>,
    /// branch id → sha256 of the branch file's raw bytes.
    #[serde(default)]
    pub inputs_sha256: Option<BTreeMap<String, String>>,
}

/// Manifest with typed ids and resolved paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedManifest {
    pub id: Option<String>,
    pub branches: Vec<(BranchId, PathBuf)>,
    pub params_path: Option<PathBuf>,
    pub digests: BTreeMap<BranchId, String>,
}

// ---------- helpers ----------

fn man_err(msg: impl Into<String>) -> IoError {
    IoError::Manifest(msg.into())
}

fn offline_check(field: &str, value: &str) -> Result<(), IoError> {
    if value.trim().is_empty() {
        return Err(man_err(format!("{field} must not be empty")));
    }
    if looks_like_url(value) {
        return Err(man_err(format!("{field} must be a local path: {value}")));
    }
    Ok(())
}

fn branch_id(field: &str, raw: &str) -> Result<BranchId, IoError> {
    raw.parse().map_err(|_| man_err(format!("{field}: invalid branch id {raw:?}")))
}

#[inline]
fn join_under(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

// ---------- validation ----------

/// Shape and offline checks. No filesystem access.
pub fn validate_manifest(man: &Manifest) -> Result<(), IoError> {
    if man.branches.is_empty() {
        return Err(man_err("branches must not be empty"));
    }
    let mut seen = BTreeSet::new();
    for (i, b) in man.branches.iter().enumerate() {
        branch_id(&format!("branches[{i}].id"), &b.id)?;
        offline_check(&format!("branches[{i}].path"), &b.path)?;
        if !seen.insert(b.id.as_str()) {
            return Err(man_err(format!("duplicate branch id {:?}", b.id)));
        }
    }
    if let Some(p) = &man.params_path {
        offline_check("params_path", p)?;
    }
    if let Some(d) = &man.inputs_sha256 {
        for (k, hex) in d {
            if !seen.contains(k.as_str()) {
                return Err(man_err(format!("digest supplied for unknown branch {k:?}")));
            }
            if !is_lower_hex_64(hex) {
                return Err(man_err(format!("invalid sha256 for {k}: {hex}")));
            }
        }
    }
    Ok(())
}

/// Resolve paths under `base` and check that each branch file exists.
pub fn resolve_paths(base: &Path, man: &Manifest) -> Result<ResolvedManifest, IoError> {
    let mut branches = Vec::with_capacity(man.branches.len());
    for (i, b) in man.branches.iter().enumerate() {
        let id = branch_id(&format!("branches[{i}].id"), &b.id)?;
        let path = join_under(base, &b.path);
        if !path.is_file() {
            return Err(man_err(format!("branch {id}: not a file: {}", path.display())));
        }
        branches.push((id, path));
    }
    let params_path = man.params_path.as_deref().map(|p| join_under(base, p));
    if let Some(p) = &params_path {
        if !p.is_file() {
            return Err(man_err(format!("params_path: not a file: {}", p.display())));
        }
    }
    let mut digests = BTreeMap::new();
    for (k, v) in man.inputs_sha256.iter().flatten() {
        digests.insert(branch_id("inputs_sha256", k)?, v.clone());
    }
    Ok(ResolvedManifest { id: man.id.clone(), branches, params_path, digests })
}

/// Compare declared digests with the raw bytes of each branch file.
pub fn verify_digests(resolved: &ResolvedManifest) -> Result<(), IoError> {
    for (id, path) in &resolved.branches {
        if let Some(want) = resolved.digests.get(id) {
            let got = sha256_file(path)?;
            if &got != want {
                return Err(man_err(format!("sha256 mismatch for {id}: expected={want} got={got}")));
            }
        }
    }
    Ok(())
}

// ---------- top-level ----------

pub fn load_manifest(path: &Path) -> Result<Manifest, IoError> {
    let f = File::open(path).map_err(|e| IoError::Read { path: path.display().to_string(), source: e })?;
    let mut buf = Vec::new();
    f.take(MAX_MANIFEST_BYTES + 1)
        .read_to_end(&mut buf)
        .map_err(|e| IoError::Read { path: path.display().to_string(), source: e })?;
    if buf.len() as u64 > MAX_MANIFEST_BYTES {
        return Err(IoError::Limit(format!("manifest exceeds {MAX_MANIFEST_BYTES} bytes")));
    }
    let man: Manifest = serde_json::from_slice(&buf)
        .map_err(|e| IoError::Json { path: path.display().to_string(), msg: e.to_string() })?;
    validate_manifest(&man)?;
    Ok(man)
}

/// Load, validate, resolve under the manifest's directory and verify digests.
pub fn load_and_resolve_manifest(path: &Path) -> Result<ResolvedManifest, IoError> {
    let man = load_manifest(path)?;
    let base = path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let resolved = resolve_paths(&base, &man)?;
    verify_digests(&resolved)?;
    Ok(resolved)
}
