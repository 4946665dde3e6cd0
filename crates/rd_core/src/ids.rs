//! crates/rd_core/src/ids.rs
//! Branch identifiers and product positions.
//! Deterministic, ASCII-only, strict shapes; no I/O.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::CoreError;

const TOKEN_MAX_LEN: usize = 64;

/// Position of a product row inside a branch table. Row `i` refers to the
/// same product in every branch of a snapshot.
pub type ProductIndex = usize;

/// Token for BranchId: ^[A-Za-z0-9_.:-]{1,64}$ (ASCII only)
#[inline]
pub fn is_valid_token(s: &str) -> bool {
    let bs = s.as_bytes();
    if bs.is_empty() || bs.len() > TOKEN_MAX_LEN {
        return false;
    }
    bs.iter().all(|&b| {
        b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b':' || b == b'-'
    })
}

/// Inventory location token. Branches compare by identity only.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct BranchId(String);

impl BranchId {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if is_valid_token(&s) { Ok(BranchId(s)) } else { Err(CoreError::InvalidToken) }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BranchId {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BranchId::new(s)
    }
}

impl TryFrom<&str> for BranchId {
    type Error = CoreError;
    #[inline]
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for BranchId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        use serde::de::{Error as DeError, Unexpected};
        let s = String::deserialize(d)?;
        if is_valid_token(&s) {
            Ok(BranchId(s))
        } else {
            Err(D::Error::invalid_value(Unexpected::Str(&s), &"token [A-Za-z0-9_.:-], len 1..=64"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens() {
        for ok in ["A", "main", "branch_2", "wh:central", "north-1.b"] {
            assert!(is_valid_token(ok));
            let b: BranchId = ok.parse().unwrap();
            assert_eq!(b.as_str(), ok);
            assert_eq!(format!("{b}"), ok);
        }
        let long = "x".repeat(65);
        for bad in ["", " ", "a b", "é", long.as_str()] {
            assert!(!is_valid_token(bad));
            assert_eq!(bad.parse::<BranchId>(), Err(CoreError::InvalidToken));
        }
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut ids: Vec<BranchId> = ["c", "a", "b"].iter().map(|s| s.parse().unwrap()).collect();
        ids.sort();
        let names: Vec<&str> = ids.iter().map(BranchId::as_str).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
