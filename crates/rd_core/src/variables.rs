//! crates/rd_core/src/variables.rs
//! Engine parameters with safe defaults, wire tokens and domain validation.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::ids::BranchId;

pub const DEFAULT_BALANCE_LIMIT: f64 = 30.0;
pub const DEFAULT_INVERSE_BALANCE_EPSILON: f64 = 0.1;

// ------------ Macros ------------

/// Enum with explicit wire tokens, shared by serde, `FromStr` and `Display`.
macro_rules! token_enum {
    ($name:ident => { $($variant:ident = $token:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub enum $name {
            $(
                #[cfg_attr(feature = "serde", serde(rename = $token))]
                $variant,
            )+
        }

        impl $name {
            pub const fn as_str(self) -> &'static str {
                match self { $($name::$variant => $token,)+ }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($name::$variant),)+
                    _ => Err(CoreError::InvalidToken),
                }
            }
        }
    };
}

// ------------ Canonical enums ------------

token_enum!(DonorOrderPolicy => {
    SurplusDesc    = "surplus_desc",
    BranchPriority = "branch_priority",
});

impl Default for DonorOrderPolicy {
    fn default() -> Self {
        DonorOrderPolicy::SurplusDesc
    }
}

// ------------ Shapes ------------

/// Weights of the proportional score. Must not all be zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ScoreWeights {
    pub activity: f64,
    pub need: f64,
    pub inverse_balance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights { activity: 0.10, need: 0.30, inverse_balance: 0.60 }
    }
}

/// Run parameters. Every field has a default, so `{}` is a valid params file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct Params {
    /// Balance ceiling a receiver may not be topped above.
    pub balance_limit: f64,
    pub weights: ScoreWeights,
    /// Added to balance before inversion so empty shelves score finitely.
    pub inverse_balance_epsilon: f64,
    pub donor_order: DonorOrderPolicy,
    /// Used only with `DonorOrderPolicy::BranchPriority`.
    pub branch_priority: Vec<BranchId>,
    pub second_round: bool,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            balance_limit: DEFAULT_BALANCE_LIMIT,
            weights: ScoreWeights::default(),
            inverse_balance_epsilon: DEFAULT_INVERSE_BALANCE_EPSILON,
            donor_order: DonorOrderPolicy::default(),
            branch_priority: Vec::new(),
            second_round: true,
        }
    }
}

/// Reject values the allocation math cannot work with.
pub fn validate_domains(p: &Params) -> Result<(), CoreError> {
    if !p.balance_limit.is_finite() || p.balance_limit <= 0.0 {
        return Err(CoreError::DomainOutOfRange("balance_limit"));
    }
    if !p.inverse_balance_epsilon.is_finite() || p.inverse_balance_epsilon <= 0.0 {
        return Err(CoreError::DomainOutOfRange("inverse_balance_epsilon"));
    }
    let w = p.weights;
    for (name, v) in [
        ("weights.activity", w.activity),
        ("weights.need", w.need),
        ("weights.inverse_balance", w.inverse_balance),
    ] {
        if !v.is_finite() || v < 0.0 {
            return Err(CoreError::DomainOutOfRange(name));
        }
    }
    if w.activity + w.need + w.inverse_balance <= 0.0 {
        return Err(CoreError::DomainOutOfRange("weights"));
    }
    for (i, b) in p.branch_priority.iter().enumerate() {
        if p.branch_priority[..i].contains(b) {
            return Err(CoreError::DomainOutOfRange("branch_priority"));
        }
    }
    Ok(())
}
