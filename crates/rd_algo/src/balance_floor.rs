//! Balance-floor rule: how much a branch may still receive without its
//! balance passing the ceiling.
//!
//! Pure float math, no rounding except for the allocation cap which is
//! rounded up before use.

use rd_core::variables::DEFAULT_BALANCE_LIMIT;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BalanceFloor {
    pub limit: f64,
}

impl Default for BalanceFloor {
    fn default() -> Self {
        BalanceFloor { limit: DEFAULT_BALANCE_LIMIT }
    }
}

impl BalanceFloor {
    pub fn new(limit: f64) -> Self {
        BalanceFloor { limit }
    }

    /// True iff the branch is already at or above the ceiling.
    #[inline]
    pub fn should_skip(&self, balance: f64) -> bool {
        balance >= self.limit
    }

    /// Units the branch may take for one product.
    ///
    /// `allocation` is the proportional entitlement, if the product is scarce.
    /// A zero or missing entitlement leaves the result uncapped.
    pub fn target_amount(&self, needed: f64, balance: f64, allocation: Option<f64>) -> f64 {
        if self.should_skip(balance) {
            return 0.0;
        }
        let headroom = self.limit - balance;
        let mut result = if needed + balance > self.limit { headroom } else { needed };

        if let Some(a) = allocation.filter(|a| *a > 0.0) {
            let a = a.ceil();
            result = if a + balance > self.limit { result.min(headroom) } else { result.min(a) };
        }
        result
    }
}
