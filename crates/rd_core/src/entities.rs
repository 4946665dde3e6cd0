//! crates/rd_core/src/entities.rs
//! Snapshot rows, branch tables and the per-(branch, product) withdrawal lists.

use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::ids::{BranchId, ProductIndex};

// ----------------------------- Snapshot rows -----------------------------

/// One product line of one branch's analytics table.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProductRow {
    pub code: String,
    pub product_name: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub unit: Option<String>,
    /// Branch activity signal (≥ 0).
    pub avg_sales: f64,
    /// On-hand quantity; fractional after unit conversions.
    pub balance: f64,
    /// > 0 means the branch is short.
    pub needed_quantity: f64,
    /// > 0 means the branch holds excess.
    pub surplus_quantity: f64,
}

/// Point-in-time dataset: one table per branch, index-aligned by product.
///
/// `branches()` keeps the caller's order; that order is the canonical
/// iteration order of every stage downstream.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchData {
    branches: Vec<BranchId>,
    tables: BTreeMap<BranchId, Vec<ProductRow>>,
    product_count: usize,
}

impl BranchData {
    /// Build a snapshot; rejects an empty set, duplicate ids and tables of
    /// unequal length.
    pub fn new(tables: Vec<(BranchId, Vec<ProductRow>)>) -> Result<Self, CoreError> {
        if tables.is_empty() {
            return Err(CoreError::EmptyBranchSet);
        }
        let product_count = tables[0].1.len();
        let mut seen = BTreeSet::new();
        let mut branches = Vec::with_capacity(tables.len());
        let mut map = BTreeMap::new();
        for (branch, rows) in tables {
            if !seen.insert(branch.clone()) {
                return Err(CoreError::DuplicateBranch);
            }
            if rows.len() != product_count {
                return Err(CoreError::MisalignedTables);
            }
            branches.push(branch.clone());
            map.insert(branch, rows);
        }
        Ok(BranchData { branches, tables: map, product_count })
    }

    #[inline]
    pub fn branches(&self) -> &[BranchId] {
        &self.branches
    }

    #[inline]
    pub fn product_count(&self) -> usize {
        self.product_count
    }

    pub fn row(&self, branch: &BranchId, product: ProductIndex) -> Option<&ProductRow> {
        self.tables.get(branch).and_then(|t| t.get(product))
    }

    pub fn contains(&self, branch: &BranchId) -> bool {
        self.tables.contains_key(branch)
    }

    /// Position of `branch` in the canonical branch order.
    pub fn position(&self, branch: &BranchId) -> Option<usize> {
        self.branches.iter().position(|b| b == branch)
    }
}

// ----------------------------- Withdrawal records -----------------------------

/// Which allocation pass produced a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Round {
    First,
    Second,
}

/// One donor contact for a (receiving branch, product) pair.
///
/// A record with no donor and zero units is the "nothing found" sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WithdrawalRecord {
    pub surplus_from_branch: u64,
    #[cfg_attr(feature = "serde", serde(with = "donor_field"))]
    pub available_branch: Option<BranchId>,
    pub surplus_remaining: u64,
    pub remaining_needed: u64,
    pub round: Round,
}

impl WithdrawalRecord {
    pub fn sentinel(remaining_needed: u64) -> Self {
        WithdrawalRecord {
            surplus_from_branch: 0,
            available_branch: None,
            surplus_remaining: 0,
            remaining_needed,
            round: Round::First,
        }
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.available_branch.is_none() && self.surplus_from_branch == 0
    }

    /// Donor id, or "" for the sentinel.
    pub fn donor_label(&self) -> &str {
        self.available_branch.as_ref().map(BranchId::as_str).unwrap_or("")
    }
}

/// Wire shape: the donor is a plain string, empty when no donor was found.
#[cfg(feature = "serde")]
mod donor_field {
    use super::BranchId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<BranchId>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(v.as_ref().map(BranchId::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<BranchId>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<BranchId>().map(Some).map_err(serde::de::Error::custom)
    }
}

// ----------------------------- Transfer plan -----------------------------

/// Ordered withdrawal lists keyed by (receiving branch, product index).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransferPlan {
    lists: BTreeMap<(BranchId, ProductIndex), Vec<WithdrawalRecord>>,
}

impl TransferPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list for a pair. Empty lists are stored as a zero sentinel.
    pub fn insert(&mut self, branch: BranchId, product: ProductIndex, mut records: Vec<WithdrawalRecord>) {
        if records.is_empty() {
            records.push(WithdrawalRecord::sentinel(0));
        }
        self.lists.insert((branch, product), records);
    }

    /// Append a real withdrawal. A lone sentinel is replaced, since it only
    /// stands for "no withdrawal happened".
    pub fn append(&mut self, branch: &BranchId, product: ProductIndex, record: WithdrawalRecord) {
        let list = self.lists.entry((branch.clone(), product)).or_default();
        if list.len() == 1 && list[0].is_sentinel() {
            list.clear();
        }
        list.push(record);
    }

    pub fn records(&self, branch: &BranchId, product: ProductIndex) -> &[WithdrawalRecord] {
        // Keyed lookup needs an owned key; plans are small enough for this to be fine.
        self.lists
            .get(&(branch.clone(), product))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Units already moved into `branch` for `product`, across all rounds.
    pub fn transferred(&self, branch: &BranchId, product: ProductIndex) -> u64 {
        self.records(branch, product).iter().map(|r| r.surplus_from_branch).sum()
    }

    /// Unmet need after all rounds: the last record's `remaining_needed`.
    pub fn final_remaining(&self, branch: &BranchId, product: ProductIndex) -> u64 {
        self.records(branch, product).last().map(|r| r.remaining_needed).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BranchId, ProductIndex, &[WithdrawalRecord])> {
        self.lists.iter().map(|((b, p), v)| (b, *p, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}
