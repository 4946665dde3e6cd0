//! rd_report/src/lib.rs: Offline report model + renderers (JSON/CSV).
//!
//! Determinism rules:
//! - Reads pipeline outputs only; nothing is recomputed.
//! - Line order follows the plan: product order, then snapshot branch order.
//! - Category sections follow the classifier's declared order.

#![deny(unsafe_code)]

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use rd_core::ids::BranchId;
use rd_core::Round;
use rd_io::IoError;
use rd_pipeline::PipelineOutputs;

pub mod classify;
#[cfg(feature = "render_csv")]
pub mod render_csv;
#[cfg(feature = "render_json")]
pub mod render_json;

pub use classify::{Category, KeywordClassifier, ProductClassifier};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error("csv render error: {0}")]
    Csv(String),

    #[error("classifier returned unlisted category {0:?}")]
    UnknownCategory(String),
}

// ===== Model =====

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportModel {
    pub summary: Summary,
    pub categories: Vec<CategoryTotals>,
    pub pair_totals: Vec<PairRow>,
    pub transfers: Vec<TransferRow>,
    pub shortages: Vec<ShortageRow>,
    pub remaining_surplus: Vec<RemainingRow>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub plan_id: String,
    pub run_id: String,
    pub timestamp_utc: String,
    pub branches: usize,
    pub products: usize,
    pub total_transferred: u64,
    pub total_shortage: u64,
    pub transfer_lines: usize,
    pub shortage_lines: usize,
    pub second_round_units: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryTotals {
    pub category: Category,
    pub transferred: u64,
    pub shortage: u64,
    pub transfer_lines: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PairRow {
    pub from: BranchId,
    pub to: BranchId,
    pub units: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferRow {
    pub from: BranchId,
    pub to: BranchId,
    pub code: String,
    pub product_name: String,
    pub unit: Option<String>,
    pub quantity: u64,
    pub round: Round,
    pub category: Category,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShortageRow {
    pub branch: BranchId,
    pub code: String,
    pub product_name: String,
    pub needed: u64,
    pub received: u64,
    pub remaining: u64,
    pub category: Category,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemainingRow {
    pub branch: BranchId,
    pub code: String,
    pub product_name: String,
    pub original: u64,
    pub withdrawn: u64,
    pub remaining: u64,
}

// ===== API =====

/// Build the report model from a finished run (pure, offline).
pub fn build_model(out: &PipelineOutputs, classifier: &dyn ProductClassifier) -> Result<ReportModel, ReportError> {
    let m = &out.materialized;

    let order = classifier.categories();
    let mut totals: BTreeMap<Category, CategoryTotals> = order
        .iter()
        .map(|c| (c.clone(), CategoryTotals { category: c.clone(), transferred: 0, shortage: 0, transfer_lines: 0 }))
        .collect();

    let mut transfers = Vec::with_capacity(m.transfers.len());
    for t in &m.transfers {
        let category = classifier.classify(&t.product_name);
        let slot = totals
            .get_mut(&category)
            .ok_or_else(|| ReportError::UnknownCategory(category.to_string()))?;
        slot.transferred += t.quantity;
        slot.transfer_lines += 1;
        transfers.push(TransferRow {
            from: t.from.clone(),
            to: t.to.clone(),
            code: t.code.clone(),
            product_name: t.product_name.clone(),
            unit: t.unit.clone(),
            quantity: t.quantity,
            round: t.round,
            category,
        });
    }

    let mut shortages = Vec::with_capacity(m.shortages.len());
    for s in &m.shortages {
        let category = classifier.classify(&s.product_name);
        let slot = totals
            .get_mut(&category)
            .ok_or_else(|| ReportError::UnknownCategory(category.to_string()))?;
        slot.shortage += s.remaining;
        shortages.push(ShortageRow {
            branch: s.branch.clone(),
            code: s.code.clone(),
            product_name: s.product_name.clone(),
            needed: s.needed,
            received: s.received,
            remaining: s.remaining,
            category,
        });
    }

    let remaining_surplus = m
        .remaining_surplus
        .iter()
        .map(|r| RemainingRow {
            branch: r.branch.clone(),
            code: r.code.clone(),
            product_name: r.product_name.clone(),
            original: r.original,
            withdrawn: r.withdrawn,
            remaining: r.remaining,
        })
        .collect();

    let pair_totals = m
        .pair_totals
        .iter()
        .map(|p| PairRow { from: p.from.clone(), to: p.to.clone(), units: p.units })
        .collect();

    let categories = order.iter().filter_map(|c| totals.remove(c)).collect();

    let summary = Summary {
        plan_id: out.plan.id.clone(),
        run_id: out.run_record.id.clone(),
        timestamp_utc: out.run_record.timestamp_utc.clone(),
        branches: out.data.branches().len(),
        products: out.data.product_count(),
        total_transferred: m.total_transferred,
        total_shortage: m.total_shortage,
        transfer_lines: transfers.len(),
        shortage_lines: shortages.len(),
        second_round_units: out.run_record.counts.second_round_units,
    };

    Ok(ReportModel { summary, categories, pair_totals, transfers, shortages, remaining_surplus })
}

impl ReportModel {
    /// Receiving branches that have at least one transfer line, in first-seen order.
    pub fn receivers(&self) -> Vec<&BranchId> {
        let mut seen: Vec<&BranchId> = Vec::new();
        for t in &self.transfers {
            if !seen.contains(&&t.to) {
                seen.push(&t.to);
            }
        }
        seen
    }
}
