//! crates/rd_pipeline/src/validate.rs
//! Structural & semantic validation of loaded branch tables before any
//! allocation. Deterministic output; issues are sorted stably.

use std::collections::BTreeSet;

use serde::Serialize;

use rd_core::ids::{BranchId, ProductIndex};
use rd_io::loader::LoadedContext;

/// Issue severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Where the issue occurred.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityRef {
    Root,
    Branch { branch: BranchId },
    Row { branch: BranchId, product: ProductIndex, code: String },
    Param { name: &'static str },
}

/// One validation finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    #[serde(rename = "where")]
    pub where_: EntityRef,
}

/// Deterministic report: pass = no Error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub pass: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

/// Top-level entry point.
pub fn validate(ctx: &LoadedContext) -> ValidationReport {
    let mut issues: Vec<ValidationIssue> = Vec::new();

    issues.extend(check_branch_set(ctx));
    issues.extend(check_priority(ctx));
    for b in &ctx.branches {
        for (product, row) in b.rows.iter().enumerate() {
            let at = || EntityRef::Row { branch: b.id.clone(), product, code: row.code.clone() };

            let values = [
                ("avg_sales", row.avg_sales),
                ("balance", row.balance),
                ("needed_quantity", row.needed_quantity),
                ("surplus_quantity", row.surplus_quantity),
            ];
            for (name, v) in values {
                if !v.is_finite() {
                    issues.push(error("Row.NonFinite", format!("{name} is not a finite number"), at()));
                }
            }
            if row.avg_sales < 0.0 {
                issues.push(error("Row.NegativeAvgSales", format!("avg_sales {} < 0", row.avg_sales), at()));
            }
            if row.balance < 0.0 {
                issues.push(warning("Row.NegativeBalance", format!("balance {} < 0", row.balance), at()));
            }
            if row.needed_quantity > 0.0 && row.surplus_quantity > 0.0 {
                issues.push(warning(
                    "Row.NeedAndSurplus",
                    format!("needs {} and holds surplus {}", row.needed_quantity, row.surplus_quantity),
                    at(),
                ));
            }
        }
    }

    sort_issues_stably(&mut issues);
    ValidationReport { pass: !issues.iter().any(|i| i.severity == Severity::Error), issues }
}

// ------------------------------------------------------------------------------------------------
// Checks
// ------------------------------------------------------------------------------------------------

fn check_branch_set(ctx: &LoadedContext) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if ctx.branches.is_empty() {
        issues.push(error("Branch.Empty", "no branches to allocate between".into(), EntityRef::Root));
    }
    let mut seen = BTreeSet::new();
    for b in &ctx.branches {
        if !seen.insert(&b.id) {
            issues.push(error(
                "Branch.Duplicate",
                format!("branch listed more than once ({})", b.path.display()),
                EntityRef::Branch { branch: b.id.clone() },
            ));
        }
    }
    issues
}

fn check_priority(ctx: &LoadedContext) -> Vec<ValidationIssue> {
    let known: BTreeSet<&BranchId> = ctx.branches.iter().map(|b| &b.id).collect();
    let mut issues = Vec::new();
    for p in &ctx.params.branch_priority {
        if !known.contains(p) {
            issues.push(warning(
                "Priority.UnknownBranch",
                format!("branch_priority names unknown branch {p}"),
                EntityRef::Param { name: "branch_priority" },
            ));
        }
    }
    issues
}

// ------------------------------------------------------------------------------------------------
// Utilities
// ------------------------------------------------------------------------------------------------

fn error(code: &'static str, message: String, where_: EntityRef) -> ValidationIssue {
    ValidationIssue { severity: Severity::Error, code, message, where_ }
}

fn warning(code: &'static str, message: String, where_: EntityRef) -> ValidationIssue {
    ValidationIssue { severity: Severity::Warning, code, message, where_ }
}

/// Sort by (code, where, message) for byte-identical runs.
fn sort_issues_stably(issues: &mut [ValidationIssue]) {
    issues.sort_by(|a, b| {
        a.code
            .cmp(b.code)
            .then_with(|| a.where_.cmp(&b.where_))
            .then_with(|| a.message.cmp(&b.message))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rd_core::{Params, ProductRow};
    use rd_io::loader::LoadedBranch;
    use std::path::PathBuf;

    fn row(code: &str, avg: f64, bal: f64, need: f64, sur: f64) -> ProductRow {
        ProductRow {
            code: code.into(),
            product_name: "Saline drops".into(),
            unit: None,
            avg_sales: avg,
            balance: bal,
            needed_quantity: need,
            surplus_quantity: sur,
        }
    }

    fn ctx(branches: Vec<(&str, Vec<ProductRow>)>, params: Params) -> LoadedContext {
        LoadedContext {
            manifest_id: None,
            branches: branches
                .into_iter()
                .map(|(id, rows)| LoadedBranch {
                    id: id.parse().unwrap(),
                    path: PathBuf::from(format!("{id}.csv")),
                    rows,
                    sha256: String::new(),
                })
                .collect(),
            params,
            params_sha256: String::new(),
        }
    }

    #[test]
    fn clean_input_passes() {
        let r = validate(&ctx(vec![("a", vec![row("P1", 1.0, 2.0, 3.0, 0.0)])], Params::default()));
        assert!(r.pass);
        assert!(r.issues.is_empty());
    }

    #[test]
    fn empty_and_duplicate_sets_fail() {
        let r = validate(&ctx(vec![], Params::default()));
        assert!(!r.pass);
        assert_eq!(r.issues[0].code, "Branch.Empty");

        let r = validate(&ctx(vec![("a", vec![]), ("a", vec![])], Params::default()));
        assert_eq!(r.errors().map(|i| i.code).collect::<Vec<_>>(), vec!["Branch.Duplicate"]);
    }

    #[test]
    fn row_checks_and_severities() {
        let rows = vec![
            row("P1", -1.0, 2.0, 0.0, 0.0),
            row("P2", 1.0, -3.0, 0.0, 0.0),
            row("P3", f64::NAN, 0.0, 0.0, 0.0),
            row("P4", 1.0, 0.0, 2.0, 5.0),
        ];
        let r = validate(&ctx(vec![("a", rows)], Params::default()));
        assert!(!r.pass);
        let codes: Vec<(&str, Severity)> = r.issues.iter().map(|i| (i.code, i.severity)).collect();
        assert_eq!(
            codes,
            vec![
                ("Row.NeedAndSurplus", Severity::Warning),
                ("Row.NegativeAvgSales", Severity::Error),
                ("Row.NegativeBalance", Severity::Warning),
                ("Row.NonFinite", Severity::Error),
            ]
        );
    }

    #[test]
    fn unknown_priority_branch_only_warns() {
        let mut p = Params::default();
        p.branch_priority = vec!["ghost".parse().unwrap()];
        let r = validate(&ctx(vec![("a", vec![])], p));
        assert!(r.pass);
        assert_eq!(r.error_count(), 0);
        assert_eq!(r.warnings().next().unwrap().code, "Priority.UnknownBranch");
    }
}
