// crates/rd_pipeline/tests/pipeline.rs
//
// Whole-pipeline runs over tables written to a temp dir.

use std::fs;
use std::path::Path;

use assert_json_diff::assert_json_include;
use serde_json::json;

use rd_core::{BranchData, BranchId, Params, ProductRow, Round, WithdrawalLedger};
use rd_io::loader::load_all_from_manifest;
use rd_pipeline::allocate::allocate_first_round;
use rd_pipeline::redistribute::run_second_round;
use rd_pipeline::{run_from_manifest, run_with_ctx, PipelineCtx, PipelineError};

const HEADER: &str = "code,product_name,unit,balance,needed_quantity,surplus_quantity,avg_sales\n";

fn fixture(dir: &Path, north_p1_avg: &str) {
    fs::write(
        dir.join("north.csv"),
        format!("{HEADER}P1,Paracetamol tablet,box,5,8,0,{north_p1_avg}\nP2,Cough syrup,bottle,40,0,12,1\n"),
    )
    .unwrap();
    fs::write(
        dir.join("wh.csv"),
        format!("{HEADER}P1,Paracetamol tablet,box,100,0,60,0\nP2,Cough syrup,bottle,9,2,0,0\n"),
    )
    .unwrap();
    fs::write(
        dir.join("run.json"),
        r#"{"id":"weekly","branches":[{"id":"north","path":"north.csv"},{"id":"wh","path":"wh.csv"}]}"#,
    )
    .unwrap();
}

fn pinned(dir: &Path) -> PipelineCtx {
    let mut ctx = PipelineCtx::new(load_all_from_manifest(&dir.join("run.json")).unwrap());
    ctx.timestamp_utc = Some("2024-05-06T07:08:09Z".into());
    ctx
}

#[test]
fn two_branch_swap() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "3");

    let out = run_from_manifest(dir.path().join("run.json")).unwrap();
    assert!(out.validation.pass);
    assert_eq!(out.materialized.total_transferred, 10);
    assert_eq!(out.materialized.total_shortage, 0);
    assert_eq!(out.plan.entries.len(), 4);
    assert_eq!(out.run_record.counts.first_round_units, 10);
    assert_eq!(out.run_record.counts.second_round_records, 0);
    assert_eq!(out.run_record.manifest_id.as_deref(), Some("weekly"));

    let plan = serde_json::to_value(&out.plan).unwrap();
    assert_json_include!(
        actual: plan,
        expected: json!({
            "branches": ["north", "wh"],
            "product_count": 2,
            "totals": {"transferred": 10, "shortage": 0, "transfers": 2}
        })
    );
    let first = serde_json::to_value(&out.plan.entries[0]).unwrap();
    assert_json_include!(
        actual: first,
        expected: json!({
            "branch": "north",
            "product": 0,
            "code": "P1",
            "records": [{
                "surplus_from_branch": 8,
                "available_branch": "wh",
                "surplus_remaining": 52,
                "remaining_needed": 0,
                "round": "first"
            }]
        })
    );
}

#[test]
fn pinned_clock_gives_identical_ids() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "3");
    let a = run_with_ctx(pinned(dir.path())).unwrap();
    let b = run_with_ctx(pinned(dir.path())).unwrap();
    assert_eq!(a.plan.id, b.plan.id);
    assert_eq!(a.run_record.id, b.run_record.id);
    assert!(a.run_record.id.starts_with("RUN:2024-05-06T07:08:09Z-"));
    assert_eq!(a.run_record.outputs.plan_id, a.plan.id);
    assert_eq!(a.run_record.inputs.len(), 2);
}

#[test]
fn validation_errors_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "-2");
    match run_with_ctx(pinned(dir.path())) {
        Err(PipelineError::Validate(report)) => {
            assert_eq!(report.error_count(), 1);
            assert_eq!(report.issues[0].code, "Row.NegativeAvgSales");
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn scarce_shortage_with_second_round_off() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.csv"),
        format!("{HEADER}P1,Insulin pen,,0,5,0,1\n"),
    )
    .unwrap();
    fs::write(dir.path().join("d.csv"), format!("{HEADER}P1,Insulin pen,,0,0,3,0\n")).unwrap();
    fs::write(
        dir.path().join("run.json"),
        r#"{"branches":[{"id":"a","path":"a.csv"},{"id":"d","path":"d.csv"}]}"#,
    )
    .unwrap();

    let mut ctx = pinned(dir.path());
    ctx.loaded.params.second_round = false;
    let out = run_with_ctx(ctx).unwrap();
    assert_eq!(out.materialized.total_transferred, 3);
    assert_eq!(out.materialized.total_shortage, 2);
    assert_eq!(out.materialized.shortages[0].branch.as_str(), "a");
    assert_eq!(out.run_record.counts.second_round_units, 0);
    assert!(!out.run_record.params.second_round);
}

fn b(s: &str) -> BranchId {
    s.parse().unwrap()
}

fn insulin(balance: f64, needed: f64, surplus: f64) -> ProductRow {
    ProductRow {
        code: "P1".into(),
        product_name: "Insulin vial".into(),
        unit: None,
        avg_sales: 1.0,
        balance,
        needed_quantity: needed,
        surplus_quantity: surplus,
    }
}

// 12 units for 20 needed. Entitlements are a=3, c=8, so one unit is left on
// d after round 1; round 2 hands it to c (lowest current balance).
fn stranded_unit() -> BranchData {
    BranchData::new(vec![
        (b("a"), vec![insulin(25.0, 10.0, 0.0)]),
        (b("c"), vec![insulin(0.0, 10.0, 0.0)]),
        (b("d"), vec![insulin(0.0, 0.0, 12.0)]),
    ])
    .unwrap()
}

#[test]
fn second_round_picks_up_what_entitlements_left() {
    let data = stranded_unit();
    let params = Params::default();
    let mut ledger = WithdrawalLedger::new();

    let first = allocate_first_round(&data, &params, &mut ledger).unwrap();
    assert_eq!(first.allocations[&0][&b("a")], 3);
    assert_eq!(first.allocations[&0][&b("c")], 8);
    assert_eq!(first.stats.units, 11);
    assert_eq!(ledger.withdrawn(&b("d"), 0), 11.0);

    let mut plan = first.plan;
    let second = run_second_round(&data, &params, &mut plan, &mut ledger).unwrap();
    assert_eq!((second.records, second.units), (1, 1));

    let trail = plan.records(&b("c"), 0);
    let rounds: Vec<Round> = trail.iter().map(|r| r.round).collect();
    assert_eq!(rounds, vec![Round::First, Round::Second]);
    let remaining: Vec<u64> = trail.iter().map(|r| r.remaining_needed).collect();
    assert_eq!(remaining, vec![2, 1]);
    assert!(remaining.windows(2).all(|w| w[1] < w[0]));
    assert_eq!(trail[1].available_branch.as_ref(), Some(&b("d")));
    assert_eq!(trail[1].surplus_remaining, 0);

    // a sits at 28 after round 1 and gets nothing more: the donor is empty.
    assert_eq!(plan.transferred(&b("a"), 0), 3);
    assert!(plan.records(&b("a"), 0).iter().all(|r| r.round == Round::First));

    let from_d: u64 = plan
        .iter()
        .flat_map(|(_, _, records)| records)
        .filter(|r| r.available_branch.as_ref() == Some(&b("d")))
        .map(|r| r.surplus_from_branch)
        .sum();
    assert_eq!(from_d, 12);
    assert_eq!(ledger.withdrawn(&b("d"), 0), 12.0);
}

#[test]
fn full_run_counts_both_rounds() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.csv"), format!("{HEADER}P1,Insulin vial,,25,10,0,1\n")).unwrap();
    fs::write(dir.path().join("c.csv"), format!("{HEADER}P1,Insulin vial,,0,10,0,1\n")).unwrap();
    fs::write(dir.path().join("d.csv"), format!("{HEADER}P1,Insulin vial,,0,0,12,1\n")).unwrap();
    fs::write(
        dir.path().join("run.json"),
        r#"{"branches":[{"id":"a","path":"a.csv"},{"id":"c","path":"c.csv"},{"id":"d","path":"d.csv"}]}"#,
    )
    .unwrap();

    let out = run_with_ctx(pinned(dir.path())).unwrap();
    let counts = &out.run_record.counts;
    assert_eq!((counts.first_round_units, counts.second_round_records, counts.second_round_units), (11, 1, 1));
    assert_eq!(out.materialized.total_transferred, 12);
    assert_eq!(out.materialized.total_shortage, 8);
    assert!(out.materialized.remaining_surplus.iter().all(|r| r.remaining == 0));
}
