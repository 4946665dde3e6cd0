// crates/rd_io/tests/load_manifest.rs
//
// End-to-end loading from a manifest on disk.

use std::fs;
use std::path::Path;

use assert_json_diff::assert_json_eq;
use serde_json::json;

use rd_io::canonical_json::to_canonical_bytes;
use rd_io::loader::{load_all_from_manifest, load_from_paths};
use rd_io::IoError;

const HEADER: &str = "code,product_name,unit,balance,needed_quantity,surplus_quantity,avg_sales\n";

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

#[test]
fn manifest_loads_mixed_formats_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "north.csv", &format!("{HEADER}P1,Paracetamol tablet,box,5,8,0,3\nP2,Cough syrup,,40,0,12,1\n"));
    write(
        dir.path(),
        "wh.json",
        r#"[{"code":"P1","product_name":"Paracetamol tablet","balance":100,"needed_quantity":0,"surplus_quantity":60,"avg_sales":0},
            {"code":"P2","product_name":"Cough syrup","balance":9,"needed_quantity":2,"surplus_quantity":0,"avg_sales":0}]"#,
    );
    write(dir.path(), "params.json", r#"{"balance_limit": 25}"#);
    write(
        dir.path(),
        "run.json",
        r#"{"id":"weekly","branches":[{"id":"north","path":"north.csv"},{"id":"wh","path":"wh.json"}],
            "params_path":"params.json"}"#,
    );

    let ctx = load_all_from_manifest(&dir.path().join("run.json")).unwrap();
    let ids: Vec<&str> = ctx.branches.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["north", "wh"]);
    assert_eq!(ctx.manifest_id.as_deref(), Some("weekly"));
    assert_eq!(ctx.params.balance_limit, 25.0);
    assert_eq!(ctx.branches[1].rows[0].surplus_quantity, 60.0);
    assert_eq!(ctx.input_digests().len(), 2);
    assert_eq!(ctx.params_sha256.len(), 64);
}

#[test]
fn missing_columns_abort_before_anything_else() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.csv", "code,product_name,balance,avg_sales\nP1,x,1,1\n");
    let err = load_from_paths(&[("a".parse().unwrap(), dir.path().join("a.csv"))], None).unwrap_err();
    match err {
        IoError::MissingColumns { branch, path, columns } => {
            assert_eq!(branch, "a");
            assert!(path.ends_with("a.csv"));
            assert_eq!(columns, vec!["needed_quantity", "surplus_quantity"]);
        }
        other => panic!("unexpected: {other}"),
    }
}

#[test]
fn misaligned_tables_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.csv", &format!("{HEADER}P1,x,,1,1,0,1\nP2,y,,1,1,0,1\n"));
    write(dir.path(), "b.csv", &format!("{HEADER}P2,y,,1,1,0,1\nP1,x,,1,1,0,1\n"));
    let err = load_from_paths(
        &[("a".parse().unwrap(), dir.path().join("a.csv")), ("b".parse().unwrap(), dir.path().join("b.csv"))],
        None,
    )
    .unwrap_err();
    assert!(matches!(err, IoError::Misaligned(_)), "{err}");
}

#[test]
fn params_serialize_canonically() {
    let p = rd_core::Params::default();
    let v: serde_json::Value = serde_json::from_slice(&to_canonical_bytes(&p).unwrap()).unwrap();
    assert_json_eq!(
        v,
        json!({
            "balance_limit": 30.0,
            "weights": {"activity": 0.1, "need": 0.3, "inverse_balance": 0.6},
            "inverse_balance_epsilon": 0.1,
            "donor_order": "surplus_desc",
            "branch_priority": [],
            "second_round": true
        })
    );
}
