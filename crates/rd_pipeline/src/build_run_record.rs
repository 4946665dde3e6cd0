//! crates/rd_pipeline/src/build_run_record.rs
//! RunRecord assembly: engine identity, input digests, params echo, plan
//! reference and counts. `RUN:<ts>-<sha256>` hashes every field except `id`.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use rd_core::Params;
use rd_io::{canonical_json, hasher};

use crate::build_plan::PlanDoc;
use crate::{EngineMeta, PipelineError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamsEcho {
    pub sha256: String,
    pub balance_limit: f64,
    pub donor_order: String,
    pub second_round: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutputs {
    pub plan_id: String,
    pub plan_sha256: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub branches: usize,
    pub products: usize,
    pub scarce_products: usize,
    pub first_round_withdrawals: u64,
    pub first_round_units: u64,
    pub second_round_records: u64,
    pub second_round_units: u64,
    pub shortage_units: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecordDoc {
    pub id: String,
    pub timestamp_utc: String,
    pub engine: EngineMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_id: Option<String>,
    pub params: ParamsEcho,
    /// Branch id → SHA-256 of the raw table bytes.
    pub inputs: BTreeMap<String, String>,
    pub outputs: RunOutputs,
    pub counts: RunCounts,
}

#[derive(Serialize)]
struct RunBody<'a> {
    timestamp_utc: &'a str,
    engine: &'a EngineMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest_id: Option<&'a str>,
    params: &'a ParamsEcho,
    inputs: &'a BTreeMap<String, String>,
    outputs: &'a RunOutputs,
    counts: &'a RunCounts,
}

pub struct RunRecordInputs<'a> {
    pub engine: &'a EngineMeta,
    pub timestamp_utc: Option<&'a str>,
    pub manifest_id: Option<&'a str>,
    pub params: &'a Params,
    pub params_sha256: &'a str,
    pub input_digests: BTreeMap<String, String>,
    pub counts: RunCounts,
}

pub fn build_run_record(inp: RunRecordInputs<'_>, plan: &PlanDoc) -> Result<RunRecordDoc, PipelineError> {
    let timestamp_utc = match inp.timestamp_utc {
        Some(ts) => hasher::normalize_timestamp(ts)?,
        None => now_utc(),
    };

    let params = ParamsEcho {
        sha256: inp.params_sha256.to_string(),
        balance_limit: inp.params.balance_limit,
        donor_order: inp.params.donor_order.as_str().to_string(),
        second_round: inp.params.second_round,
    };

    let plan_bytes = canonical_json::to_canonical_bytes(plan)?;
    let outputs = RunOutputs { plan_id: plan.id.clone(), plan_sha256: hasher::sha256_hex(&plan_bytes) };

    let body = RunBody {
        timestamp_utc: &timestamp_utc,
        engine: inp.engine,
        manifest_id: inp.manifest_id,
        params: &params,
        inputs: &inp.input_digests,
        outputs: &outputs,
        counts: &inp.counts,
    };
    let id = hasher::run_id_from_canonical(&timestamp_utc, &body)?;

    Ok(RunRecordDoc {
        id,
        timestamp_utc,
        engine: inp.engine.clone(),
        manifest_id: inp.manifest_id.map(str::to_string),
        params,
        inputs: inp.input_digests,
        outputs,
        counts: inp.counts,
    })
}

fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_plan::PlanTotals;

    fn plan() -> PlanDoc {
        PlanDoc {
            id: "PLAN:0".into(),
            branches: vec![],
            product_count: 0,
            entries: vec![],
            ledger: vec![],
            totals: PlanTotals { transferred: 0, shortage: 0, transfers: 0 },
        }
    }

    fn inputs<'a>(engine: &'a EngineMeta, params: &'a Params, ts: Option<&'a str>) -> RunRecordInputs<'a> {
        RunRecordInputs {
            engine,
            timestamp_utc: ts,
            manifest_id: Some("weekly"),
            params,
            params_sha256: "ab",
            input_digests: BTreeMap::from([("north".to_string(), "cd".to_string())]),
            counts: RunCounts::default(),
        }
    }

    #[test]
    fn fixed_timestamp_gives_fixed_id() {
        let engine = EngineMeta::current();
        let params = Params::default();
        let a = build_run_record(inputs(&engine, &params, Some("2024-03-01T10:00:00+02:00")), &plan()).unwrap();
        let b = build_run_record(inputs(&engine, &params, Some("2024-03-01T08:00:00Z")), &plan()).unwrap();
        assert_eq!(a.timestamp_utc, "2024-03-01T08:00:00Z");
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("RUN:2024-03-01T08:00:00Z-"));
        assert_eq!(a.params.donor_order, "surplus_desc");
        assert_eq!(a.outputs.plan_id, "PLAN:0");
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let engine = EngineMeta::current();
        let params = Params::default();
        assert!(build_run_record(inputs(&engine, &params, Some("yesterday")), &plan()).is_err());
    }
}
