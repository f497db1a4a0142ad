#![forbid(unsafe_code)]

use super::definitions::REPORT_OPS;
use super::{render, unknown_op};
use crate::{
    Args, PmServer, ai_error, ai_store_error, optional_i64, optional_string, optional_usize,
    request_now,
};
use serde_json::{Value, json};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DEFAULT_DELAY_HOURS: i64 = 48;

pub(super) fn handle(server: &mut PmServer, args: &Args, op: &str) -> Result<Value, Value> {
    let store = server.store();
    match op {
        "stage_counts" => {
            let rows = store.report_stage_counts().map_err(ai_store_error)?;
            Ok(json!({ "stages": render::list(&rows, render::stage_count) }))
        }
        "outcome_counts" => {
            let rows = store.report_outcome_counts().map_err(ai_store_error)?;
            Ok(json!({ "stages": render::list(&rows, render::outcome_count) }))
        }
        "officer_workload" => {
            let rows = store.report_officer_workload().map_err(ai_store_error)?;
            Ok(json!({ "officers": render::list(&rows, render::workload) }))
        }
        "delayed" => {
            let now_ms = request_now(args)?;
            let older_than_ms = older_than_ms(args)?;
            let rows = store
                .delayed_slots(now_ms, older_than_ms)
                .map_err(ai_store_error)?;
            Ok(json!({
                "older_than_ms": older_than_ms,
                "slots": render::list(&rows, render::open_slot),
            }))
        }
        "escalation_due" => {
            let now_ms = request_now(args)?;
            let rows = store.escalation_due(now_ms).map_err(ai_store_error)?;
            Ok(json!({ "due": render::list(&rows, render::escalation) }))
        }
        "events" => {
            let application_id = optional_string(args, "application_id")?;
            let since = optional_string(args, "since")?;
            let limit = optional_usize(args, "limit")?;
            let rows = store
                .list_events(application_id.as_deref(), since.as_deref(), limit)
                .map_err(ai_store_error)?;
            let next_since = rows.last().map(|row| row.event_id());
            Ok(json!({
                "events": render::list(&rows, render::event),
                "next_since": next_since,
            }))
        }
        _ => Err(unknown_op("report", op, REPORT_OPS)),
    }
}

/// `older_than_ms` wins over `older_than_hours`; two days when neither is given.
fn older_than_ms(args: &Args) -> Result<i64, Value> {
    if let Some(ms) = optional_i64(args, "older_than_ms")? {
        return Ok(ms);
    }
    let hours = optional_i64(args, "older_than_hours")?.unwrap_or(DEFAULT_DELAY_HOURS);
    hours
        .checked_mul(HOUR_MS)
        .ok_or_else(|| ai_error("INVALID_INPUT", "older_than_hours is too large"))
}
