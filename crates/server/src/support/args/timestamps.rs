#![forbid(unsafe_code)]

use super::super::ai::ai_error;
use super::super::time::{now_ms_i64, parse_ts_ms};
use super::Args;
use serde_json::Value;

pub(crate) fn optional_ts(args: &Args, key: &str) -> Result<Option<i64>, Value> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_ts_ms(value).map(Some).ok_or_else(|| {
            ai_error(
                "INVALID_INPUT",
                &format!("{key} must be epoch milliseconds or an RFC 3339 timestamp"),
            )
        }),
    }
}

pub(crate) fn require_ts(args: &Args, key: &str) -> Result<i64, Value> {
    optional_ts(args, key)?
        .ok_or_else(|| ai_error("INVALID_INPUT", &format!("{key} is required")))
}

/// 9999-12-31T23:59:59.999Z
const MAX_REQUEST_TS_MS: i64 = 253_402_300_799_999;

/// The request clock: `now` when the caller pins it, the wall clock otherwise.
pub(crate) fn request_now(args: &Args) -> Result<i64, Value> {
    match optional_ts(args, "now")? {
        None => Ok(now_ms_i64()),
        Some(ms) if (0..=MAX_REQUEST_TS_MS).contains(&ms) => Ok(ms),
        Some(_) => Err(ai_error(
            "INVALID_INPUT",
            "now must fall between 1970-01-01 and 9999-12-31",
        )),
    }
}
