#![forbid(unsafe_code)]

use super::super::ai::ai_error;
use super::Args;
use serde_json::Value;

pub(crate) fn optional_i64(args: &Args, key: &str) -> Result<Option<i64>, Value> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| ai_error("INVALID_INPUT", &format!("{key} must be an integer"))),
        _ => Err(ai_error(
            "INVALID_INPUT",
            &format!("{key} must be an integer"),
        )),
    }
}

pub(crate) fn require_i64(args: &Args, key: &str) -> Result<i64, Value> {
    optional_i64(args, key)?
        .ok_or_else(|| ai_error("INVALID_INPUT", &format!("{key} is required")))
}

pub(crate) fn optional_usize(args: &Args, key: &str) -> Result<Option<usize>, Value> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| {
                ai_error(
                    "INVALID_INPUT",
                    &format!("{key} must be a positive integer"),
                )
            }),
        _ => Err(ai_error(
            "INVALID_INPUT",
            &format!("{key} must be a positive integer"),
        )),
    }
}

pub(crate) fn optional_bool(args: &Args, key: &str) -> Result<Option<bool>, Value> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::Bool(v) => Ok(Some(*v)),
        _ => Err(ai_error(
            "INVALID_INPUT",
            &format!("{key} must be a boolean"),
        )),
    }
}
