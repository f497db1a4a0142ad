#![forbid(unsafe_code)]

use super::super::ai::ai_error;
use super::Args;
use pm_core::{AssignmentStrategy, Decision, OfficerRole, PositionType, Stage};
use serde_json::Value;

fn optional_enum<T>(
    args: &Args,
    key: &str,
    parse: fn(&str) -> Option<T>,
    allowed: &[&str],
) -> Result<Option<T>, Value> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    let raw = match value {
        Value::Null => return Ok(None),
        Value::String(raw) => raw.trim(),
        _ => {
            return Err(ai_error(
                "INVALID_INPUT",
                &format!("{key} must be a string"),
            ));
        }
    };
    parse(raw).map(Some).ok_or_else(|| {
        ai_error(
            "INVALID_INPUT",
            &format!("{key} must be one of: {}", allowed.join("|")),
        )
    })
}

fn required<T>(key: &str, value: Option<T>) -> Result<T, Value> {
    value.ok_or_else(|| ai_error("INVALID_INPUT", &format!("{key} is required")))
}

fn labels<T: Copy>(all: &[T], as_str: fn(T) -> &'static str) -> Vec<&'static str> {
    all.iter().copied().map(as_str).collect()
}

pub(crate) fn optional_stage(args: &Args, key: &str) -> Result<Option<Stage>, Value> {
    optional_enum(args, key, Stage::parse, &labels(&Stage::ALL, Stage::as_str))
}

pub(crate) fn require_stage(args: &Args, key: &str) -> Result<Stage, Value> {
    required(key, optional_stage(args, key)?)
}

pub(crate) fn optional_role(args: &Args, key: &str) -> Result<Option<OfficerRole>, Value> {
    optional_enum(
        args,
        key,
        OfficerRole::parse,
        &labels(&OfficerRole::ALL, OfficerRole::as_str),
    )
}

pub(crate) fn require_role(args: &Args, key: &str) -> Result<OfficerRole, Value> {
    required(key, optional_role(args, key)?)
}

pub(crate) fn optional_position(args: &Args, key: &str) -> Result<Option<PositionType>, Value> {
    optional_enum(
        args,
        key,
        PositionType::parse,
        &labels(&PositionType::ALL, PositionType::as_str),
    )
}

pub(crate) fn require_position(args: &Args, key: &str) -> Result<PositionType, Value> {
    required(key, optional_position(args, key)?)
}

pub(crate) fn require_decision(args: &Args, key: &str) -> Result<Decision, Value> {
    let value = optional_enum(args, key, Decision::parse, &["approved", "rejected"])?;
    required(key, value)
}

pub(crate) fn require_strategy(args: &Args, key: &str) -> Result<AssignmentStrategy, Value> {
    let value = optional_enum(
        args,
        key,
        AssignmentStrategy::parse,
        &["round_robin", "least_workload", "manual"],
    )?;
    required(key, value)
}
