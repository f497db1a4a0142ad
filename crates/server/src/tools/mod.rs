#![forbid(unsafe_code)]

mod admin;
mod applications;
mod appointment;
mod assignment;
mod definitions;
mod render;
mod report;
mod signature;
mod workflow;

pub(crate) use definitions::tool_definitions;

use crate::{Args, PmServer, ai_error, ai_ok, args_object, require_string};
use serde_json::Value;

type OpHandler = fn(&mut PmServer, &Args, &str) -> Result<Value, Value>;

pub(crate) fn dispatch_tool(server: &mut PmServer, name: &str, args: Value) -> Option<Value> {
    let handler: OpHandler = match name {
        "applications" => applications::handle,
        "workflow" => workflow::handle,
        "assignment" => assignment::handle,
        "appointment" => appointment::handle,
        "signature" => signature::handle,
        "admin" => admin::handle,
        "report" => report::handle,
        _ => return None,
    };
    let resp = args_object(args).and_then(|args| {
        let op = require_string(&args, "op")?;
        handler(server, &args, op.trim())
    });
    Some(match resp {
        Ok(result) => ai_ok(result),
        Err(err) => err,
    })
}

fn unknown_op(tool: &str, op: &str, ops: &[&str]) -> Value {
    ai_error(
        "UNKNOWN_OP",
        &format!("{tool} has no op {op:?}; use one of: {}", ops.join(", ")),
    )
}
