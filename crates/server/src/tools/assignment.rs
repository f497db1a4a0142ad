#![forbid(unsafe_code)]

use super::definitions::ASSIGNMENT_OPS;
use super::{render, unknown_op};
use crate::{
    Args, PmServer, ai_store_error, optional_role, request_now, require_stage, require_string,
};
use pm_storage::{AssignRequest, AssignToRequest, ClaimRequest};
use serde_json::{Value, json};

pub(super) fn handle(server: &mut PmServer, args: &Args, op: &str) -> Result<Value, Value> {
    let row = match op {
        "assign" => {
            let request = AssignRequest {
                application_id: require_string(args, "application_id")?,
                stage: require_stage(args, "stage")?,
                review_role: optional_role(args, "review_role")?,
                now_ms: request_now(args)?,
            };
            server.store_mut().assign(request)
        }
        "assign_to" => {
            let request = AssignToRequest {
                application_id: require_string(args, "application_id")?,
                stage: require_stage(args, "stage")?,
                review_role: optional_role(args, "review_role")?,
                officer_id: require_string(args, "officer_id")?,
                now_ms: request_now(args)?,
            };
            server.store_mut().assign_to(request)
        }
        "claim" => {
            let request = ClaimRequest {
                application_id: require_string(args, "application_id")?,
                stage: require_stage(args, "stage")?,
                review_role: optional_role(args, "review_role")?,
                officer_id: require_string(args, "officer_id")?,
                now_ms: request_now(args)?,
            };
            server.store_mut().claim(request)
        }
        "history" => {
            let application_id = require_string(args, "application_id")?;
            let rows = server
                .store()
                .assignment_history(&application_id)
                .map_err(ai_store_error)?;
            return Ok(json!({ "assignments": render::list(&rows, render::assignment) }));
        }
        _ => return Err(unknown_op("assignment", op, ASSIGNMENT_OPS)),
    };
    let row = row.map_err(ai_store_error)?;
    Ok(json!({ "assignment": render::assignment(&row) }))
}
