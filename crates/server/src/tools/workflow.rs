#![forbid(unsafe_code)]

use super::definitions::WORKFLOW_OPS;
use super::{render, unknown_op};
use crate::{
    Args, PmServer, ai_store_error, optional_role, optional_string, request_now,
    require_decision, require_stage, require_string,
};
use pm_storage::TransitionRequest;
use serde_json::{Value, json};

pub(super) fn handle(server: &mut PmServer, args: &Args, op: &str) -> Result<Value, Value> {
    match op {
        "transition" => {
            let request = TransitionRequest {
                application_id: require_string(args, "application_id")?,
                stage: require_stage(args, "stage")?,
                review_role: optional_role(args, "review_role")?,
                decision: require_decision(args, "decision")?,
                officer_id: require_string(args, "officer_id")?,
                comments: optional_string(args, "comments")?,
                now_ms: request_now(args)?,
            };
            let result = server
                .store_mut()
                .transition(request)
                .map_err(ai_store_error)?;
            Ok(json!({
                "outcome": render::outcome(&result.outcome),
                "application": render::application(&result.application),
                "stage_advanced": result.stage_advanced,
                "assignments": render::slot_assignments(&result.assignments),
            }))
        }
        "status" => {
            let application_id = require_string(args, "application_id")?;
            let status = server
                .store()
                .workflow_status(&application_id)
                .map_err(ai_store_error)?;
            Ok(json!({
                "application": render::application(&status.application),
                "progress_percent": status.progress_percent,
                "pending_action": status.pending_action,
                "slots": render::list(&status.slots, render::slot_status),
            }))
        }
        "history" => {
            let application_id = require_string(args, "application_id")?;
            let history = server
                .store()
                .stage_history(&application_id)
                .map_err(ai_store_error)?;
            Ok(json!({
                "application": render::application(&history.application),
                "outcomes": render::list(&history.outcomes, render::outcome),
                "assignments": render::list(&history.assignments, render::assignment),
                "appointments": render::list(&history.appointments, render::appointment),
                "signatures": render::list(&history.signatures, render::signature),
            }))
        }
        _ => Err(unknown_op("workflow", op, WORKFLOW_OPS)),
    }
}
