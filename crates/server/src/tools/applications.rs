#![forbid(unsafe_code)]

use super::definitions::APPLICATIONS_OPS;
use super::{render, unknown_op};
use crate::{
    Args, PmServer, ai_store_error, request_now, require_position, require_string,
};
use pm_storage::{
    ApplicationCreateRequest, ApplicationResubmitRequest, ApplicationSubmitRequest,
    StageEntryResult,
};
use serde_json::{Value, json};

pub(super) fn handle(server: &mut PmServer, args: &Args, op: &str) -> Result<Value, Value> {
    match op {
        "create" => {
            let request = ApplicationCreateRequest {
                application_id: require_string(args, "application_id")?,
                position_type: require_position(args, "position_type")?,
                applicant_name: require_string(args, "applicant_name")?,
                now_ms: request_now(args)?,
            };
            let row = server
                .store_mut()
                .create_application(request)
                .map_err(ai_store_error)?;
            Ok(json!({ "application": render::application(&row) }))
        }
        "submit" => {
            let request = ApplicationSubmitRequest {
                application_id: require_string(args, "application_id")?,
                now_ms: request_now(args)?,
            };
            let entered = server
                .store_mut()
                .submit_application(request)
                .map_err(ai_store_error)?;
            Ok(stage_entry(&entered))
        }
        "resubmit" => {
            let request = ApplicationResubmitRequest {
                application_id: require_string(args, "application_id")?,
                now_ms: request_now(args)?,
            };
            let entered = server
                .store_mut()
                .resubmit_application(request)
                .map_err(ai_store_error)?;
            Ok(stage_entry(&entered))
        }
        "get" => {
            let application_id = require_string(args, "application_id")?;
            let row = server
                .store()
                .get_application(&application_id)
                .map_err(ai_store_error)?;
            Ok(json!({ "application": render::application(&row) }))
        }
        _ => Err(unknown_op("applications", op, APPLICATIONS_OPS)),
    }
}

fn stage_entry(entered: &StageEntryResult) -> Value {
    json!({
        "application": render::application(&entered.application),
        "assignments": render::slot_assignments(&entered.assignments),
    })
}
