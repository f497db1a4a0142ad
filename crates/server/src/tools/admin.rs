#![forbid(unsafe_code)]

use super::definitions::ADMIN_OPS;
use super::{render, unknown_op};
use crate::{
    Args, PmServer, ai_store_error, optional_bool, optional_i64, optional_position,
    optional_role, request_now, require_i64, require_position, require_role, require_strategy,
    require_string,
};
use pm_storage::{OfficerUpsertRequest, OfficersListRequest, RuleUpsertRequest};
use serde_json::{Value, json};

pub(super) fn handle(server: &mut PmServer, args: &Args, op: &str) -> Result<Value, Value> {
    match op {
        "officer_upsert" => {
            let request = OfficerUpsertRequest {
                officer_id: require_string(args, "officer_id")?,
                name: require_string(args, "name")?,
                role: require_role(args, "role")?,
                now_ms: request_now(args)?,
            };
            let row = server
                .store_mut()
                .officer_upsert(request)
                .map_err(ai_store_error)?;
            Ok(json!({ "officer": render::officer(&row) }))
        }
        "officer_deactivate" => {
            let officer_id = require_string(args, "officer_id")?;
            let now_ms = request_now(args)?;
            let row = server
                .store_mut()
                .officer_deactivate(&officer_id, now_ms)
                .map_err(ai_store_error)?;
            Ok(json!({ "officer": render::officer(&row) }))
        }
        "officer_list" => {
            let request = OfficersListRequest {
                role: optional_role(args, "role")?,
                include_inactive: optional_bool(args, "include_inactive")?.unwrap_or(false),
            };
            let rows = server
                .store()
                .officer_list(request)
                .map_err(ai_store_error)?;
            Ok(json!({ "officers": render::list(&rows, render::officer) }))
        }
        "rule_upsert" => {
            let request = RuleUpsertRequest {
                rule_id: optional_i64(args, "rule_id")?,
                position_type: require_position(args, "position_type")?,
                target_role: require_role(args, "target_role")?,
                strategy: require_strategy(args, "strategy")?,
                max_workload_per_officer: optional_i64(args, "max_workload_per_officer")?
                    .unwrap_or(0),
                priority: optional_i64(args, "priority")?.unwrap_or(0),
                escalation_time_hours: optional_i64(args, "escalation_time_hours")?,
                escalation_role: optional_role(args, "escalation_role")?,
                now_ms: request_now(args)?,
            };
            let row = server
                .store_mut()
                .rule_upsert(request)
                .map_err(ai_store_error)?;
            Ok(json!({ "rule": render::rule(&row) }))
        }
        "rule_deactivate" => {
            let rule_id = require_i64(args, "rule_id")?;
            let now_ms = request_now(args)?;
            let row = server
                .store_mut()
                .rule_deactivate(rule_id, now_ms)
                .map_err(ai_store_error)?;
            Ok(json!({ "rule": render::rule(&row) }))
        }
        "rule_list" => {
            let position_type = optional_position(args, "position_type")?;
            let rows = server
                .store()
                .rule_list(position_type)
                .map_err(ai_store_error)?;
            Ok(json!({ "rules": render::list(&rows, render::rule) }))
        }
        _ => Err(unknown_op("admin", op, ADMIN_OPS)),
    }
}
