#![forbid(unsafe_code)]

use super::definitions::APPOINTMENT_OPS;
use super::{render, unknown_op};
use crate::{
    Args, PmServer, ai_store_error, optional_string, request_now, require_i64, require_string,
    require_ts,
};
use pm_storage::{
    AppointmentCancelRequest, AppointmentCompleteRequest, AppointmentRescheduleRequest,
    AppointmentScheduleRequest,
};
use serde_json::{Value, json};

pub(super) fn handle(server: &mut PmServer, args: &Args, op: &str) -> Result<Value, Value> {
    let row = match op {
        "schedule" => {
            let request = AppointmentScheduleRequest {
                application_id: require_string(args, "application_id")?,
                officer_id: require_string(args, "officer_id")?,
                scheduled_at_ms: require_ts(args, "scheduled_at")?,
                place: require_string(args, "place")?,
                now_ms: request_now(args)?,
            };
            server.store_mut().appointment_schedule(request)
        }
        "confirm" => {
            let appointment_id = require_i64(args, "appointment_id")?;
            let now_ms = request_now(args)?;
            server.store_mut().appointment_confirm(appointment_id, now_ms)
        }
        "complete" => {
            let request = AppointmentCompleteRequest {
                appointment_id: require_i64(args, "appointment_id")?,
                notes: optional_string(args, "notes")?,
                now_ms: request_now(args)?,
            };
            server.store_mut().appointment_complete(request)
        }
        "cancel" => {
            let request = AppointmentCancelRequest {
                appointment_id: require_i64(args, "appointment_id")?,
                reason: require_string(args, "reason")?,
                now_ms: request_now(args)?,
            };
            server.store_mut().appointment_cancel(request)
        }
        "reschedule" => {
            let request = AppointmentRescheduleRequest {
                appointment_id: require_i64(args, "appointment_id")?,
                scheduled_at_ms: require_ts(args, "scheduled_at")?,
                place: optional_string(args, "place")?,
                now_ms: request_now(args)?,
            };
            let moved = server
                .store_mut()
                .appointment_reschedule(request)
                .map_err(ai_store_error)?;
            return Ok(json!({
                "previous": render::appointment(&moved.previous),
                "appointment": render::appointment(&moved.appointment),
            }));
        }
        "reminder_sent" => {
            let appointment_id = require_i64(args, "appointment_id")?;
            let now_ms = request_now(args)?;
            server
                .store_mut()
                .appointment_mark_reminder_sent(appointment_id, now_ms)
        }
        "get" => {
            let appointment_id = require_i64(args, "appointment_id")?;
            server.store().appointment_get(appointment_id)
        }
        "list" => {
            let application_id = require_string(args, "application_id")?;
            let rows = server
                .store()
                .appointments_for(&application_id)
                .map_err(ai_store_error)?;
            return Ok(json!({ "appointments": render::list(&rows, render::appointment) }));
        }
        _ => return Err(unknown_op("appointment", op, APPOINTMENT_OPS)),
    };
    let row = row.map_err(ai_store_error)?;
    Ok(json!({ "appointment": render::appointment(&row) }))
}
