#![forbid(unsafe_code)]

use crate::ts_ms_to_rfc3339;
use pm_storage::{
    AppointmentRow, ApplicationRow, AssignmentRow, EscalationDueRow, EventRow, OfficerRow,
    OfficerWorkloadRow, OpenSlotRow, OutcomeCountRow, RuleRow, SignatureRow, SlotAssignment,
    SlotStatus, StageCountRow, StageOutcomeRow,
};
use serde_json::{Value, json};

fn ts(ms: i64) -> Value {
    Value::String(ts_ms_to_rfc3339(ms))
}

fn opt_ts(ms: Option<i64>) -> Value {
    ms.map(ts).unwrap_or(Value::Null)
}

pub(super) fn application(row: &ApplicationRow) -> Value {
    json!({
        "application_id": row.application_id,
        "position_type": row.position_type.as_str(),
        "applicant_name": row.applicant_name,
        "current_stage": row.current_stage.as_str(),
        "rejected_at_stage": row.rejected_at_stage.map(|stage| stage.as_str()),
        "attempt": row.attempt,
        "revision": row.revision,
        "progress_percent":
            pm_core::pipeline::progress_percent(row.current_stage, row.rejected_at_stage),
        "created_at_ms": row.created_at_ms,
        "created_at": ts(row.created_at_ms),
        "updated_at_ms": row.updated_at_ms,
        "updated_at": ts(row.updated_at_ms),
    })
}

pub(super) fn assignment(row: &AssignmentRow) -> Value {
    json!({
        "assignment_id": row.assignment_id,
        "application_id": row.application_id,
        "stage": row.stage.as_str(),
        "review_role": row.review_role.as_str(),
        "attempt": row.attempt,
        "officer_id": row.officer_id,
        "previous_officer_id": row.previous_officer_id,
        "strategy_used": row.strategy_used.as_str(),
        "rule_id": row.rule_id,
        "is_active": row.is_active,
        "assigned_at_ms": row.assigned_at_ms,
        "assigned_at": ts(row.assigned_at_ms),
        "superseded_at_ms": row.superseded_at_ms,
    })
}

pub(super) fn slot_assignment(entry: &SlotAssignment) -> Value {
    match entry {
        SlotAssignment::Assigned(row) => json!({
            "status": "assigned",
            "stage": row.stage.as_str(),
            "review_role": row.review_role.as_str(),
            "assignment": assignment(row),
        }),
        SlotAssignment::NeedsManual {
            stage,
            review_role,
            reason,
        } => json!({
            "status": "needs_manual_assignment",
            "stage": stage.as_str(),
            "review_role": review_role.as_str(),
            "reason": reason.as_str(),
        }),
    }
}

pub(super) fn slot_assignments(entries: &[SlotAssignment]) -> Value {
    Value::Array(entries.iter().map(slot_assignment).collect())
}

pub(super) fn outcome(row: &StageOutcomeRow) -> Value {
    json!({
        "seq": row.seq,
        "stage": row.stage.as_str(),
        "review_role": row.review_role.as_str(),
        "attempt": row.attempt,
        "decision": row.decision.as_str(),
        "officer_id": row.officer_id,
        "comments": row.comments,
        "signature_id": row.signature_id,
        "decided_at_ms": row.decided_at_ms,
        "decided_at": ts(row.decided_at_ms),
    })
}

pub(super) fn slot_status(row: &SlotStatus) -> Value {
    json!({
        "stage": row.slot.stage.as_str(),
        "review_role": row.slot.review_role.as_str(),
        "attempt": row.slot.attempt,
        "assignee": row.assignee,
        "decision": row.decision.as_str(),
        "needs_manual_assignment": row.slot.needs_manual_assignment,
        "opened_at_ms": row.slot.opened_at_ms,
        "opened_at": ts(row.slot.opened_at_ms),
        "resolved_at_ms": row.slot.resolved_at_ms,
    })
}

pub(super) fn officer(row: &OfficerRow) -> Value {
    json!({
        "officer_id": row.officer_id,
        "name": row.name,
        "role": row.role.as_str(),
        "role_title": row.role.title(),
        "is_active": row.is_active,
        "updated_at_ms": row.updated_at_ms,
    })
}

pub(super) fn rule(row: &RuleRow) -> Value {
    json!({
        "rule_id": row.rule_id,
        "position_type": row.position_type.as_str(),
        "target_role": row.target_role.as_str(),
        "strategy": row.strategy.as_str(),
        "max_workload_per_officer": row.max_workload_per_officer,
        "is_active": row.is_active,
        "priority": row.priority,
        "last_round_robin_index": row.last_round_robin_index,
        "escalation_time_hours": row.escalation_time_hours,
        "escalation_role": row.escalation_role.map(|role| role.as_str()),
        "updated_at_ms": row.updated_at_ms,
    })
}

pub(super) fn appointment(row: &AppointmentRow) -> Value {
    json!({
        "appointment_id": row.appointment_id,
        "application_id": row.application_id,
        "scheduled_by": row.scheduled_by,
        "scheduled_at_ms": row.scheduled_at_ms,
        "scheduled_at": ts(row.scheduled_at_ms),
        "place": row.place,
        "status": row.status.as_str(),
        "rescheduled_to_id": row.rescheduled_to_id,
        "completion_notes": row.completion_notes,
        "cancel_reason": row.cancel_reason,
        "reminder_sent": row.reminder_sent,
        "reminder_sent_at": opt_ts(row.reminder_sent_at_ms),
        "updated_at_ms": row.updated_at_ms,
    })
}

/// Never carries the OTP or its digest.
pub(super) fn signature(row: &SignatureRow) -> Value {
    json!({
        "signature_id": row.signature_id,
        "application_id": row.application_id,
        "stage": row.stage.as_str(),
        "attempt": row.attempt,
        "officer_id": row.officer_id,
        "status": row.status.as_str(),
        "otp_expires_at_ms": row.otp_expires_at_ms,
        "otp_expires_at": opt_ts(row.otp_expires_at_ms),
        "otp_attempts": row.otp_attempts,
        "hsm_transaction_id": row.hsm_transaction_id,
        "signed_document_path": row.signed_document_path,
        "failure_reason": row.failure_reason,
        "failed_at_ms": row.failed_at_ms,
        "updated_at_ms": row.updated_at_ms,
    })
}

pub(super) fn stage_count(row: &StageCountRow) -> Value {
    json!({
        "position_type": row.position_type.as_str(),
        "stage": row.stage.as_str(),
        "applications": row.applications,
    })
}

pub(super) fn outcome_count(row: &OutcomeCountRow) -> Value {
    json!({
        "stage": row.stage.as_str(),
        "approved": row.approved,
        "rejected": row.rejected,
        "pending": row.pending,
    })
}

pub(super) fn workload(row: &OfficerWorkloadRow) -> Value {
    json!({
        "officer_id": row.officer_id,
        "name": row.name,
        "role": row.role.as_str(),
        "open_assignments": row.open_assignments,
    })
}

pub(super) fn open_slot(row: &OpenSlotRow) -> Value {
    json!({
        "application_id": row.application_id,
        "position_type": row.position_type.as_str(),
        "stage": row.stage.as_str(),
        "review_role": row.review_role.as_str(),
        "attempt": row.attempt,
        "assignee": row.assignee,
        "opened_at_ms": row.opened_at_ms,
        "opened_at": ts(row.opened_at_ms),
        "waited_ms": row.waited_ms,
    })
}

pub(super) fn escalation(row: &EscalationDueRow) -> Value {
    json!({
        "slot": open_slot(&row.slot),
        "rule_id": row.rule_id,
        "escalation_time_hours": row.escalation_time_hours,
        "escalation_role": row.escalation_role.map(|role| role.as_str()),
    })
}

pub(super) fn event(row: &EventRow) -> Value {
    let payload = serde_json::from_str::<Value>(&row.payload_json)
        .unwrap_or_else(|_| Value::String(row.payload_json.clone()));
    json!({
        "event_id": row.event_id(),
        "ts_ms": row.ts_ms,
        "ts": ts(row.ts_ms),
        "application_id": row.application_id,
        "type": row.event_type,
        "payload": payload,
    })
}

pub(super) fn list<T>(rows: &[T], render: fn(&T) -> Value) -> Value {
    Value::Array(rows.iter().map(render).collect())
}
