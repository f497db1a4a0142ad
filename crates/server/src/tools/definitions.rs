#![forbid(unsafe_code)]

use serde_json::{Value, json};

pub(super) const APPLICATIONS_OPS: &[&str] = &["create", "submit", "resubmit", "get"];
pub(super) const WORKFLOW_OPS: &[&str] = &["transition", "status", "history"];
pub(super) const ASSIGNMENT_OPS: &[&str] = &["assign", "assign_to", "claim", "history"];
pub(super) const APPOINTMENT_OPS: &[&str] = &[
    "schedule",
    "confirm",
    "complete",
    "cancel",
    "reschedule",
    "reminder_sent",
    "get",
    "list",
];
pub(super) const SIGNATURE_OPS: &[&str] = &["generate_otp", "apply", "list"];
pub(super) const ADMIN_OPS: &[&str] = &[
    "officer_upsert",
    "officer_deactivate",
    "officer_list",
    "rule_upsert",
    "rule_deactivate",
    "rule_list",
];
pub(super) const REPORT_OPS: &[&str] = &[
    "stage_counts",
    "outcome_counts",
    "officer_workload",
    "delayed",
    "escalation_due",
    "events",
];

/// Every tool takes `op` plus op-specific fields. Timestamps accept epoch ms or RFC 3339;
/// `now` pins the request clock.
fn op_schema(ops: &[&str], properties: Value) -> Value {
    let mut props = json!({
        "op": { "type": "string", "enum": ops },
        "now": { "type": ["integer", "string"] }
    });
    if let (Some(target), Value::Object(extra)) = (props.as_object_mut(), properties) {
        target.extend(extra);
    }
    json!({
        "type": "object",
        "properties": props,
        "required": ["op"]
    })
}

pub(crate) fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "applications",
            "description": "Create, submit and resubmit permit applications; read one back.",
            "inputSchema": op_schema(APPLICATIONS_OPS, json!({
                "application_id": { "type": "string" },
                "position_type": { "type": "string" },
                "applicant_name": { "type": "string" }
            })),
        }),
        json!({
            "name": "workflow",
            "description":
                "Record a review decision; read pipeline status and the full stage history.",
            "inputSchema": op_schema(WORKFLOW_OPS, json!({
                "application_id": { "type": "string" },
                "stage": { "type": "string" },
                "review_role": { "type": "string" },
                "decision": { "type": "string", "enum": ["approved", "rejected"] },
                "officer_id": { "type": "string" },
                "comments": { "type": "string" }
            })),
        }),
        json!({
            "name": "assignment",
            "description":
                "Auto-assign, manually assign or claim a review slot; list assignment history.",
            "inputSchema": op_schema(ASSIGNMENT_OPS, json!({
                "application_id": { "type": "string" },
                "stage": { "type": "string" },
                "review_role": { "type": "string" },
                "officer_id": { "type": "string" }
            })),
        }),
        json!({
            "name": "appointment",
            "description":
                "Document-verification appointments booked during junior engineer review.",
            "inputSchema": op_schema(APPOINTMENT_OPS, json!({
                "application_id": { "type": "string" },
                "appointment_id": { "type": "integer" },
                "officer_id": { "type": "string" },
                "scheduled_at": { "type": ["integer", "string"] },
                "place": { "type": "string" },
                "notes": { "type": "string" },
                "reason": { "type": "string" }
            })),
        }),
        json!({
            "name": "signature",
            "description":
                "OTP-gated HSM signing for the executive and city engineer signing stages.",
            "inputSchema": op_schema(SIGNATURE_OPS, json!({
                "application_id": { "type": "string" },
                "stage": { "type": "string" },
                "officer_id": { "type": "string" },
                "otp_code": { "type": "string" },
                "document_path": { "type": "string" }
            })),
        }),
        json!({
            "name": "admin",
            "description": "Officer roster and auto-assignment rules.",
            "inputSchema": op_schema(ADMIN_OPS, json!({
                "officer_id": { "type": "string" },
                "name": { "type": "string" },
                "role": { "type": "string" },
                "include_inactive": { "type": "boolean" },
                "rule_id": { "type": "integer" },
                "position_type": { "type": "string" },
                "target_role": { "type": "string" },
                "strategy": {
                    "type": "string",
                    "enum": ["round_robin", "least_workload", "manual"]
                },
                "max_workload_per_officer": { "type": "integer" },
                "priority": { "type": "integer" },
                "escalation_time_hours": { "type": "integer" },
                "escalation_role": { "type": "string" }
            })),
        }),
        json!({
            "name": "report",
            "description": "Read-only projections: stage and outcome counts, workload, delays, \
                            escalations, audit events.",
            "inputSchema": op_schema(REPORT_OPS, json!({
                "older_than_hours": { "type": "integer" },
                "older_than_ms": { "type": "integer" },
                "application_id": { "type": "string" },
                "since": { "type": "string" },
                "limit": { "type": "integer" }
            })),
        }),
    ]
}
