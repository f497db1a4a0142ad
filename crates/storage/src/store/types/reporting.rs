#![forbid(unsafe_code)]

use pm_core::{OfficerRole, PositionType, Stage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageCountRow {
    pub position_type: PositionType,
    pub stage: Stage,
    pub applications: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutcomeCountRow {
    pub stage: Stage,
    pub approved: i64,
    pub rejected: i64,
    pub pending: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfficerWorkloadRow {
    pub officer_id: String,
    pub name: String,
    pub role: OfficerRole,
    pub open_assignments: i64,
}

#[derive(Clone, Debug)]
pub struct OpenSlotRow {
    pub application_id: String,
    pub position_type: PositionType,
    pub stage: Stage,
    pub review_role: OfficerRole,
    pub attempt: i64,
    pub opened_at_ms: i64,
    pub assignee: Option<String>,
    pub waited_ms: i64,
}

#[derive(Clone, Debug)]
pub struct EscalationDueRow {
    pub slot: OpenSlotRow,
    pub rule_id: i64,
    pub escalation_time_hours: i64,
    pub escalation_role: Option<OfficerRole>,
}

#[derive(Clone, Debug)]
pub struct EventRow {
    pub seq: i64,
    pub ts_ms: i64,
    pub application_id: Option<String>,
    pub event_type: String,
    pub payload_json: String,
}

impl EventRow {
    pub fn event_id(&self) -> String {
        format!("evt_{:016}", self.seq)
    }
}
