#![forbid(unsafe_code)]

use super::{
    AppointmentRow, ApplicationRow, AssignmentRow, SignatureRow, SlotAssignment,
};
use pm_core::{Decision, OfficerRole, Stage};

#[derive(Clone, Debug)]
pub struct StageOutcomeRow {
    pub seq: i64,
    pub application_id: String,
    pub stage: Stage,
    pub review_role: OfficerRole,
    pub attempt: i64,
    pub decision: Decision,
    pub officer_id: Option<String>,
    pub comments: Option<String>,
    pub signature_id: Option<i64>,
    pub decided_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct ReviewSlotRow {
    pub application_id: String,
    pub stage: Stage,
    pub review_role: OfficerRole,
    pub attempt: i64,
    pub opened_at_ms: i64,
    pub needs_manual_assignment: bool,
    pub resolved_at_ms: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct TransitionRequest {
    pub application_id: String,
    pub stage: Stage,
    /// Required only when the stage has more than one review slot.
    pub review_role: Option<OfficerRole>,
    pub decision: Decision,
    pub officer_id: String,
    pub comments: Option<String>,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct TransitionResult {
    pub outcome: StageOutcomeRow,
    pub application: ApplicationRow,
    pub stage_advanced: bool,
    pub assignments: Vec<SlotAssignment>,
}

#[derive(Clone, Debug)]
pub struct SlotStatus {
    pub slot: ReviewSlotRow,
    pub assignee: Option<String>,
    pub decision: Decision,
}

#[derive(Clone, Debug)]
pub struct WorkflowStatus {
    pub application: ApplicationRow,
    pub progress_percent: u32,
    pub slots: Vec<SlotStatus>,
    pub pending_action: String,
}

#[derive(Clone, Debug)]
pub struct StageHistory {
    pub application: ApplicationRow,
    pub outcomes: Vec<StageOutcomeRow>,
    pub assignments: Vec<AssignmentRow>,
    pub appointments: Vec<AppointmentRow>,
    pub signatures: Vec<SignatureRow>,
}
