#![forbid(unsafe_code)]

use super::SlotAssignment;
use pm_core::{PositionType, Stage};

#[derive(Clone, Debug)]
pub struct ApplicationRow {
    pub application_id: String,
    pub position_type: PositionType,
    pub applicant_name: String,
    pub current_stage: Stage,
    pub rejected_at_stage: Option<Stage>,
    pub attempt: i64,
    pub revision: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct ApplicationCreateRequest {
    pub application_id: String,
    pub position_type: PositionType,
    pub applicant_name: String,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct ApplicationSubmitRequest {
    pub application_id: String,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct ApplicationResubmitRequest {
    pub application_id: String,
    pub now_ms: i64,
}

/// Result of moving an application into a review stage (submit / resubmit).
#[derive(Clone, Debug)]
pub struct StageEntryResult {
    pub application: ApplicationRow,
    pub assignments: Vec<SlotAssignment>,
}
