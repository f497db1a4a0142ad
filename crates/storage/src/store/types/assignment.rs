#![forbid(unsafe_code)]

use pm_core::{AssignmentStrategy, OfficerRole, PositionType, Stage};

#[derive(Clone, Debug)]
pub struct OfficerRow {
    pub officer_id: String,
    pub name: String,
    pub role: OfficerRole,
    pub is_active: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct OfficerUpsertRequest {
    pub officer_id: String,
    pub name: String,
    pub role: OfficerRole,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct OfficersListRequest {
    pub role: Option<OfficerRole>,
    pub include_inactive: bool,
}

#[derive(Clone, Debug)]
pub struct RuleRow {
    pub rule_id: i64,
    pub position_type: PositionType,
    pub target_role: OfficerRole,
    pub strategy: AssignmentStrategy,
    /// 0 means unlimited.
    pub max_workload_per_officer: i64,
    pub is_active: bool,
    pub priority: i64,
    pub last_round_robin_index: i64,
    pub escalation_time_hours: Option<i64>,
    pub escalation_role: Option<OfficerRole>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct RuleUpsertRequest {
    /// `None` creates a new rule.
    pub rule_id: Option<i64>,
    pub position_type: PositionType,
    pub target_role: OfficerRole,
    pub strategy: AssignmentStrategy,
    pub max_workload_per_officer: i64,
    pub priority: i64,
    pub escalation_time_hours: Option<i64>,
    pub escalation_role: Option<OfficerRole>,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct AssignmentRow {
    pub assignment_id: i64,
    pub application_id: String,
    pub stage: Stage,
    pub review_role: OfficerRole,
    pub attempt: i64,
    pub officer_id: String,
    pub previous_officer_id: Option<String>,
    pub strategy_used: AssignmentStrategy,
    pub rule_id: Option<i64>,
    pub is_active: bool,
    pub assigned_at_ms: i64,
    pub superseded_at_ms: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManualReason {
    ManualStrategy,
    NoActiveRule,
    NoEligibleOfficer,
    OfficerDeactivated,
}

impl ManualReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ManualReason::ManualStrategy => "manual_strategy",
            ManualReason::NoActiveRule => "no_active_rule",
            ManualReason::NoEligibleOfficer => "no_eligible_officer",
            ManualReason::OfficerDeactivated => "officer_deactivated",
        }
    }
}

/// What the assignment engine did for one review slot.
#[derive(Clone, Debug)]
pub enum SlotAssignment {
    Assigned(AssignmentRow),
    NeedsManual {
        stage: Stage,
        review_role: OfficerRole,
        reason: ManualReason,
    },
}

impl SlotAssignment {
    pub fn officer_id(&self) -> Option<&str> {
        match self {
            SlotAssignment::Assigned(row) => Some(row.officer_id.as_str()),
            SlotAssignment::NeedsManual { .. } => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AssignRequest {
    pub application_id: String,
    pub stage: Stage,
    /// Required only when the stage has more than one review slot.
    pub review_role: Option<OfficerRole>,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct AssignToRequest {
    pub application_id: String,
    pub stage: Stage,
    pub review_role: Option<OfficerRole>,
    pub officer_id: String,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct ClaimRequest {
    pub application_id: String,
    pub stage: Stage,
    pub review_role: Option<OfficerRole>,
    pub officer_id: String,
    pub now_ms: i64,
}
