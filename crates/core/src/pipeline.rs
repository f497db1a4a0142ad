#![forbid(unsafe_code)]

//! The approval pipeline: stage order, required reviewer roles per position type and the
//! rule that folds parallel sub-reviews into one stage decision.

use crate::model::{Decision, OfficerRole, PositionType, Stage};

/// Review stages in pipeline order.
pub const REVIEW_STAGES: [Stage; 7] = [
    Stage::JeReview,
    Stage::AeReview,
    Stage::EeReview,
    Stage::CeReview,
    Stage::ClerkProcessing,
    Stage::EeStage2Sign,
    Stage::CeStage2Sign,
];

const PIPELINE_STEPS: u32 = 8;

pub fn next_stage(stage: Stage) -> Option<Stage> {
    match stage {
        Stage::Submitted => Some(Stage::JeReview),
        Stage::JeReview => Some(Stage::AeReview),
        Stage::AeReview => Some(Stage::EeReview),
        Stage::EeReview => Some(Stage::CeReview),
        Stage::CeReview => Some(Stage::ClerkProcessing),
        Stage::ClerkProcessing => Some(Stage::EeStage2Sign),
        Stage::EeStage2Sign => Some(Stage::CeStage2Sign),
        Stage::CeStage2Sign => Some(Stage::Completed),
        Stage::Completed | Stage::Rejected => None,
    }
}

/// Position of a stage on the linear pipeline (`Submitted` = 0, `Completed` = 8).
pub fn pipeline_index(stage: Stage) -> Option<u32> {
    match stage {
        Stage::Submitted => Some(0),
        Stage::Completed => Some(PIPELINE_STEPS),
        Stage::Rejected => None,
        review => REVIEW_STAGES
            .iter()
            .position(|candidate| *candidate == review)
            .and_then(|idx| u32::try_from(idx + 1).ok()),
    }
}

/// Progress for dashboards. A rejected application reports the stage it was rejected at.
pub fn progress_percent(stage: Stage, rejected_at: Option<Stage>) -> u32 {
    let effective = match stage {
        Stage::Rejected => rejected_at.unwrap_or(Stage::Submitted),
        other => other,
    };
    let index = pipeline_index(effective).unwrap_or(0);
    index * 100 / PIPELINE_STEPS
}

/// Edges the workflow may take. Resubmission restarts a rejected application at JE review.
pub fn is_legal_edge(from: Stage, to: Stage) -> bool {
    if next_stage(from) == Some(to) {
        return true;
    }
    if to == Stage::Rejected {
        return from.is_review();
    }
    from == Stage::Rejected && to == Stage::JeReview
}

/// Roles that must each approve `stage` for an application of `position`.
///
/// Supervisor licences are reviewed in parallel by both supervisor desks.
pub fn review_roles(position: PositionType, stage: Stage) -> Vec<OfficerRole> {
    match stage {
        Stage::JeReview => vec![OfficerRole::JuniorEngineer],
        Stage::AeReview => match position {
            PositionType::StructuralEngineer => vec![OfficerRole::AssistantEngineerStructural],
            PositionType::Architect => vec![OfficerRole::AssistantEngineerArchitect],
            PositionType::LicenceEngineer => vec![OfficerRole::AssistantEngineerLicence],
            PositionType::Supervisor1 | PositionType::Supervisor2 => vec![
                OfficerRole::AssistantEngineerSupervisor1,
                OfficerRole::AssistantEngineerSupervisor2,
            ],
        },
        Stage::EeReview | Stage::EeStage2Sign => vec![OfficerRole::ExecutiveEngineer],
        Stage::CeReview | Stage::CeStage2Sign => vec![OfficerRole::CityEngineer],
        Stage::ClerkProcessing => vec![OfficerRole::Clerk],
        Stage::Submitted | Stage::Completed | Stage::Rejected => Vec::new(),
    }
}

/// Stages whose approval must be backed by a signed document.
pub fn is_signature_gated(stage: Stage) -> bool {
    matches!(stage, Stage::EeStage2Sign | Stage::CeStage2Sign)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageResolution {
    Pending,
    Approved,
    Rejected,
}

/// Folds the latest decision of every review slot of a stage.
///
/// Any rejection rejects the stage; the stage is approved only when every slot approved.
pub fn resolve_slots(decisions: &[Decision]) -> StageResolution {
    if decisions.iter().any(|d| *d == Decision::Rejected) {
        return StageResolution::Rejected;
    }
    if !decisions.is_empty() && decisions.iter().all(|d| *d == Decision::Approved) {
        return StageResolution::Approved;
    }
    StageResolution::Pending
}

pub fn pending_action(stage: Stage) -> &'static str {
    match stage {
        Stage::Submitted => "Awaiting fee payment and submission by the applicant",
        Stage::JeReview => "Awaiting Junior Engineer document verification",
        Stage::AeReview => "Awaiting Assistant Engineer review",
        Stage::EeReview => "Awaiting Executive Engineer review",
        Stage::CeReview => "Awaiting City Engineer review",
        Stage::ClerkProcessing => "Awaiting Clerk processing",
        Stage::EeStage2Sign => "Awaiting Executive Engineer certificate signature",
        Stage::CeStage2Sign => "Awaiting City Engineer certificate signature",
        Stage::Completed => "No action required; certificate issued",
        Stage::Rejected => "Rejected; applicant may resubmit",
    }
}
