use super::*;
use crate::pipeline::{
    REVIEW_STAGES, is_legal_edge, is_signature_gated, next_stage, pipeline_index,
    progress_percent, resolve_slots, review_roles,
};

#[test]
fn id_validation() {
    assert_eq!(ApplicationId::try_new("").unwrap_err(), IdError::Empty);
    assert_eq!(
        ApplicationId::try_new("-1001").unwrap_err(),
        IdError::InvalidFirstChar
    );
    assert_eq!(
        OfficerId::try_new("je 1").unwrap_err(),
        IdError::InvalidChar { ch: ' ', index: 2 }
    );
    assert_eq!(
        OfficerId::try_new("x".repeat(65)).unwrap_err(),
        IdError::TooLong
    );
    assert!(ApplicationId::try_new("1001").is_ok());
    assert!(OfficerId::try_new("je.pune-01").is_ok());
}

#[test]
fn enums_round_trip_their_wire_names() {
    for stage in Stage::ALL {
        assert_eq!(Stage::parse(stage.as_str()), Some(stage));
    }
    for role in OfficerRole::ALL {
        assert_eq!(OfficerRole::parse(role.as_str()), Some(role));
    }
    for position in PositionType::ALL {
        assert_eq!(PositionType::parse(position.as_str()), Some(position));
    }
    assert_eq!(Decision::parse("approve"), Some(Decision::Approved));
    assert_eq!(Decision::parse("maybe"), None);
    assert_eq!(
        AssignmentStrategy::parse("RoundRobin"),
        Some(AssignmentStrategy::RoundRobin)
    );
}

#[test]
fn pipeline_is_linear_and_never_skips() {
    let mut stage = Stage::Submitted;
    let mut visited = vec![stage];
    while let Some(next) = next_stage(stage) {
        assert!(is_legal_edge(stage, next));
        assert_eq!(
            pipeline_index(next),
            pipeline_index(stage).map(|idx| idx + 1)
        );
        stage = next;
        visited.push(stage);
    }
    assert_eq!(stage, Stage::Completed);
    assert_eq!(visited.len(), 9);

    assert!(!is_legal_edge(Stage::JeReview, Stage::EeReview));
    assert!(!is_legal_edge(Stage::Submitted, Stage::Rejected));
    assert!(!is_legal_edge(Stage::Completed, Stage::Rejected));
    assert!(is_legal_edge(Stage::ClerkProcessing, Stage::Rejected));
    assert!(is_legal_edge(Stage::Rejected, Stage::JeReview));
    assert!(!is_legal_edge(Stage::Rejected, Stage::AeReview));
}

#[test]
fn every_review_stage_has_reviewers_for_every_position() {
    for position in PositionType::ALL {
        for stage in REVIEW_STAGES {
            assert!(
                !review_roles(position, stage).is_empty(),
                "{position:?} {stage:?} has no reviewer"
            );
        }
        assert!(review_roles(position, Stage::Submitted).is_empty());
        assert!(review_roles(position, Stage::Completed).is_empty());
    }
    assert_eq!(
        review_roles(PositionType::Supervisor2, Stage::AeReview),
        vec![
            OfficerRole::AssistantEngineerSupervisor1,
            OfficerRole::AssistantEngineerSupervisor2,
        ]
    );
    assert_eq!(
        review_roles(PositionType::StructuralEngineer, Stage::AeReview),
        vec![OfficerRole::AssistantEngineerStructural]
    );
}

#[test]
fn parallel_review_fails_fast_on_any_rejection() {
    assert_eq!(
        resolve_slots(&[Decision::Approved, Decision::Rejected]),
        StageResolution::Rejected
    );
    assert_eq!(
        resolve_slots(&[Decision::Pending, Decision::Rejected]),
        StageResolution::Rejected
    );
    assert_eq!(
        resolve_slots(&[Decision::Approved, Decision::Pending]),
        StageResolution::Pending
    );
    assert_eq!(
        resolve_slots(&[Decision::Approved, Decision::Approved]),
        StageResolution::Approved
    );
    assert_eq!(resolve_slots(&[]), StageResolution::Pending);
}

#[test]
fn progress_tracks_pipeline_position() {
    assert_eq!(progress_percent(Stage::Submitted, None), 0);
    assert_eq!(progress_percent(Stage::JeReview, None), 12);
    assert_eq!(progress_percent(Stage::CeReview, None), 50);
    assert_eq!(progress_percent(Stage::Completed, None), 100);
    assert_eq!(
        progress_percent(Stage::Rejected, Some(Stage::EeReview)),
        37
    );
}

#[test]
fn only_stage2_stages_need_signatures() {
    let gated = Stage::ALL
        .into_iter()
        .filter(|stage| is_signature_gated(*stage))
        .collect::<Vec<_>>();
    assert_eq!(gated, vec![Stage::EeStage2Sign, Stage::CeStage2Sign]);
}

#[test]
fn appointment_status_moves() {
    use AppointmentStatus::*;
    assert!(Scheduled.can_transition_to(Confirmed));
    assert!(Confirmed.can_transition_to(Completed));
    assert!(Scheduled.can_transition_to(Rescheduled));
    assert!(!Confirmed.can_transition_to(Confirmed));
    assert!(!Cancelled.can_transition_to(Scheduled));
    assert!(!Completed.can_transition_to(Cancelled));
    assert!(Rescheduled.is_terminal());
}

#[test]
fn signature_status_moves() {
    use SignatureStatus::*;
    assert!(Pending.can_transition_to(OtpIssued));
    assert!(OtpIssued.can_transition_to(Pending));
    assert!(OtpIssued.can_transition_to(Signed));
    assert!(!Failed.can_transition_to(OtpIssued));
    assert!(!Pending.can_transition_to(Signed));
    assert!(Signed.is_terminal());
}
