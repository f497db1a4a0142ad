#![forbid(unsafe_code)]

mod support;

use pm_core::{Decision, OfficerRole, PositionType, Stage};
use pm_storage::{ApplicationCreateRequest, RuleUpsertRequest, SqliteStore, StoreError};
use support::*;

const HOUR_MS: i64 = 60 * 60 * 1000;

/// r-1 waits at JE review, r-2 waits at AE review, r-3 is a draft and r-4 was rejected.
fn seeded(name: &str) -> SqliteStore {
    let mut store = open_store(name);
    seed_structural_pipeline(&mut store);
    create_and_submit(&mut store, "r-1", PositionType::StructuralEngineer, T0);
    create_and_submit(&mut store, "r-2", PositionType::StructuralEngineer, T0 + 1);
    approve(&mut store, "r-2", Stage::JeReview, "je-1", T0 + 2);
    store
        .create_application(ApplicationCreateRequest {
            application_id: "r-3".to_string(),
            position_type: PositionType::StructuralEngineer,
            applicant_name: "Ravi Kulkarni".to_string(),
            now_ms: T0 + 3,
        })
        .expect("draft");
    create_and_submit(&mut store, "r-4", PositionType::StructuralEngineer, T0 + 4);
    decide(
        &mut store,
        "r-4",
        Stage::JeReview,
        None,
        "je-1",
        Decision::Rejected,
        T0 + 5,
    )
    .expect("reject");
    store
}

#[test]
fn stage_counts_follow_pipeline_order() {
    let store = seeded("report_stage_counts");
    let counts: Vec<_> = store
        .report_stage_counts()
        .expect("counts")
        .into_iter()
        .map(|row| (row.stage, row.applications))
        .collect();
    assert_eq!(
        counts,
        vec![
            (Stage::Submitted, 1),
            (Stage::JeReview, 1),
            (Stage::AeReview, 1),
            (Stage::Rejected, 1),
        ]
    );
}

#[test]
fn outcome_counts_split_decided_and_open_slots() {
    let store = seeded("report_outcomes");
    let rows = store.report_outcome_counts().expect("outcomes");
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].stage, Stage::JeReview);
    assert_eq!((rows[0].approved, rows[0].rejected, rows[0].pending), (1, 1, 1));
    assert_eq!(rows[1].stage, Stage::AeReview);
    assert_eq!((rows[1].approved, rows[1].rejected, rows[1].pending), (0, 0, 1));
}

#[test]
fn delayed_slots_report_wait_time_oldest_first() {
    let store = seeded("report_delayed");
    let now_ms = T0 + 2 * HOUR_MS;

    let rows = store.delayed_slots(now_ms, HOUR_MS).expect("delayed");
    let ids: Vec<_> = rows.iter().map(|row| row.application_id.as_str()).collect();
    assert_eq!(ids, vec!["r-1", "r-2"]);
    assert_eq!(rows[0].waited_ms, 2 * HOUR_MS);
    assert_eq!(rows[0].assignee.as_deref(), Some("je-1"));
    assert_eq!(rows[1].stage, Stage::AeReview);
    assert_eq!(rows[1].review_role, OfficerRole::AssistantEngineerStructural);

    assert!(store.delayed_slots(T0 + 10, HOUR_MS).expect("fresh").is_empty());
    let err = store.delayed_slots(now_ms, -1).expect_err("negative window");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let far = store.delayed_slots(i64::MAX, HOUR_MS).expect("far future");
    assert_eq!(far.len(), 2);
    assert_eq!(far[0].waited_ms, i64::MAX - T0);
    assert!(store.delayed_slots(i64::MIN, 0).expect("far past").is_empty());
}

#[test]
fn escalation_due_uses_the_governing_rule_window() {
    let mut store = seeded("report_escalation");
    let je_rule = store
        .rule_list(Some(PositionType::StructuralEngineer))
        .expect("rules")
        .into_iter()
        .find(|rule| rule.target_role == OfficerRole::JuniorEngineer)
        .expect("je rule");
    store
        .rule_upsert(RuleUpsertRequest {
            rule_id: Some(je_rule.rule_id),
            position_type: je_rule.position_type,
            target_role: je_rule.target_role,
            strategy: je_rule.strategy,
            max_workload_per_officer: 0,
            priority: je_rule.priority,
            escalation_time_hours: Some(1),
            escalation_role: Some(OfficerRole::AssistantEngineerStructural),
            now_ms: T0 + 6,
        })
        .expect("set escalation window");

    assert!(store.escalation_due(T0 + HOUR_MS / 2).expect("early").is_empty());

    let due = store.escalation_due(T0 + 2 * HOUR_MS).expect("due");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].slot.application_id, "r-1");
    assert_eq!(due[0].rule_id, je_rule.rule_id);
    assert_eq!(due[0].escalation_time_hours, 1);
    assert_eq!(
        due[0].escalation_role,
        Some(OfficerRole::AssistantEngineerStructural)
    );

    // Read-only: the slot keeps its assignee.
    let status = store.workflow_status("r-1").expect("status");
    assert_eq!(status.slots[0].assignee.as_deref(), Some("je-1"));
}

#[test]
fn events_page_by_application_and_cursor() {
    let store = seeded("report_events");

    let events = store.list_events(Some("r-2"), None, None).expect("events");
    assert_eq!(events[0].event_type, "application_created");
    assert!(events.iter().all(|event| event.application_id.as_deref() == Some("r-2")));
    assert!(events.iter().any(|event| event.event_type == "stage_advanced"));

    let first_id = events[0].event_id();
    assert!(first_id.starts_with("evt_"));
    let rest = store
        .list_events(Some("r-2"), Some(&first_id), None)
        .expect("since");
    assert_eq!(rest.len(), events.len() - 1);
    assert_eq!(rest[0].seq, events[1].seq);

    let one = store.list_events(None, None, Some(1)).expect("limit");
    assert_eq!(one.len(), 1);

    let err = store.list_events(None, Some("cursor-7"), None).expect_err("bad cursor");
    assert!(matches!(err, StoreError::InvalidInput(_)));
}
