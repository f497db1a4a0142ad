#![forbid(unsafe_code)]

mod support;

use pm_core::{AppointmentStatus, Decision, OfficerRole, PositionType, Stage};
use pm_storage::{
    ApplicationResubmitRequest, AppointmentCancelRequest, AppointmentCompleteRequest,
    AppointmentRescheduleRequest, AppointmentScheduleRequest, SqliteStore, StoreError,
};
use support::*;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn schedule(
    store: &mut SqliteStore,
    application_id: &str,
    officer_id: &str,
    scheduled_at_ms: i64,
) -> Result<pm_storage::AppointmentRow, StoreError> {
    store.appointment_schedule(AppointmentScheduleRequest {
        application_id: application_id.to_string(),
        officer_id: officer_id.to_string(),
        scheduled_at_ms,
        place: "Ward office, room 4".to_string(),
        now_ms: T0 + 10,
    })
}

fn seeded(name: &str) -> SqliteStore {
    let mut store = open_store(name);
    seed_structural_pipeline(&mut store);
    officer(&mut store, "je-2", OfficerRole::JuniorEngineer);
    create_and_submit(&mut store, "apt-1", PositionType::StructuralEngineer, T0);
    store
}

#[test]
fn only_the_assigned_je_books_during_je_review() {
    let mut store = seeded("appointment_auth");

    let err = schedule(&mut store, "apt-1", "je-2", T0 + DAY_MS).expect_err("not the assignee");
    assert_eq!(err.code(), "UNAUTHORIZED_ROLE");
    let err = schedule(&mut store, "apt-1", "ee-1", T0 + DAY_MS).expect_err("wrong role");
    assert_eq!(err.code(), "UNAUTHORIZED_ROLE");

    let booked = schedule(&mut store, "apt-1", "je-1", T0 + DAY_MS).expect("schedule");
    assert_eq!(booked.status, AppointmentStatus::Scheduled);
    assert_eq!(booked.scheduled_by, "je-1");
    assert!(!booked.reminder_sent);

    approve(&mut store, "apt-1", Stage::JeReview, "je-1", T0 + 20);
    let err = schedule(&mut store, "apt-1", "je-1", T0 + 2 * DAY_MS).expect_err("past JE review");
    match err {
        StoreError::StaleState {
            requested, current, ..
        } => {
            assert_eq!(requested, Stage::JeReview);
            assert_eq!(current, Stage::AeReview);
        }
        other => panic!("expected StaleState, got {other:?}"),
    }
}

#[test]
fn second_booking_conflicts_and_reschedule_links_records() {
    let mut store = seeded("appointment_reschedule");
    let first = schedule(&mut store, "apt-1", "je-1", T0 + DAY_MS).expect("schedule");

    let err = schedule(&mut store, "apt-1", "je-1", T0 + 2 * DAY_MS).expect_err("one active");
    match err {
        StoreError::AppointmentConflict {
            active_appointment_id,
            ..
        } => assert_eq!(active_appointment_id, first.appointment_id),
        other => panic!("expected AppointmentConflict, got {other:?}"),
    }

    let confirmed = store
        .appointment_confirm(first.appointment_id, T0 + 11)
        .expect("confirm");
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let moved = store
        .appointment_reschedule(AppointmentRescheduleRequest {
            appointment_id: first.appointment_id,
            scheduled_at_ms: T0 + 3 * DAY_MS,
            place: None,
            now_ms: T0 + 12,
        })
        .expect("reschedule");
    assert_eq!(moved.previous.status, AppointmentStatus::Rescheduled);
    assert_eq!(
        moved.previous.rescheduled_to_id,
        Some(moved.appointment.appointment_id)
    );
    assert_eq!(moved.appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(moved.appointment.place, first.place);
    assert_eq!(moved.appointment.scheduled_by, "je-1");

    let all = store.appointments_for("apt-1").expect("list");
    let active: Vec<_> = all.iter().filter(|row| row.status.is_active()).collect();
    assert_eq!(all.len(), 2);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].appointment_id, moved.appointment.appointment_id);

    let err = store
        .appointment_reschedule(AppointmentRescheduleRequest {
            appointment_id: first.appointment_id,
            scheduled_at_ms: T0 + 4 * DAY_MS,
            place: None,
            now_ms: T0 + 13,
        })
        .expect_err("rescheduled record is terminal");
    assert_eq!(err.code(), "INVALID_APPOINTMENT_TRANSITION");
}

#[test]
fn reminder_flag_is_set_once() {
    let mut store = seeded("appointment_reminder");
    let booked = schedule(&mut store, "apt-1", "je-1", T0 + DAY_MS).expect("schedule");

    let marked = store
        .appointment_mark_reminder_sent(booked.appointment_id, T0 + 30)
        .expect("mark");
    assert!(marked.reminder_sent);
    assert_eq!(marked.reminder_sent_at_ms, Some(T0 + 30));

    let err = store
        .appointment_mark_reminder_sent(booked.appointment_id, T0 + 31)
        .expect_err("already marked");
    assert!(matches!(err, StoreError::ReminderAlreadySent { .. }));

    let completed = store
        .appointment_complete(AppointmentCompleteRequest {
            appointment_id: booked.appointment_id,
            notes: Some("  originals verified  ".to_string()),
            now_ms: T0 + 40,
        })
        .expect("complete");
    assert_eq!(completed.completion_notes.as_deref(), Some("originals verified"));

    let err = store
        .appointment_mark_reminder_sent(booked.appointment_id, T0 + 41)
        .expect_err("completed appointment");
    match err {
        StoreError::InvalidAppointmentTransition { from, to, .. } => {
            assert_eq!(from, "completed");
            assert_eq!(to, "reminder_sent");
        }
        other => panic!("expected InvalidAppointmentTransition, got {other:?}"),
    }
}

#[test]
fn cancel_needs_a_reason_and_terminal_states_stay_put() {
    let mut store = seeded("appointment_cancel");
    let booked = schedule(&mut store, "apt-1", "je-1", T0 + DAY_MS).expect("schedule");

    let err = store
        .appointment_cancel(AppointmentCancelRequest {
            appointment_id: booked.appointment_id,
            reason: "   ".to_string(),
            now_ms: T0 + 20,
        })
        .expect_err("blank reason");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let cancelled = store
        .appointment_cancel(AppointmentCancelRequest {
            appointment_id: booked.appointment_id,
            reason: "applicant unavailable".to_string(),
            now_ms: T0 + 21,
        })
        .expect("cancel");
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("applicant unavailable"));

    for attempt in [
        store.appointment_confirm(booked.appointment_id, T0 + 22),
        store.appointment_complete(AppointmentCompleteRequest {
            appointment_id: booked.appointment_id,
            notes: None,
            now_ms: T0 + 23,
        }),
    ] {
        let err = attempt.expect_err("cancelled is terminal");
        assert_eq!(err.code(), "INVALID_APPOINTMENT_TRANSITION");
    }

    // A cancelled booking frees the application for a new one.
    let again = schedule(&mut store, "apt-1", "je-1", T0 + 2 * DAY_MS).expect("rebook");
    assert_ne!(again.appointment_id, booked.appointment_id);

    let err = store.appointment_get(9_999).expect_err("unknown");
    assert!(matches!(err, StoreError::UnknownId));
}

#[test]
fn rejection_cancels_the_live_booking_so_the_next_attempt_can_book() {
    let mut store = seeded("appointment_rejection");
    let booked = schedule(&mut store, "apt-1", "je-1", T0 + DAY_MS).expect("schedule");
    store
        .appointment_confirm(booked.appointment_id, T0 + 11)
        .expect("confirm");

    decide(
        &mut store,
        "apt-1",
        Stage::JeReview,
        None,
        "je-1",
        Decision::Rejected,
        T0 + 20,
    )
    .expect("reject");

    let cancelled = store.appointment_get(booked.appointment_id).expect("get");
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("application_rejected"));
    assert_eq!(cancelled.updated_at_ms, T0 + 20);
    let err = store
        .appointment_mark_reminder_sent(booked.appointment_id, T0 + 21)
        .expect_err("no reminder for a cancelled booking");
    assert_eq!(err.code(), "INVALID_APPOINTMENT_TRANSITION");

    let events = store.list_events(Some("apt-1"), None, None).expect("events");
    let cancel_at = events
        .iter()
        .position(|event| event.event_type == "appointment_cancelled")
        .expect("cancel event");
    let reject_at = events
        .iter()
        .position(|event| event.event_type == "application_rejected")
        .expect("reject event");
    assert!(cancel_at < reject_at);

    let resubmitted = store
        .resubmit_application(ApplicationResubmitRequest {
            application_id: "apt-1".to_string(),
            now_ms: T0 + 30,
        })
        .expect("resubmit");
    let assignee = resubmitted.assignments[0]
        .officer_id()
        .expect("je slot assigned")
        .to_string();
    let rebooked = schedule(&mut store, "apt-1", &assignee, T0 + 2 * DAY_MS).expect("rebook");
    assert_eq!(rebooked.status, AppointmentStatus::Scheduled);
    assert_eq!(rebooked.scheduled_by, assignee);
}

#[test]
fn rejection_leaves_finished_bookings_alone() {
    let mut store = seeded("appointment_rejection_completed");
    let booked = schedule(&mut store, "apt-1", "je-1", T0 + DAY_MS).expect("schedule");
    store
        .appointment_complete(AppointmentCompleteRequest {
            appointment_id: booked.appointment_id,
            notes: None,
            now_ms: T0 + 15,
        })
        .expect("complete");

    decide(
        &mut store,
        "apt-1",
        Stage::JeReview,
        None,
        "je-1",
        Decision::Rejected,
        T0 + 20,
    )
    .expect("reject");

    let row = store.appointment_get(booked.appointment_id).expect("get");
    assert_eq!(row.status, AppointmentStatus::Completed);
    assert_eq!(row.cancel_reason, None);
}
