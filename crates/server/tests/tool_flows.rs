#![forbid(unsafe_code)]

mod support;

use serde_json::json;
use support::*;

const HOUR_MS: i64 = 60 * 60 * 1000;

fn sign_stage(server: &mut Server, application_id: &str, stage: &str, officer_id: &str, now: i64) {
    let issued = server.call_ok(
        "signature",
        json!({
            "op": "generate_otp",
            "application_id": application_id,
            "stage": stage,
            "officer_id": officer_id,
            "now": now
        }),
    );
    let code = issued["otp_code"].as_str().expect("otp code").to_string();
    assert_eq!(issued["signature"]["status"], json!("otp_issued"));
    assert!(issued["signature"].get("otp_hash").is_none());

    let signed = server.call_ok(
        "signature",
        json!({
            "op": "apply",
            "application_id": application_id,
            "stage": stage,
            "officer_id": officer_id,
            "otp_code": code,
            "document_path": format!("certificates/{application_id}.pdf"),
            "now": now + 1
        }),
    );
    assert_eq!(signed["outcome"], json!("signed"));
    assert_eq!(
        signed["signature"]["signed_document_path"],
        json!(format!("certificates/{application_id}.pdf.signed"))
    );
    assert!(
        signed["signature"]["hsm_transaction_id"]
            .as_str()
            .is_some_and(|tx| tx.starts_with("local-"))
    );
}

#[test]
fn structural_application_runs_from_submission_to_certificate() {
    let mut server = Server::start_initialized("full_pipeline");
    seed_structural_pipeline(&mut server);

    let entered = create_and_submit(&mut server, "flow-1", T0);
    assert_eq!(entered["application"]["current_stage"], json!("je_review"));
    assert_eq!(
        entered["assignments"][0]["assignment"]["officer_id"],
        json!("je-1")
    );

    let booked = server.call_ok(
        "appointment",
        json!({
            "op": "schedule",
            "application_id": "flow-1",
            "officer_id": "je-1",
            "scheduled_at": "2023-11-15T10:00:00Z",
            "place": "Ward office, room 4",
            "now": T0 + 1
        }),
    );
    assert_eq!(
        booked["appointment"]["scheduled_at_ms"],
        json!(1_700_042_400_000i64)
    );
    let appointment_id = booked["appointment"]["appointment_id"].clone();
    let completed = server.call_ok(
        "appointment",
        json!({
            "op": "complete",
            "appointment_id": appointment_id,
            "notes": "originals verified",
            "now": T0 + 2
        }),
    );
    assert_eq!(completed["appointment"]["status"], json!("completed"));

    let steps = [
        ("je_review", "je-1", "ae_review"),
        ("ae_review", "ae-struct-1", "ee_review"),
        ("ee_review", "ee-1", "ce_review"),
        ("ce_review", "ce-1", "clerk_processing"),
        ("clerk_processing", "clerk-1", "ee_stage2_sign"),
    ];
    for (n, (stage, officer_id, next)) in steps.into_iter().enumerate() {
        let moved = approve(&mut server, "flow-1", stage, officer_id, T0 + 10 + n as i64);
        assert_eq!(moved["stage_advanced"], json!(true));
        assert_eq!(moved["application"]["current_stage"], json!(next));
    }

    let err = server.call_err(
        "workflow",
        json!({
            "op": "transition",
            "application_id": "flow-1",
            "stage": "ee_stage2_sign",
            "decision": "approved",
            "officer_id": "ee-1",
            "now": T0 + 20
        }),
    );
    assert_eq!(err["code"], json!("SIGNATURE_REQUIRED"));
    assert_eq!(err["http_status"], json!(412));

    sign_stage(&mut server, "flow-1", "ee_stage2_sign", "ee-1", T0 + 30);
    let moved = approve(&mut server, "flow-1", "ee_stage2_sign", "ee-1", T0 + 40);
    assert_eq!(moved["application"]["current_stage"], json!("ce_stage2_sign"));
    assert!(moved["outcome"]["signature_id"].is_i64());

    sign_stage(&mut server, "flow-1", "ce_stage2_sign", "ce-1", T0 + 50);
    let moved = approve(&mut server, "flow-1", "ce_stage2_sign", "ce-1", T0 + 60);
    assert_eq!(moved["application"]["current_stage"], json!("completed"));

    let status = server.call_ok(
        "workflow",
        json!({ "op": "status", "application_id": "flow-1" }),
    );
    assert_eq!(status["progress_percent"], json!(100));
    assert!(status["slots"].as_array().is_some_and(|slots| slots.is_empty()));

    let history = server.call_ok(
        "workflow",
        json!({ "op": "history", "application_id": "flow-1" }),
    );
    let decided = history["outcomes"]
        .as_array()
        .expect("outcomes")
        .iter()
        .filter(|row| row["decision"] != json!("pending"))
        .count();
    assert_eq!(decided, 7);
    assert_eq!(history["signatures"].as_array().map(Vec::len), Some(2));
    assert_eq!(history["appointments"].as_array().map(Vec::len), Some(1));
}

#[test]
fn refusals_carry_code_status_and_retry_class() {
    let mut server = Server::start_initialized("refusals");
    seed_structural_pipeline(&mut server);
    create_and_submit(&mut server, "ref-1", T0);

    let err = server.call_err(
        "workflow",
        json!({
            "op": "transition",
            "application_id": "ref-1",
            "stage": "je_review",
            "decision": "approved",
            "officer_id": "ee-1",
            "now": T0 + 1
        }),
    );
    assert_eq!(err["code"], json!("UNAUTHORIZED_ROLE"));
    assert_eq!(err["http_status"], json!(403));
    assert_eq!(err["retriable"], json!(false));

    let err = server.call_err(
        "workflow",
        json!({
            "op": "transition",
            "application_id": "ref-1",
            "stage": "ae_review",
            "decision": "approved",
            "officer_id": "ae-struct-1",
            "now": T0 + 2
        }),
    );
    assert_eq!(err["code"], json!("STALE_STATE"));
    assert_eq!(err["retriable"], json!(true));

    let err = server.call_err(
        "workflow",
        json!({
            "op": "transition",
            "application_id": "ref-1",
            "stage": "je_review",
            "decision": "maybe",
            "officer_id": "je-1"
        }),
    );
    assert_eq!(err["code"], json!("INVALID_INPUT"));
    assert!(
        err["message"]
            .as_str()
            .is_some_and(|m| m.contains("approved|rejected"))
    );

    let err = server.call_err("applications", json!({ "op": "get" }));
    assert_eq!(err["code"], json!("INVALID_INPUT"));
    let err = server.call_err(
        "applications",
        json!({ "op": "get", "application_id": "missing-1" }),
    );
    assert_eq!(err["code"], json!("UNKNOWN_ID"));
    assert_eq!(err["http_status"], json!(404));

    let err = server.call_err("report", json!({ "op": "histogram" }));
    assert_eq!(err["code"], json!("UNKNOWN_OP"));
    let err = server.call_err("report", json!({ "now": T0 }));
    assert_eq!(err["code"], json!("INVALID_INPUT"));
}

#[test]
fn wrong_otp_reports_remaining_attempts() {
    let mut server = Server::start_initialized("otp_mismatch");
    seed_structural_pipeline(&mut server);
    create_and_submit(&mut server, "otp-1", T0);
    for (n, (stage, officer_id)) in [
        ("je_review", "je-1"),
        ("ae_review", "ae-struct-1"),
        ("ee_review", "ee-1"),
        ("ce_review", "ce-1"),
        ("clerk_processing", "clerk-1"),
    ]
    .into_iter()
    .enumerate()
    {
        approve(&mut server, "otp-1", stage, officer_id, T0 + 1 + n as i64);
    }

    let issued = server.call_ok(
        "signature",
        json!({
            "op": "generate_otp",
            "application_id": "otp-1",
            "stage": "ee_stage2_sign",
            "officer_id": "ee-1",
            "now": T0 + 10
        }),
    );
    let code = issued["otp_code"].as_str().expect("otp code");
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let result = server.call_ok(
        "signature",
        json!({
            "op": "apply",
            "application_id": "otp-1",
            "stage": "ee_stage2_sign",
            "officer_id": "ee-1",
            "otp_code": wrong,
            "now": T0 + 11
        }),
    );
    assert_eq!(result["outcome"], json!("mismatch"));
    assert_eq!(result["attempts_remaining"], json!(2));
    assert_eq!(result["signature"]["otp_attempts"], json!(1));

    let err = server.call_err(
        "signature",
        json!({
            "op": "generate_otp",
            "application_id": "otp-1",
            "stage": "ee_stage2_sign",
            "officer_id": "ee-1",
            "now": T0 + 12
        }),
    );
    assert_eq!(err["code"], json!("OTP_ALREADY_ISSUED"));
}

#[test]
fn reports_and_event_paging() {
    let mut server = Server::start_initialized("reports");
    seed_structural_pipeline(&mut server);
    create_and_submit(&mut server, "rep-1", T0);
    create_and_submit(&mut server, "rep-2", T0 + 1);
    approve(&mut server, "rep-2", "je_review", "je-1", T0 + 2);

    let counts = server.call_ok("report", json!({ "op": "stage_counts" }));
    assert_eq!(
        counts["stages"],
        json!([
            { "position_type": "structural_engineer", "stage": "je_review", "applications": 1 },
            { "position_type": "structural_engineer", "stage": "ae_review", "applications": 1 }
        ])
    );

    let workload = server.call_ok("report", json!({ "op": "officer_workload" }));
    let je = workload["officers"]
        .as_array()
        .expect("officers")
        .iter()
        .find(|row| row["officer_id"] == json!("je-1"))
        .cloned()
        .expect("je-1 row");
    assert_eq!(je["open_assignments"], json!(1));

    let delayed = server.call_ok(
        "report",
        json!({ "op": "delayed", "older_than_hours": 1, "now": T0 + 3 * HOUR_MS }),
    );
    assert_eq!(delayed["older_than_ms"], json!(HOUR_MS));
    let ids: Vec<_> = delayed["slots"]
        .as_array()
        .expect("slots")
        .iter()
        .map(|row| row["application_id"].clone())
        .collect();
    assert_eq!(ids, vec![json!("rep-1"), json!("rep-2")]);

    let due = server.call_ok("report", json!({ "op": "escalation_due", "now": T0 + 3 * HOUR_MS }));
    assert_eq!(due["due"], json!([]));

    let first = server.call_ok(
        "report",
        json!({ "op": "events", "application_id": "rep-1", "limit": 1 }),
    );
    assert_eq!(first["events"][0]["type"], json!("application_created"));
    let since = first["next_since"].as_str().expect("cursor").to_string();
    let rest = server.call_ok(
        "report",
        json!({ "op": "events", "application_id": "rep-1", "since": since }),
    );
    let rest = rest["events"].as_array().expect("events");
    assert!(!rest.is_empty());
    assert!(rest.iter().all(|event| event["application_id"] == json!("rep-1")));
}

#[test]
fn admin_roster_and_manual_claims() {
    let mut server = Server::start_initialized("admin_claims");
    server.call_ok(
        "admin",
        json!({
            "op": "officer_upsert",
            "officer_id": "je-9",
            "name": "Nisha Rao",
            "role": "junior_engineer",
            "now": T0
        }),
    );
    let rule = server.call_ok(
        "admin",
        json!({
            "op": "rule_upsert",
            "position_type": "structural_engineer",
            "target_role": "junior_engineer",
            "strategy": "manual",
            "now": T0
        }),
    );
    assert_eq!(rule["rule"]["strategy"], json!("manual"));

    let entered = create_and_submit(&mut server, "man-1", T0 + 1);
    assert_eq!(
        entered["assignments"][0]["status"],
        json!("needs_manual_assignment")
    );
    assert_eq!(entered["assignments"][0]["reason"], json!("manual_strategy"));

    let claimed = server.call_ok(
        "assignment",
        json!({
            "op": "claim",
            "application_id": "man-1",
            "stage": "je_review",
            "officer_id": "je-9",
            "now": T0 + 2
        }),
    );
    assert_eq!(claimed["assignment"]["officer_id"], json!("je-9"));
    assert_eq!(claimed["assignment"]["strategy_used"], json!("manual"));

    let listed = server.call_ok(
        "admin",
        json!({ "op": "officer_list", "role": "junior_engineer" }),
    );
    assert_eq!(listed["officers"].as_array().map(Vec::len), Some(1));
    server.call_ok(
        "admin",
        json!({ "op": "officer_deactivate", "officer_id": "je-9", "now": T0 + 3 }),
    );
    let listed = server.call_ok(
        "admin",
        json!({ "op": "officer_list", "include_inactive": false }),
    );
    assert_eq!(listed["officers"], json!([]));
}
