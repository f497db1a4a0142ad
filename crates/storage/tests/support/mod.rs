#![forbid(unsafe_code)]
#![allow(dead_code)]

use pm_core::{AssignmentStrategy, Decision, OfficerRole, PositionType, Stage};
use pm_storage::{
    ApplicationCreateRequest, ApplicationSubmitRequest, HsmClient, HsmError, HsmReceipt,
    HsmSignRequest, OfficerUpsertRequest, OtpGenerateRequest, RuleRow, RuleUpsertRequest,
    SignatureApplyRequest, SignatureApplyResult, SqliteStore, StageEntryResult, StoreError,
    TransitionRequest, TransitionResult, WorkflowPolicy,
};
use std::cell::Cell;
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const T0: i64 = 1_700_000_000_000;

pub(crate) fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("pm_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub(crate) fn open_store(test_name: &str) -> SqliteStore {
    let policy = WorkflowPolicy {
        hsm_backoff: Duration::ZERO,
        ..WorkflowPolicy::default()
    };
    SqliteStore::open_with_policy(temp_dir(test_name), policy).expect("open store")
}

pub(crate) fn officer(store: &mut SqliteStore, officer_id: &str, role: OfficerRole) {
    store
        .officer_upsert(OfficerUpsertRequest {
            officer_id: officer_id.to_string(),
            name: format!("Officer {officer_id}"),
            role,
            now_ms: T0,
        })
        .expect("officer upsert");
}

pub(crate) fn rule(
    store: &mut SqliteStore,
    position_type: PositionType,
    target_role: OfficerRole,
    strategy: AssignmentStrategy,
) -> RuleRow {
    store
        .rule_upsert(RuleUpsertRequest {
            rule_id: None,
            position_type,
            target_role,
            strategy,
            max_workload_per_officer: 0,
            priority: 0,
            escalation_time_hours: None,
            escalation_role: None,
            now_ms: T0,
        })
        .expect("rule upsert")
}

/// One officer per role and a round-robin rule for every role a structural engineer
/// application passes through.
pub(crate) fn seed_structural_pipeline(store: &mut SqliteStore) {
    let roster = [
        ("je-1", OfficerRole::JuniorEngineer),
        ("ae-struct-1", OfficerRole::AssistantEngineerStructural),
        ("ee-1", OfficerRole::ExecutiveEngineer),
        ("ce-1", OfficerRole::CityEngineer),
        ("clerk-1", OfficerRole::Clerk),
    ];
    for (officer_id, role) in roster {
        officer(store, officer_id, role);
        rule(store, PositionType::StructuralEngineer, role, AssignmentStrategy::RoundRobin);
    }
}

pub(crate) fn create_and_submit(
    store: &mut SqliteStore,
    application_id: &str,
    position_type: PositionType,
    now_ms: i64,
) -> StageEntryResult {
    store
        .create_application(ApplicationCreateRequest {
            application_id: application_id.to_string(),
            position_type,
            applicant_name: "Asha Patil".to_string(),
            now_ms,
        })
        .expect("create application");
    store
        .submit_application(ApplicationSubmitRequest {
            application_id: application_id.to_string(),
            now_ms,
        })
        .expect("submit application")
}

pub(crate) fn decide(
    store: &mut SqliteStore,
    application_id: &str,
    stage: Stage,
    review_role: Option<OfficerRole>,
    officer_id: &str,
    decision: Decision,
    now_ms: i64,
) -> Result<TransitionResult, StoreError> {
    store.transition(TransitionRequest {
        application_id: application_id.to_string(),
        stage,
        review_role,
        decision,
        officer_id: officer_id.to_string(),
        comments: None,
        now_ms,
    })
}

pub(crate) fn approve(
    store: &mut SqliteStore,
    application_id: &str,
    stage: Stage,
    officer_id: &str,
    now_ms: i64,
) -> TransitionResult {
    decide(store, application_id, stage, None, officer_id, Decision::Approved, now_ms)
        .expect("approve stage")
}

pub(crate) fn issue_otp(
    store: &mut SqliteStore,
    application_id: &str,
    stage: Stage,
    officer_id: &str,
    now_ms: i64,
) -> String {
    store
        .generate_otp(OtpGenerateRequest {
            application_id: application_id.to_string(),
            stage,
            officer_id: officer_id.to_string(),
            now_ms,
        })
        .expect("generate otp")
        .otp_code
}

pub(crate) fn apply(
    store: &mut SqliteStore,
    hsm: &dyn HsmClient,
    application_id: &str,
    stage: Stage,
    officer_id: &str,
    otp_code: &str,
    now_ms: i64,
) -> Result<SignatureApplyResult, StoreError> {
    store.apply_signature(
        SignatureApplyRequest {
            application_id: application_id.to_string(),
            stage,
            officer_id: officer_id.to_string(),
            otp_code: otp_code.to_string(),
            document_path: Some(format!("certificates/{application_id}.pdf")),
            now_ms,
        },
        hsm,
    )
}

/// A code that differs from `code`.
pub(crate) fn wrong_code(code: &str) -> String {
    if code == "000000" {
        "111111".to_string()
    } else {
        "000000".to_string()
    }
}

/// Scripted HSM: fails with `Unavailable` for the first `unavailable_calls` calls, then
/// signs (or rejects when `reject` is set).
#[derive(Default)]
pub(crate) struct FakeHsm {
    pub(crate) unavailable_calls: u32,
    pub(crate) reject: bool,
    pub(crate) calls: Cell<u32>,
}

impl FakeHsm {
    pub(crate) fn healthy() -> Self {
        Self::default()
    }

    pub(crate) fn flaky(unavailable_calls: u32) -> Self {
        Self {
            unavailable_calls,
            ..Self::default()
        }
    }
}

impl HsmClient for FakeHsm {
    fn sign(&self, request: &HsmSignRequest<'_>) -> Result<HsmReceipt, HsmError> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if call <= self.unavailable_calls {
            return Err(HsmError::Unavailable("connection refused".to_string()));
        }
        if self.reject {
            return Err(HsmError::Rejected("key disabled".to_string()));
        }
        Ok(HsmReceipt {
            transaction_id: format!("hsm-{}-{call}", request.signature_id),
            signed_document_path: format!("signed/{}.pdf", request.application_id),
        })
    }
}

/// Drives a structural engineer application from submission to the first signing stage.
pub(crate) fn advance_to_ee_sign(store: &mut SqliteStore, application_id: &str) {
    create_and_submit(store, application_id, PositionType::StructuralEngineer, T0);
    approve(store, application_id, Stage::JeReview, "je-1", T0 + 1);
    approve(store, application_id, Stage::AeReview, "ae-struct-1", T0 + 2);
    approve(store, application_id, Stage::EeReview, "ee-1", T0 + 3);
    approve(store, application_id, Stage::CeReview, "ce-1", T0 + 4);
    approve(store, application_id, Stage::ClerkProcessing, "clerk-1", T0 + 5);
}
