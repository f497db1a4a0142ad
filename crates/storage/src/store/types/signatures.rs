#![forbid(unsafe_code)]

use pm_core::{SignatureStatus, Stage};

#[derive(Clone, Debug)]
pub struct SignatureRow {
    pub signature_id: i64,
    pub application_id: String,
    pub stage: Stage,
    pub attempt: i64,
    pub officer_id: String,
    pub status: SignatureStatus,
    pub otp_expires_at_ms: Option<i64>,
    pub otp_attempts: i64,
    pub hsm_transaction_id: Option<String>,
    pub signed_document_path: Option<String>,
    pub failure_reason: Option<String>,
    pub failed_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct OtpGenerateRequest {
    pub application_id: String,
    pub stage: Stage,
    pub officer_id: String,
    pub now_ms: i64,
}

/// The plaintext code is handed to the notifier once; only its digest is persisted.
#[derive(Clone, Debug)]
pub struct OtpIssue {
    pub record: SignatureRow,
    pub otp_code: String,
}

#[derive(Clone, Debug)]
pub struct SignatureApplyRequest {
    pub application_id: String,
    pub stage: Stage,
    pub officer_id: String,
    pub otp_code: String,
    /// Path of the unsigned document as known to the document store.
    pub document_path: Option<String>,
    pub now_ms: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureOutcome {
    Signed,
    Mismatch { attempts_remaining: i64 },
    Failed,
}

impl SignatureOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureOutcome::Signed => "signed",
            SignatureOutcome::Mismatch { .. } => "mismatch",
            SignatureOutcome::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SignatureApplyResult {
    pub record: SignatureRow,
    pub outcome: SignatureOutcome,
}
