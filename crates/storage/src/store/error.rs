#![forbid(unsafe_code)]

use pm_core::{OfficerRole, Stage};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("unknown id")]
    UnknownId,
    #[error("revision mismatch (expected={expected}, actual={actual})")]
    RevisionMismatch { expected: i64, actual: i64 },
    #[error(
        "stale state (application={application_id}, requested={}, current={})",
        .requested.as_str(),
        .current.as_str()
    )]
    StaleState {
        application_id: String,
        requested: Stage,
        current: Stage,
    },
    #[error(
        "unauthorized role (officer={officer_id}, stage={}, required={})",
        .stage.as_str(),
        .required.as_str()
    )]
    UnauthorizedRole {
        officer_id: String,
        stage: Stage,
        required: OfficerRole,
    },
    #[error(
        "already assigned (application={application_id}, stage={}, officer={officer_id})",
        .stage.as_str()
    )]
    AlreadyAssigned {
        application_id: String,
        stage: Stage,
        officer_id: String,
    },
    #[error(
        "no eligible officer (application={application_id}, stage={}, role={})",
        .stage.as_str(),
        .role.as_str()
    )]
    NoEligibleOfficer {
        application_id: String,
        stage: Stage,
        role: OfficerRole,
    },
    #[error("appointment conflict (application={application_id}, active={active_appointment_id})")]
    AppointmentConflict {
        application_id: String,
        active_appointment_id: i64,
    },
    #[error("invalid appointment transition (appointment={appointment_id}, from={from}, to={to})")]
    InvalidAppointmentTransition {
        appointment_id: i64,
        from: &'static str,
        to: &'static str,
    },
    #[error("reminder already sent (appointment={appointment_id})")]
    ReminderAlreadySent { appointment_id: i64 },
    #[error("otp already issued (signature={signature_id}, expires_at_ms={expires_at_ms})")]
    OtpAlreadyIssued {
        signature_id: i64,
        expires_at_ms: i64,
    },
    #[error("otp expired (signature={signature_id})")]
    OtpExpired { signature_id: i64 },
    #[error("otp attempts exceeded (signature={signature_id}, retry_after_ms={retry_after_ms})")]
    OtpAttemptsExceeded {
        signature_id: i64,
        retry_after_ms: i64,
    },
    #[error("already signed (signature={signature_id})")]
    AlreadySigned { signature_id: i64 },
    #[error(
        "signature required (application={application_id}, stage={})",
        .stage.as_str()
    )]
    SignatureRequired {
        application_id: String,
        stage: Stage,
    },
    #[error("hsm unavailable after {attempts} attempt(s): {detail}")]
    HsmUnavailable { attempts: u32, detail: String },
    #[error("hsm refused to sign: {detail}")]
    HsmRejected { detail: String },
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQL",
            Self::InvalidInput(message) if message.starts_with("RESET_REQUIRED") => {
                "RESET_REQUIRED"
            }
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::UnknownId => "UNKNOWN_ID",
            Self::RevisionMismatch { .. } => "REVISION_MISMATCH",
            Self::StaleState { .. } => "STALE_STATE",
            Self::UnauthorizedRole { .. } => "UNAUTHORIZED_ROLE",
            Self::AlreadyAssigned { .. } => "ALREADY_ASSIGNED",
            Self::NoEligibleOfficer { .. } => "NO_ELIGIBLE_OFFICER",
            Self::AppointmentConflict { .. } => "APPOINTMENT_CONFLICT",
            Self::InvalidAppointmentTransition { .. } => "INVALID_APPOINTMENT_TRANSITION",
            Self::ReminderAlreadySent { .. } => "REMINDER_ALREADY_SENT",
            Self::OtpAlreadyIssued { .. } => "OTP_ALREADY_ISSUED",
            Self::OtpExpired { .. } => "OTP_EXPIRED",
            Self::OtpAttemptsExceeded { .. } => "OTP_ATTEMPTS_EXCEEDED",
            Self::AlreadySigned { .. } => "ALREADY_SIGNED",
            Self::SignatureRequired { .. } => "SIGNATURE_REQUIRED",
            Self::HsmUnavailable { .. } => "HSM_UNAVAILABLE",
            Self::HsmRejected { .. } => "HSM_REJECTED",
        }
    }

    /// Status the HTTP controller layer answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Io(_) | Self::Sql(_) => 500,
            Self::InvalidInput(_) => 400,
            Self::UnknownId => 404,
            Self::UnauthorizedRole { .. } => 403,
            Self::HsmUnavailable { .. } => 503,
            Self::HsmRejected { .. } => 502,
            Self::OtpExpired { .. } => 410,
            Self::OtpAttemptsExceeded { .. } => 429,
            Self::SignatureRequired { .. } => 412,
            Self::NoEligibleOfficer { .. } => 422,
            Self::RevisionMismatch { .. }
            | Self::StaleState { .. }
            | Self::AlreadyAssigned { .. }
            | Self::AppointmentConflict { .. }
            | Self::InvalidAppointmentTransition { .. }
            | Self::ReminderAlreadySent { .. }
            | Self::OtpAlreadyIssued { .. }
            | Self::AlreadySigned { .. } => 409,
        }
    }

    /// Whether the same request may succeed after the caller refetches or waits.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::StaleState { .. }
                | Self::RevisionMismatch { .. }
                | Self::OtpExpired { .. }
                | Self::OtpAttemptsExceeded { .. }
                | Self::HsmUnavailable { .. }
        )
    }
}
