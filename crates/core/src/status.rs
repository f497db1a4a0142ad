#![forbid(unsafe_code)]

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rescheduled => "rescheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "rescheduled" => Some(AppointmentStatus::Rescheduled),
            _ => None,
        }
    }

    /// Scheduled and Confirmed appointments block a new booking for the same application.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
        )
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        match (self, next) {
            (AppointmentStatus::Scheduled, AppointmentStatus::Confirmed) => true,
            (
                AppointmentStatus::Scheduled | AppointmentStatus::Confirmed,
                AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::Rescheduled,
            ) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignatureStatus {
    Pending,
    OtpIssued,
    Signed,
    Failed,
}

impl SignatureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureStatus::Pending => "pending",
            SignatureStatus::OtpIssued => "otp_issued",
            SignatureStatus::Signed => "signed",
            SignatureStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(SignatureStatus::Pending),
            "otp_issued" => Some(SignatureStatus::OtpIssued),
            "signed" => Some(SignatureStatus::Signed),
            "failed" => Some(SignatureStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SignatureStatus::Signed | SignatureStatus::Failed)
    }

    /// `OtpIssued -> Pending` is the expiry path; a reissue moves the record forward again.
    pub fn can_transition_to(self, next: SignatureStatus) -> bool {
        matches!(
            (self, next),
            (SignatureStatus::Pending, SignatureStatus::OtpIssued)
                | (SignatureStatus::OtpIssued, SignatureStatus::Signed)
                | (SignatureStatus::OtpIssued, SignatureStatus::Failed)
                | (SignatureStatus::OtpIssued, SignatureStatus::Pending)
        )
    }
}
