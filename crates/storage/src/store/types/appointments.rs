#![forbid(unsafe_code)]

use pm_core::AppointmentStatus;

#[derive(Clone, Debug)]
pub struct AppointmentRow {
    pub appointment_id: i64,
    pub application_id: String,
    pub scheduled_by: String,
    pub scheduled_at_ms: i64,
    pub place: String,
    pub status: AppointmentStatus,
    pub rescheduled_to_id: Option<i64>,
    pub completion_notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub reminder_sent: bool,
    pub reminder_sent_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct AppointmentScheduleRequest {
    pub application_id: String,
    pub officer_id: String,
    pub scheduled_at_ms: i64,
    pub place: String,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct AppointmentCompleteRequest {
    pub appointment_id: i64,
    pub notes: Option<String>,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct AppointmentCancelRequest {
    pub appointment_id: i64,
    pub reason: String,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct AppointmentRescheduleRequest {
    pub appointment_id: i64,
    pub scheduled_at_ms: i64,
    /// Keeps the previous place when `None`.
    pub place: Option<String>,
    pub now_ms: i64,
}

#[derive(Clone, Debug)]
pub struct AppointmentRescheduleResult {
    pub previous: AppointmentRow,
    pub appointment: AppointmentRow,
}
