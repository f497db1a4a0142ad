#![forbid(unsafe_code)]

use super::applications::load_application_tx;
use super::assignment::{SlotKey, authorize_assignee_tx};
use super::support::{bool_col, enum_col, insert_event_tx};
use super::{
    AppointmentCancelRequest, AppointmentCompleteRequest, AppointmentRescheduleRequest,
    AppointmentRescheduleResult, AppointmentRow, AppointmentScheduleRequest, SqliteStore,
    StoreError, canonicalize_application, canonicalize_officer, map_insert_conflict, require_text,
    write_tx,
};
use pm_core::{AppointmentStatus, OfficerRole, Stage};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::json;

const APPOINTMENT_COLUMNS: &str = "appointment_id, application_id, scheduled_by, scheduled_at_ms, \
     place, status, rescheduled_to_id, completion_notes, cancel_reason, reminder_sent, \
     reminder_sent_at_ms, created_at_ms, updated_at_ms";

impl SqliteStore {
    /// Books the in-person document review. Only the assigned Junior Engineer may book,
    /// and only while the application sits at JE review.
    pub fn appointment_schedule(
        &mut self,
        request: AppointmentScheduleRequest,
    ) -> Result<AppointmentRow, StoreError> {
        let application_id = canonicalize_application(&request.application_id)?;
        let officer_id = canonicalize_officer(&request.officer_id)?;
        let place = require_text(&request.place, "place must not be empty")?;

        let tx = write_tx(&mut self.conn)?;
        let application = load_application_tx(&tx, &application_id)?;
        if application.current_stage != Stage::JeReview {
            return Err(StoreError::StaleState {
                application_id,
                requested: Stage::JeReview,
                current: application.current_stage,
            });
        }
        let slot = SlotKey::new(&application, Stage::JeReview, OfficerRole::JuniorEngineer);
        authorize_assignee_tx(&tx, &slot, &officer_id)?;

        if let Some(active) = active_appointment_tx(&tx, &application_id)? {
            return Err(StoreError::AppointmentConflict {
                application_id,
                active_appointment_id: active.appointment_id,
            });
        }

        let appointment_id = insert_appointment_tx(
            &tx,
            &application_id,
            &officer_id,
            request.scheduled_at_ms,
            &place,
            request.now_ms,
        )?;
        insert_event_tx(
            &tx,
            request.now_ms,
            Some(&application_id),
            "appointment_scheduled",
            &json!({
                "appointment_id": appointment_id,
                "officer_id": officer_id,
                "scheduled_at_ms": request.scheduled_at_ms,
                "place": place,
            }),
        )?;
        let appointment = load_appointment_tx(&tx, appointment_id)?;
        tx.commit()?;

        tracing::info!(application_id = %application_id, appointment_id, "appointment scheduled");
        Ok(appointment)
    }

    pub fn appointment_confirm(
        &mut self,
        appointment_id: i64,
        now_ms: i64,
    ) -> Result<AppointmentRow, StoreError> {
        let tx = write_tx(&mut self.conn)?;
        let current = load_appointment_tx(&tx, appointment_id)?;
        require_move(&current, AppointmentStatus::Confirmed)?;
        tx.execute(
            "UPDATE appointments SET status=?2, updated_at_ms=?3 WHERE appointment_id=?1",
            params![appointment_id, AppointmentStatus::Confirmed.as_str(), now_ms],
        )?;
        insert_event_tx(
            &tx,
            now_ms,
            Some(&current.application_id),
            "appointment_confirmed",
            &json!({ "appointment_id": appointment_id }),
        )?;
        let appointment = load_appointment_tx(&tx, appointment_id)?;
        tx.commit()?;
        Ok(appointment)
    }

    pub fn appointment_complete(
        &mut self,
        request: AppointmentCompleteRequest,
    ) -> Result<AppointmentRow, StoreError> {
        let notes = request
            .notes
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let tx = write_tx(&mut self.conn)?;
        let current = load_appointment_tx(&tx, request.appointment_id)?;
        require_move(&current, AppointmentStatus::Completed)?;
        tx.execute(
            r#"
            UPDATE appointments SET status=?2, completion_notes=?3, updated_at_ms=?4
            WHERE appointment_id=?1
            "#,
            params![
                request.appointment_id,
                AppointmentStatus::Completed.as_str(),
                notes,
                request.now_ms,
            ],
        )?;
        insert_event_tx(
            &tx,
            request.now_ms,
            Some(&current.application_id),
            "appointment_completed",
            &json!({ "appointment_id": request.appointment_id }),
        )?;
        let appointment = load_appointment_tx(&tx, request.appointment_id)?;
        tx.commit()?;
        Ok(appointment)
    }

    pub fn appointment_cancel(
        &mut self,
        request: AppointmentCancelRequest,
    ) -> Result<AppointmentRow, StoreError> {
        let reason = require_text(&request.reason, "cancel reason must not be empty")?;

        let tx = write_tx(&mut self.conn)?;
        let current = load_appointment_tx(&tx, request.appointment_id)?;
        require_move(&current, AppointmentStatus::Cancelled)?;
        tx.execute(
            r#"
            UPDATE appointments SET status=?2, cancel_reason=?3, updated_at_ms=?4
            WHERE appointment_id=?1
            "#,
            params![
                request.appointment_id,
                AppointmentStatus::Cancelled.as_str(),
                reason,
                request.now_ms,
            ],
        )?;
        insert_event_tx(
            &tx,
            request.now_ms,
            Some(&current.application_id),
            "appointment_cancelled",
            &json!({ "appointment_id": request.appointment_id, "reason": reason }),
        )?;
        let appointment = load_appointment_tx(&tx, request.appointment_id)?;
        tx.commit()?;

        tracing::info!(appointment_id = request.appointment_id, "appointment cancelled");
        Ok(appointment)
    }

    /// Replaces an active appointment with a new Scheduled one and links the old record to
    /// it. Both writes land in one transaction.
    pub fn appointment_reschedule(
        &mut self,
        request: AppointmentRescheduleRequest,
    ) -> Result<AppointmentRescheduleResult, StoreError> {
        let place = request
            .place
            .as_deref()
            .map(|value| require_text(value, "place must not be empty"))
            .transpose()?;

        let tx = write_tx(&mut self.conn)?;
        let current = load_appointment_tx(&tx, request.appointment_id)?;
        require_move(&current, AppointmentStatus::Rescheduled)?;

        // The old row leaves the active set first so the one-active index admits the new row.
        tx.execute(
            "UPDATE appointments SET status=?2, updated_at_ms=?3 WHERE appointment_id=?1",
            params![
                request.appointment_id,
                AppointmentStatus::Rescheduled.as_str(),
                request.now_ms,
            ],
        )?;
        let place = place.unwrap_or_else(|| current.place.clone());
        let new_id = insert_appointment_tx(
            &tx,
            &current.application_id,
            &current.scheduled_by,
            request.scheduled_at_ms,
            &place,
            request.now_ms,
        )?;
        tx.execute(
            "UPDATE appointments SET rescheduled_to_id=?2 WHERE appointment_id=?1",
            params![request.appointment_id, new_id],
        )?;
        insert_event_tx(
            &tx,
            request.now_ms,
            Some(&current.application_id),
            "appointment_rescheduled",
            &json!({
                "appointment_id": request.appointment_id,
                "rescheduled_to_id": new_id,
                "scheduled_at_ms": request.scheduled_at_ms,
            }),
        )?;
        let previous = load_appointment_tx(&tx, request.appointment_id)?;
        let appointment = load_appointment_tx(&tx, new_id)?;
        tx.commit()?;

        tracing::info!(
            appointment_id = request.appointment_id,
            rescheduled_to_id = new_id,
            "appointment rescheduled"
        );
        Ok(AppointmentRescheduleResult {
            previous,
            appointment,
        })
    }

    /// Sets the reminder flag once. Delivery belongs to the notifier.
    pub fn appointment_mark_reminder_sent(
        &mut self,
        appointment_id: i64,
        now_ms: i64,
    ) -> Result<AppointmentRow, StoreError> {
        let tx = write_tx(&mut self.conn)?;
        let current = load_appointment_tx(&tx, appointment_id)?;
        if !current.status.is_active() {
            return Err(StoreError::InvalidAppointmentTransition {
                appointment_id,
                from: current.status.as_str(),
                to: "reminder_sent",
            });
        }
        let changed = tx.execute(
            r#"
            UPDATE appointments SET reminder_sent=1, reminder_sent_at_ms=?2, updated_at_ms=?2
            WHERE appointment_id=?1 AND reminder_sent=0
            "#,
            params![appointment_id, now_ms],
        )?;
        if changed == 0 {
            return Err(StoreError::ReminderAlreadySent { appointment_id });
        }
        insert_event_tx(
            &tx,
            now_ms,
            Some(&current.application_id),
            "appointment_reminder_sent",
            &json!({ "appointment_id": appointment_id }),
        )?;
        let appointment = load_appointment_tx(&tx, appointment_id)?;
        tx.commit()?;
        Ok(appointment)
    }

    pub fn appointment_get(&self, appointment_id: i64) -> Result<AppointmentRow, StoreError> {
        load_appointment_tx(&self.conn, appointment_id)
    }

    pub fn appointments_for(
        &self,
        application_id: &str,
    ) -> Result<Vec<AppointmentRow>, StoreError> {
        let application_id = canonicalize_application(application_id)?;
        load_application_tx(&self.conn, &application_id)?;
        appointments_for_application_tx(&self.conn, &application_id)
    }
}

fn require_move(current: &AppointmentRow, next: AppointmentStatus) -> Result<(), StoreError> {
    if current.status.can_transition_to(next) {
        return Ok(());
    }
    Err(StoreError::InvalidAppointmentTransition {
        appointment_id: current.appointment_id,
        from: current.status.as_str(),
        to: next.as_str(),
    })
}

fn insert_appointment_tx(
    conn: &Connection,
    application_id: &str,
    scheduled_by: &str,
    scheduled_at_ms: i64,
    place: &str,
    now_ms: i64,
) -> Result<i64, StoreError> {
    conn.execute(
        r#"
        INSERT INTO appointments(application_id, scheduled_by, scheduled_at_ms, place, status,
                                 reminder_sent, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
        "#,
        params![
            application_id,
            scheduled_by,
            scheduled_at_ms,
            place,
            AppointmentStatus::Scheduled.as_str(),
            now_ms,
        ],
    )
    .map_err(|err| {
        let active_appointment_id = active_appointment_tx(conn, application_id)
            .ok()
            .flatten()
            .map_or(0, |row| row.appointment_id);
        map_insert_conflict(
            err,
            StoreError::AppointmentConflict {
                application_id: application_id.to_string(),
                active_appointment_id,
            },
        )
    })?;
    Ok(conn.last_insert_rowid())
}

/// Cancels the application's live appointment, if any, with `reason`. Returns the
/// cancelled appointment id.
pub(super) fn cancel_active_appointment_tx(
    conn: &Connection,
    application_id: &str,
    reason: &str,
    now_ms: i64,
) -> Result<Option<i64>, StoreError> {
    let Some(active) = active_appointment_tx(conn, application_id)? else {
        return Ok(None);
    };
    conn.execute(
        r#"
        UPDATE appointments SET status=?2, cancel_reason=?3, updated_at_ms=?4
        WHERE appointment_id=?1
        "#,
        params![
            active.appointment_id,
            AppointmentStatus::Cancelled.as_str(),
            reason,
            now_ms,
        ],
    )?;
    insert_event_tx(
        conn,
        now_ms,
        Some(application_id),
        "appointment_cancelled",
        &json!({ "appointment_id": active.appointment_id, "reason": reason }),
    )?;
    Ok(Some(active.appointment_id))
}

fn active_appointment_tx(
    conn: &Connection,
    application_id: &str,
) -> Result<Option<AppointmentRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                 WHERE application_id=?1 AND status IN ('scheduled', 'confirmed')"
            ),
            params![application_id],
            appointment_from_row,
        )
        .optional()?)
}

fn load_appointment_tx(
    conn: &Connection,
    appointment_id: i64,
) -> Result<AppointmentRow, StoreError> {
    conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE appointment_id=?1"),
        params![appointment_id],
        appointment_from_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

pub(super) fn appointments_for_application_tx(
    conn: &Connection,
    application_id: &str,
) -> Result<Vec<AppointmentRow>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
         WHERE application_id=?1 ORDER BY appointment_id ASC"
    ))?;
    let rows = stmt.query_map(params![application_id], appointment_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        appointment_id: row.get(0)?,
        application_id: row.get(1)?,
        scheduled_by: row.get(2)?,
        scheduled_at_ms: row.get(3)?,
        place: row.get(4)?,
        status: enum_col(row, 5, AppointmentStatus::parse)?,
        rescheduled_to_id: row.get(6)?,
        completion_notes: row.get(7)?,
        cancel_reason: row.get(8)?,
        reminder_sent: bool_col(row, 9)?,
        reminder_sent_at_ms: row.get(10)?,
        created_at_ms: row.get(11)?,
        updated_at_ms: row.get(12)?,
    })
}
