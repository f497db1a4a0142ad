#![forbid(unsafe_code)]

use super::assignment::open_stage_tx;
use super::support::{enum_col, insert_event_tx, opt_enum_col};
use super::{
    ApplicationCreateRequest, ApplicationResubmitRequest, ApplicationRow,
    ApplicationSubmitRequest, SqliteStore, StageEntryResult, StoreError, canonicalize_application,
    map_insert_conflict, require_text, write_tx,
};
use pm_core::{PositionType, Stage};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::json;

const APPLICATION_COLUMNS: &str = "application_id, position_type, applicant_name, current_stage, \
     rejected_at_stage, attempt, revision, created_at_ms, updated_at_ms";

impl SqliteStore {
    pub fn create_application(
        &mut self,
        request: ApplicationCreateRequest,
    ) -> Result<ApplicationRow, StoreError> {
        let application_id = canonicalize_application(&request.application_id)?;
        let applicant_name =
            require_text(&request.applicant_name, "applicant_name must not be empty")?;

        let tx = write_tx(&mut self.conn)?;
        tx.execute(
            r#"
            INSERT INTO position_applications(
              application_id, position_type, applicant_name, current_stage, rejected_at_stage,
              attempt, revision, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, NULL, 1, 0, ?5, ?5)
            "#,
            params![
                application_id,
                request.position_type.as_str(),
                applicant_name,
                Stage::Submitted.as_str(),
                request.now_ms,
            ],
        )
        .map_err(|err| {
            map_insert_conflict(err, StoreError::InvalidInput("application already exists"))
        })?;
        insert_event_tx(
            &tx,
            request.now_ms,
            Some(&application_id),
            "application_created",
            &json!({ "position_type": request.position_type.as_str() }),
        )?;
        let application = load_application_tx(&tx, &application_id)?;
        tx.commit()?;

        tracing::info!(
            application_id = %application.application_id,
            position_type = application.position_type.as_str(),
            "application created"
        );
        Ok(application)
    }

    pub fn get_application(&self, application_id: &str) -> Result<ApplicationRow, StoreError> {
        let application_id = canonicalize_application(application_id)?;
        load_application_tx(&self.conn, &application_id)
    }

    /// Hands a paid application to Junior Engineer review.
    pub fn submit_application(
        &mut self,
        request: ApplicationSubmitRequest,
    ) -> Result<StageEntryResult, StoreError> {
        let application_id = canonicalize_application(&request.application_id)?;
        let cas_retries = self.policy.round_robin_cas_retries;

        let tx = write_tx(&mut self.conn)?;
        let application = load_application_tx(&tx, &application_id)?;
        if application.current_stage != Stage::Submitted {
            return Err(StoreError::StaleState {
                application_id,
                requested: Stage::Submitted,
                current: application.current_stage,
            });
        }

        set_stage_tx(
            &tx,
            &application,
            Stage::JeReview,
            None,
            application.attempt,
            request.now_ms,
        )?;
        insert_event_tx(
            &tx,
            request.now_ms,
            Some(&application_id),
            "application_submitted",
            &json!({ "stage": Stage::JeReview.as_str(), "attempt": application.attempt }),
        )?;
        let application = load_application_tx(&tx, &application_id)?;
        let assignments =
            open_stage_tx(&tx, &application, Stage::JeReview, request.now_ms, cas_retries)?;
        tx.commit()?;

        tracing::info!(application_id = %application_id, "application submitted");
        Ok(StageEntryResult {
            application,
            assignments,
        })
    }

    /// Restarts a rejected application at Junior Engineer review under a new attempt.
    /// Earlier outcomes stay in the ledger under their own attempt number.
    pub fn resubmit_application(
        &mut self,
        request: ApplicationResubmitRequest,
    ) -> Result<StageEntryResult, StoreError> {
        let application_id = canonicalize_application(&request.application_id)?;
        let cas_retries = self.policy.round_robin_cas_retries;

        let tx = write_tx(&mut self.conn)?;
        let application = load_application_tx(&tx, &application_id)?;
        if application.current_stage != Stage::Rejected {
            return Err(StoreError::StaleState {
                application_id,
                requested: Stage::Rejected,
                current: application.current_stage,
            });
        }

        let attempt = application.attempt + 1;
        set_stage_tx(&tx, &application, Stage::JeReview, None, attempt, request.now_ms)?;
        insert_event_tx(
            &tx,
            request.now_ms,
            Some(&application_id),
            "application_resubmitted",
            &json!({ "stage": Stage::JeReview.as_str(), "attempt": attempt }),
        )?;
        let application = load_application_tx(&tx, &application_id)?;
        let assignments =
            open_stage_tx(&tx, &application, Stage::JeReview, request.now_ms, cas_retries)?;
        tx.commit()?;

        tracing::info!(application_id = %application_id, attempt, "application resubmitted");
        Ok(StageEntryResult {
            application,
            assignments,
        })
    }
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<ApplicationRow> {
    Ok(ApplicationRow {
        application_id: row.get(0)?,
        position_type: enum_col(row, 1, PositionType::parse)?,
        applicant_name: row.get(2)?,
        current_stage: enum_col(row, 3, Stage::parse)?,
        rejected_at_stage: opt_enum_col(row, 4, Stage::parse)?,
        attempt: row.get(5)?,
        revision: row.get(6)?,
        created_at_ms: row.get(7)?,
        updated_at_ms: row.get(8)?,
    })
}

pub(super) fn load_application_tx(
    conn: &Connection,
    application_id: &str,
) -> Result<ApplicationRow, StoreError> {
    conn.query_row(
        &format!("SELECT {APPLICATION_COLUMNS} FROM position_applications WHERE application_id=?1"),
        params![application_id],
        application_from_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

/// Moves `current_stage` under a revision compare-and-swap against the row the caller read.
pub(super) fn set_stage_tx(
    conn: &Connection,
    application: &ApplicationRow,
    next: Stage,
    rejected_at: Option<Stage>,
    attempt: i64,
    now_ms: i64,
) -> Result<(), StoreError> {
    if !pm_core::pipeline::is_legal_edge(application.current_stage, next) {
        return Err(StoreError::StaleState {
            application_id: application.application_id.clone(),
            requested: next,
            current: application.current_stage,
        });
    }

    let changed = conn.execute(
        r#"
        UPDATE position_applications
        SET current_stage=?3, rejected_at_stage=?4, attempt=?5, revision=revision + 1,
            updated_at_ms=?6
        WHERE application_id=?1 AND revision=?2
        "#,
        params![
            application.application_id,
            application.revision,
            next.as_str(),
            rejected_at.map(Stage::as_str),
            attempt,
            now_ms,
        ],
    )?;
    if changed == 0 {
        let actual = conn.query_row(
            "SELECT revision FROM position_applications WHERE application_id=?1",
            params![application.application_id],
            |row| row.get::<_, i64>(0),
        )?;
        return Err(StoreError::RevisionMismatch {
            expected: application.revision,
            actual,
        });
    }
    Ok(())
}
