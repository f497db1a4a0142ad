#![forbid(unsafe_code)]

use super::applications::{load_application_tx, set_stage_tx};
use super::appointments::{appointments_for_application_tx, cancel_active_appointment_tx};
use super::assignment::{
    SlotKey, active_assignment_tx, assignments_for_application_tx, authorize_assignee_tx,
    close_open_slots_tx, open_stage_tx, resolve_review_role,
};
use super::signatures::{signatures_for_application_tx, signed_signature_id_tx};
use super::support::{bool_col, enum_col, insert_event_tx};
use super::{
    ReviewSlotRow, SlotStatus, SqliteStore, StageHistory, StageOutcomeRow, StoreError,
    TransitionRequest, TransitionResult, WorkflowStatus, canonicalize_application,
    canonicalize_officer, write_tx,
};
use pm_core::pipeline::{
    StageResolution, is_signature_gated, next_stage, pending_action, progress_percent,
    resolve_slots, review_roles,
};
use pm_core::{Decision, OfficerRole, Stage};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::json;

const APPOINTMENT_CANCEL_ON_REJECT: &str = "application_rejected";

const OUTCOME_COLUMNS: &str = "seq, application_id, stage, review_role, attempt, decision, \
     officer_id, comments, signature_id, decided_at_ms";

impl SqliteStore {
    /// Records one reviewer's decision and advances or rejects the application when the
    /// stage resolves. The whole step is one write transaction.
    pub fn transition(
        &mut self,
        request: TransitionRequest,
    ) -> Result<TransitionResult, StoreError> {
        let application_id = canonicalize_application(&request.application_id)?;
        let officer_id = canonicalize_officer(&request.officer_id)?;
        if !request.decision.is_final() {
            return Err(StoreError::InvalidInput("decision must be approved or rejected"));
        }
        let comments = request
            .comments
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let cas_retries = self.policy.round_robin_cas_retries;

        let tx = write_tx(&mut self.conn)?;
        let application = load_application_tx(&tx, &application_id)?;
        if application.current_stage != request.stage {
            return Err(StoreError::StaleState {
                application_id,
                requested: request.stage,
                current: application.current_stage,
            });
        }

        let role =
            resolve_review_role(application.position_type, request.stage, request.review_role)?;
        let slot = SlotKey::new(&application, request.stage, role);
        authorize_assignee_tx(&tx, &slot, &officer_id)?;

        if slot_decision_tx(&tx, &slot)?.is_final() {
            return Err(StoreError::StaleState {
                application_id,
                requested: request.stage,
                current: application.current_stage,
            });
        }

        let needs_signature =
            request.decision == Decision::Approved && is_signature_gated(request.stage);
        let signature_id = if needs_signature {
            let Some(signature_id) = signed_signature_id_tx(&tx, &slot, &officer_id)? else {
                return Err(StoreError::SignatureRequired {
                    application_id,
                    stage: request.stage,
                });
            };
            Some(signature_id)
        } else {
            None
        };

        tx.execute(
            r#"
            INSERT INTO stage_outcomes(application_id, stage, review_role, attempt, decision,
                                       officer_id, comments, signature_id, decided_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                slot.application_id,
                slot.stage.as_str(),
                slot.review_role.as_str(),
                slot.attempt,
                request.decision.as_str(),
                officer_id,
                comments,
                signature_id,
                request.now_ms,
            ],
        )?;
        let outcome_seq = tx.last_insert_rowid();
        tx.execute(
            r#"
            UPDATE review_slots SET resolved_at_ms=?5
            WHERE application_id=?1 AND stage=?2 AND review_role=?3 AND attempt=?4
            "#,
            params![
                slot.application_id,
                slot.stage.as_str(),
                slot.review_role.as_str(),
                slot.attempt,
                request.now_ms,
            ],
        )?;
        insert_event_tx(
            &tx,
            request.now_ms,
            Some(&application_id),
            "stage_decision",
            &json!({
                "stage": slot.stage.as_str(),
                "review_role": slot.review_role.as_str(),
                "attempt": slot.attempt,
                "decision": request.decision.as_str(),
                "officer_id": officer_id,
                "signature_id": signature_id,
            }),
        )?;

        let decisions = review_roles(application.position_type, request.stage)
            .into_iter()
            .map(|role| slot_decision_tx(&tx, &SlotKey::new(&application, request.stage, role)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut stage_advanced = false;
        let mut assignments = Vec::new();
        match resolve_slots(&decisions) {
            StageResolution::Pending => {}
            StageResolution::Rejected => {
                close_open_slots_tx(
                    &tx,
                    &application_id,
                    request.stage,
                    application.attempt,
                    request.now_ms,
                )?;
                set_stage_tx(
                    &tx,
                    &application,
                    Stage::Rejected,
                    Some(request.stage),
                    application.attempt,
                    request.now_ms,
                )?;
                cancel_active_appointment_tx(
                    &tx,
                    &application_id,
                    APPOINTMENT_CANCEL_ON_REJECT,
                    request.now_ms,
                )?;
                insert_event_tx(
                    &tx,
                    request.now_ms,
                    Some(&application_id),
                    "application_rejected",
                    &json!({ "stage": request.stage.as_str(), "attempt": application.attempt }),
                )?;
                tracing::info!(
                    application_id = %application_id,
                    stage = request.stage.as_str(),
                    "application rejected"
                );
            }
            StageResolution::Approved => {
                let next = next_stage(request.stage).ok_or(StoreError::InvalidInput(
                    "stage has no successor",
                ))?;
                set_stage_tx(&tx, &application, next, None, application.attempt, request.now_ms)?;
                stage_advanced = true;
                insert_event_tx(
                    &tx,
                    request.now_ms,
                    Some(&application_id),
                    "stage_advanced",
                    &json!({ "from": request.stage.as_str(), "to": next.as_str() }),
                )?;
                tracing::info!(
                    application_id = %application_id,
                    from = request.stage.as_str(),
                    to = next.as_str(),
                    "stage advanced"
                );
                if next.is_review() {
                    let advanced = load_application_tx(&tx, &application_id)?;
                    assignments = open_stage_tx(&tx, &advanced, next, request.now_ms, cas_retries)?;
                }
            }
        }

        let outcome = load_outcome_tx(&tx, outcome_seq)?;
        let application = load_application_tx(&tx, &application_id)?;
        tx.commit()?;

        Ok(TransitionResult {
            outcome,
            application,
            stage_advanced,
            assignments,
        })
    }

    pub fn workflow_status(&self, application_id: &str) -> Result<WorkflowStatus, StoreError> {
        let application_id = canonicalize_application(application_id)?;
        let application = load_application_tx(&self.conn, &application_id)?;

        let mut slots = Vec::new();
        for slot in open_slots_for_application_tx(&self.conn, &application_id)? {
            let key = SlotKey {
                application_id: slot.application_id.clone(),
                stage: slot.stage,
                review_role: slot.review_role,
                attempt: slot.attempt,
            };
            let assignee = active_assignment_tx(&self.conn, &key)?.map(|row| row.officer_id);
            let decision = slot_decision_tx(&self.conn, &key)?;
            slots.push(SlotStatus {
                slot,
                assignee,
                decision,
            });
        }

        let progress = progress_percent(application.current_stage, application.rejected_at_stage);
        let pending_action = pending_action(application.current_stage).to_string();
        Ok(WorkflowStatus {
            application,
            progress_percent: progress,
            slots,
            pending_action,
        })
    }

    /// Full drill-down for one application: ledger, assignments, appointments, signatures.
    pub fn stage_history(&self, application_id: &str) -> Result<StageHistory, StoreError> {
        let application_id = canonicalize_application(application_id)?;
        let application = load_application_tx(&self.conn, &application_id)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OUTCOME_COLUMNS} FROM stage_outcomes WHERE application_id=?1 ORDER BY seq ASC"
        ))?;
        let outcomes = stmt
            .query_map(params![application_id], outcome_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StageHistory {
            outcomes,
            assignments: assignments_for_application_tx(&self.conn, &application_id)?,
            appointments: appointments_for_application_tx(&self.conn, &application_id)?,
            signatures: signatures_for_application_tx(&self.conn, &application_id)?,
            application,
        })
    }
}

/// Latest decision of the slot; `Pending` when only the opening row exists.
fn slot_decision_tx(conn: &Connection, slot: &SlotKey) -> Result<Decision, StoreError> {
    let decision = conn
        .query_row(
            r#"
            SELECT decision FROM stage_outcomes
            WHERE application_id=?1 AND stage=?2 AND review_role=?3 AND attempt=?4
              AND decision <> 'pending'
            "#,
            params![
                slot.application_id,
                slot.stage.as_str(),
                slot.review_role.as_str(),
                slot.attempt,
            ],
            |row| enum_col(row, 0, Decision::parse),
        )
        .optional()?;
    Ok(decision.unwrap_or(Decision::Pending))
}

fn open_slots_for_application_tx(
    conn: &Connection,
    application_id: &str,
) -> Result<Vec<ReviewSlotRow>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT application_id, stage, review_role, attempt, opened_at_ms,
               needs_manual_assignment, resolved_at_ms
        FROM review_slots
        WHERE application_id=?1 AND resolved_at_ms IS NULL
        ORDER BY opened_at_ms ASC, review_role ASC
        "#,
    )?;
    let rows = stmt.query_map(params![application_id], |row| {
        Ok(ReviewSlotRow {
            application_id: row.get(0)?,
            stage: enum_col(row, 1, Stage::parse)?,
            review_role: enum_col(row, 2, OfficerRole::parse)?,
            attempt: row.get(3)?,
            opened_at_ms: row.get(4)?,
            needs_manual_assignment: bool_col(row, 5)?,
            resolved_at_ms: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn load_outcome_tx(conn: &Connection, seq: i64) -> Result<StageOutcomeRow, StoreError> {
    Ok(conn.query_row(
        &format!("SELECT {OUTCOME_COLUMNS} FROM stage_outcomes WHERE seq=?1"),
        params![seq],
        outcome_from_row,
    )?)
}

fn outcome_from_row(row: &Row<'_>) -> rusqlite::Result<StageOutcomeRow> {
    Ok(StageOutcomeRow {
        seq: row.get(0)?,
        application_id: row.get(1)?,
        stage: enum_col(row, 2, Stage::parse)?,
        review_role: enum_col(row, 3, OfficerRole::parse)?,
        attempt: row.get(4)?,
        decision: enum_col(row, 5, Decision::parse)?,
        officer_id: row.get(6)?,
        comments: row.get(7)?,
        signature_id: row.get(8)?,
        decided_at_ms: row.get(9)?,
    })
}
