#![forbid(unsafe_code)]

//! Read-only projections over the ledger for dashboards and the reminder poller.

use super::rules::select_rule_tx;
use super::support::enum_col;
use super::{
    EscalationDueRow, OfficerWorkloadRow, OpenSlotRow, OutcomeCountRow, SqliteStore,
    StageCountRow, StoreError,
};
use pm_core::pipeline::pipeline_index;
use pm_core::{OfficerRole, PositionType, Stage};
use rusqlite::params;

const MS_PER_HOUR: i64 = 60 * 60 * 1000;

impl SqliteStore {
    /// Applications per `(position_type, current_stage)`.
    pub fn report_stage_counts(&self) -> Result<Vec<StageCountRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT position_type, current_stage, COUNT(*)
            FROM position_applications
            GROUP BY position_type, current_stage
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StageCountRow {
                position_type: enum_col(row, 0, PositionType::parse)?,
                stage: enum_col(row, 1, Stage::parse)?,
                applications: row.get(2)?,
            })
        })?;
        let mut out = rows.collect::<Result<Vec<_>, _>>()?;
        out.sort_by_key(|row| (row.position_type, stage_order(row.stage)));
        Ok(out)
    }

    /// Review slots per stage by their decision. Slots closed without a decision (the
    /// sibling of a rejected parallel review) are not counted.
    pub fn report_outcome_counts(&self) -> Result<Vec<OutcomeCountRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.stage,
                   SUM(CASE WHEN o.decision = 'approved' THEN 1 ELSE 0 END),
                   SUM(CASE WHEN o.decision = 'rejected' THEN 1 ELSE 0 END),
                   SUM(CASE WHEN o.decision IS NULL AND s.resolved_at_ms IS NULL THEN 1 ELSE 0 END)
            FROM review_slots s
            LEFT JOIN stage_outcomes o
              ON o.application_id = s.application_id AND o.stage = s.stage
             AND o.review_role = s.review_role AND o.attempt = s.attempt
             AND o.decision <> 'pending'
            GROUP BY s.stage
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(OutcomeCountRow {
                stage: enum_col(row, 0, Stage::parse)?,
                approved: row.get(1)?,
                rejected: row.get(2)?,
                pending: row.get(3)?,
            })
        })?;
        let mut out = rows.collect::<Result<Vec<_>, _>>()?;
        out.sort_by_key(|row| stage_order(row.stage));
        Ok(out)
    }

    pub fn report_officer_workload(&self) -> Result<Vec<OfficerWorkloadRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT f.officer_id, f.name, f.role,
                   (SELECT COUNT(*)
                    FROM assignment_histories a
                    JOIN review_slots s
                      ON s.application_id = a.application_id AND s.stage = a.stage
                     AND s.review_role = a.review_role AND s.attempt = a.attempt
                    WHERE a.officer_id = f.officer_id AND a.is_active = 1
                      AND s.resolved_at_ms IS NULL)
            FROM officers f
            WHERE f.is_active = 1
            ORDER BY f.role ASC, f.officer_id ASC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(OfficerWorkloadRow {
                officer_id: row.get(0)?,
                name: row.get(1)?,
                role: enum_col(row, 2, OfficerRole::parse)?,
                open_assignments: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Open slots that have waited at least `older_than_ms`, oldest first.
    pub fn delayed_slots(
        &self,
        now_ms: i64,
        older_than_ms: i64,
    ) -> Result<Vec<OpenSlotRow>, StoreError> {
        if older_than_ms < 0 {
            return Err(StoreError::InvalidInput("older_than_ms must be >= 0"));
        }
        let cutoff_ms = now_ms.saturating_sub(older_than_ms);

        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.application_id, p.position_type, s.stage, s.review_role, s.attempt,
                   s.opened_at_ms,
                   (SELECT a.officer_id FROM assignment_histories a
                    WHERE a.application_id = s.application_id AND a.stage = s.stage
                      AND a.review_role = s.review_role AND a.attempt = s.attempt
                      AND a.is_active = 1)
            FROM review_slots s
            JOIN position_applications p ON p.application_id = s.application_id
            WHERE s.resolved_at_ms IS NULL AND s.opened_at_ms <= ?1
            ORDER BY s.opened_at_ms ASC, s.application_id ASC, s.review_role ASC
            "#,
        )?;
        let rows = stmt.query_map(params![cutoff_ms], |row| {
            let opened_at_ms: i64 = row.get(5)?;
            Ok(OpenSlotRow {
                application_id: row.get(0)?,
                position_type: enum_col(row, 1, PositionType::parse)?,
                stage: enum_col(row, 2, Stage::parse)?,
                review_role: enum_col(row, 3, OfficerRole::parse)?,
                attempt: row.get(4)?,
                opened_at_ms,
                assignee: row.get(6)?,
                waited_ms: now_ms.saturating_sub(opened_at_ms),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Open slots that outlived the escalation window of the rule governing them. Nothing
    /// is reassigned here; the caller decides what to do with the list.
    pub fn escalation_due(&self, now_ms: i64) -> Result<Vec<EscalationDueRow>, StoreError> {
        let mut out = Vec::new();
        for slot in self.delayed_slots(now_ms, 0)? {
            let Some(rule) = select_rule_tx(&self.conn, slot.position_type, slot.review_role)?
            else {
                continue;
            };
            let Some(hours) = rule.escalation_time_hours else {
                continue;
            };
            if slot.waited_ms > hours.saturating_mul(MS_PER_HOUR) {
                out.push(EscalationDueRow {
                    slot,
                    rule_id: rule.rule_id,
                    escalation_time_hours: hours,
                    escalation_role: rule.escalation_role,
                });
            }
        }
        Ok(out)
    }
}

fn stage_order(stage: Stage) -> u32 {
    // Rejected sorts after Completed.
    pipeline_index(stage).unwrap_or(u32::MAX)
}
