#![forbid(unsafe_code)]

use super::support::{bool_col, enum_col, insert_event_tx, opt_enum_col};
use super::{RuleRow, RuleUpsertRequest, SqliteStore, StoreError, write_tx};
use pm_core::{AssignmentStrategy, OfficerRole, PositionType};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::json;

const RULE_COLUMNS: &str = "rule_id, position_type, target_role, strategy, \
     max_workload_per_officer, is_active, priority, last_round_robin_index, \
     escalation_time_hours, escalation_role, created_at_ms, updated_at_ms";

impl SqliteStore {
    /// Creates a rule (`rule_id = None`) or redefines an existing one. Redefinition keeps the
    /// round-robin cursor and reactivates the rule.
    pub fn rule_upsert(&mut self, request: RuleUpsertRequest) -> Result<RuleRow, StoreError> {
        if request.max_workload_per_officer < 0 {
            return Err(StoreError::InvalidInput("max_workload_per_officer must be >= 0"));
        }
        if request.escalation_time_hours.is_some_and(|hours| hours <= 0) {
            return Err(StoreError::InvalidInput("escalation_time_hours must be positive"));
        }

        let tx = write_tx(&mut self.conn)?;
        let rule_id = match request.rule_id {
            None => {
                tx.execute(
                    r#"
                    INSERT INTO auto_assignment_rules(
                      position_type, target_role, strategy, max_workload_per_officer, is_active,
                      priority, last_round_robin_index, escalation_time_hours, escalation_role,
                      created_at_ms, updated_at_ms)
                    VALUES (?1, ?2, ?3, ?4, 1, ?5, -1, ?6, ?7, ?8, ?8)
                    "#,
                    params![
                        request.position_type.as_str(),
                        request.target_role.as_str(),
                        request.strategy.as_str(),
                        request.max_workload_per_officer,
                        request.priority,
                        request.escalation_time_hours,
                        request.escalation_role.map(OfficerRole::as_str),
                        request.now_ms,
                    ],
                )?;
                tx.last_insert_rowid()
            }
            Some(rule_id) => {
                let changed = tx.execute(
                    r#"
                    UPDATE auto_assignment_rules
                    SET position_type=?2, target_role=?3, strategy=?4, max_workload_per_officer=?5,
                        is_active=1, priority=?6, escalation_time_hours=?7, escalation_role=?8,
                        updated_at_ms=?9
                    WHERE rule_id=?1
                    "#,
                    params![
                        rule_id,
                        request.position_type.as_str(),
                        request.target_role.as_str(),
                        request.strategy.as_str(),
                        request.max_workload_per_officer,
                        request.priority,
                        request.escalation_time_hours,
                        request.escalation_role.map(OfficerRole::as_str),
                        request.now_ms,
                    ],
                )?;
                if changed == 0 {
                    return Err(StoreError::UnknownId);
                }
                rule_id
            }
        };

        insert_event_tx(
            &tx,
            request.now_ms,
            None,
            "rule_upserted",
            &json!({
                "rule_id": rule_id,
                "position_type": request.position_type.as_str(),
                "target_role": request.target_role.as_str(),
                "strategy": request.strategy.as_str(),
            }),
        )?;
        let rule = load_rule_tx(&tx, rule_id)?;
        tx.commit()?;

        tracing::info!(rule_id, strategy = rule.strategy.as_str(), "assignment rule upserted");
        Ok(rule)
    }

    pub fn rule_deactivate(&mut self, rule_id: i64, now_ms: i64) -> Result<RuleRow, StoreError> {
        let tx = write_tx(&mut self.conn)?;
        let changed = tx.execute(
            "UPDATE auto_assignment_rules SET is_active=0, updated_at_ms=?2 WHERE rule_id=?1",
            params![rule_id, now_ms],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownId);
        }
        insert_event_tx(
            &tx,
            now_ms,
            None,
            "rule_deactivated",
            &json!({ "rule_id": rule_id }),
        )?;
        let rule = load_rule_tx(&tx, rule_id)?;
        tx.commit()?;
        Ok(rule)
    }

    pub fn rule_list(
        &self,
        position_type: Option<PositionType>,
    ) -> Result<Vec<RuleRow>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM auto_assignment_rules \
             WHERE (?1 IS NULL OR position_type = ?1) \
             ORDER BY position_type ASC, target_role ASC, priority DESC, rule_id ASC"
        ))?;
        let rows = stmt.query_map(
            params![position_type.map(PositionType::as_str)],
            rule_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<RuleRow> {
    Ok(RuleRow {
        rule_id: row.get(0)?,
        position_type: enum_col(row, 1, PositionType::parse)?,
        target_role: enum_col(row, 2, OfficerRole::parse)?,
        strategy: enum_col(row, 3, AssignmentStrategy::parse)?,
        max_workload_per_officer: row.get(4)?,
        is_active: bool_col(row, 5)?,
        priority: row.get(6)?,
        last_round_robin_index: row.get(7)?,
        escalation_time_hours: row.get(8)?,
        escalation_role: opt_enum_col(row, 9, OfficerRole::parse)?,
        created_at_ms: row.get(10)?,
        updated_at_ms: row.get(11)?,
    })
}

fn load_rule_tx(conn: &Connection, rule_id: i64) -> Result<RuleRow, StoreError> {
    conn.query_row(
        &format!("SELECT {RULE_COLUMNS} FROM auto_assignment_rules WHERE rule_id=?1"),
        params![rule_id],
        rule_from_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

/// The rule that governs `(position, role)`: highest priority first, oldest rule on ties.
pub(super) fn select_rule_tx(
    conn: &Connection,
    position: PositionType,
    role: OfficerRole,
) -> Result<Option<RuleRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {RULE_COLUMNS} FROM auto_assignment_rules \
                 WHERE position_type=?1 AND target_role=?2 AND is_active=1 \
                 ORDER BY priority DESC, rule_id ASC \
                 LIMIT 1"
            ),
            params![position.as_str(), role.as_str()],
            rule_from_row,
        )
        .optional()?)
}

pub(super) fn round_robin_cursor_tx(conn: &Connection, rule_id: i64) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT last_round_robin_index FROM auto_assignment_rules WHERE rule_id=?1",
        params![rule_id],
        |row| row.get::<_, i64>(0),
    )?)
}

/// Compare-and-swap on the cursor. Returns `false` when another writer moved it first.
pub(super) fn advance_round_robin_cursor_tx(
    conn: &Connection,
    rule_id: i64,
    expected: i64,
    next: i64,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE auto_assignment_rules SET last_round_robin_index=?3 \
         WHERE rule_id=?1 AND last_round_robin_index=?2",
        params![rule_id, expected, next],
    )?;
    Ok(changed == 1)
}
