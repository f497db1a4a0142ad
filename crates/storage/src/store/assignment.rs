#![forbid(unsafe_code)]

//! Assignment engine: picks the officer for each review slot when a stage opens, plus the
//! admin override and first-to-claim paths.

use super::applications::load_application_tx;
use super::officers::{active_officers_with_role_tx, find_officer_tx};
use super::rules::{advance_round_robin_cursor_tx, round_robin_cursor_tx, select_rule_tx};
use super::support::{bool_col, enum_col, insert_event_tx};
use super::{
    ApplicationRow, AssignRequest, AssignToRequest, AssignmentRow, ClaimRequest, ManualReason,
    OfficerRow, RuleRow, SlotAssignment, SqliteStore, StoreError, canonicalize_application,
    canonicalize_officer, map_insert_conflict, write_tx,
};
use pm_core::pipeline::review_roles;
use pm_core::{AssignmentStrategy, Decision, OfficerRole, PositionType, Stage};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::json;

const ASSIGNMENT_COLUMNS: &str = "assignment_id, application_id, stage, review_role, attempt, \
     officer_id, previous_officer_id, strategy_used, rule_id, is_active, assigned_at_ms, \
     superseded_at_ms";

/// One required review within a stage for one attempt of an application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct SlotKey {
    pub(super) application_id: String,
    pub(super) stage: Stage,
    pub(super) review_role: OfficerRole,
    pub(super) attempt: i64,
}

impl SlotKey {
    pub(super) fn new(
        application: &ApplicationRow,
        stage: Stage,
        review_role: OfficerRole,
    ) -> Self {
        Self {
            application_id: application.application_id.clone(),
            stage,
            review_role,
            attempt: application.attempt,
        }
    }
}

impl SqliteStore {
    /// Re-runs rule evaluation for an open slot and supersedes its current assignee.
    pub fn assign(&mut self, request: AssignRequest) -> Result<AssignmentRow, StoreError> {
        let application_id = canonicalize_application(&request.application_id)?;
        let cas_retries = self.policy.round_robin_cas_retries;

        let tx = write_tx(&mut self.conn)?;
        let (application, slot) =
            open_slot_for_request_tx(&tx, &application_id, request.stage, request.review_role)?;

        let outcome =
            auto_assign_tx(&tx, application.position_type, &slot, request.now_ms, cas_retries)?;
        let row = match outcome {
            SlotAssignment::Assigned(row) => row,
            SlotAssignment::NeedsManual { .. } => {
                return Err(StoreError::NoEligibleOfficer {
                    application_id,
                    stage: slot.stage,
                    role: slot.review_role,
                });
            }
        };
        tx.commit()?;
        Ok(row)
    }

    /// Admin reassignment to a named officer.
    pub fn assign_to(&mut self, request: AssignToRequest) -> Result<AssignmentRow, StoreError> {
        let application_id = canonicalize_application(&request.application_id)?;
        let officer_id = canonicalize_officer(&request.officer_id)?;

        let tx = write_tx(&mut self.conn)?;
        let (_, slot) =
            open_slot_for_request_tx(&tx, &application_id, request.stage, request.review_role)?;
        require_officer_for_slot_tx(&tx, &slot, &officer_id)?;

        if let Some(active) = active_assignment_tx(&tx, &slot)? {
            if active.officer_id == officer_id {
                return Err(StoreError::AlreadyAssigned {
                    application_id,
                    stage: slot.stage,
                    officer_id,
                });
            }
        }

        let row = insert_assignment_tx(
            &tx,
            &slot,
            &officer_id,
            AssignmentStrategy::Manual,
            None,
            request.now_ms,
        )?;
        tx.commit()?;
        Ok(row)
    }

    /// First-to-claim for a slot without an active assignee.
    pub fn claim(&mut self, request: ClaimRequest) -> Result<AssignmentRow, StoreError> {
        let application_id = canonicalize_application(&request.application_id)?;
        let officer_id = canonicalize_officer(&request.officer_id)?;

        let tx = write_tx(&mut self.conn)?;
        let (_, slot) =
            open_slot_for_request_tx(&tx, &application_id, request.stage, request.review_role)?;
        require_officer_for_slot_tx(&tx, &slot, &officer_id)?;

        if let Some(active) = active_assignment_tx(&tx, &slot)? {
            return Err(StoreError::AlreadyAssigned {
                application_id,
                stage: slot.stage,
                officer_id: active.officer_id,
            });
        }

        let row = insert_assignment_tx(
            &tx,
            &slot,
            &officer_id,
            AssignmentStrategy::Manual,
            None,
            request.now_ms,
        )?;
        tx.commit()?;
        Ok(row)
    }

    pub fn assignment_history(
        &self,
        application_id: &str,
    ) -> Result<Vec<AssignmentRow>, StoreError> {
        let application_id = canonicalize_application(application_id)?;
        load_application_tx(&self.conn, &application_id)?;
        assignments_for_application_tx(&self.conn, &application_id)
    }
}

/// Picks the slot a request addresses. `requested` may be omitted for single-reviewer stages.
pub(super) fn resolve_review_role(
    position: PositionType,
    stage: Stage,
    requested: Option<OfficerRole>,
) -> Result<OfficerRole, StoreError> {
    let roles = review_roles(position, stage);
    match requested {
        Some(role) if roles.contains(&role) => Ok(role),
        Some(_) => Err(StoreError::InvalidInput("review_role does not review this stage")),
        None => match roles.as_slice() {
            [only] => Ok(*only),
            [] => Err(StoreError::InvalidInput("stage has no reviewers")),
            _ => Err(StoreError::InvalidInput(
                "review_role is required for a stage with parallel reviewers",
            )),
        },
    }
}

fn open_slot_for_request_tx(
    conn: &Connection,
    application_id: &str,
    stage: Stage,
    requested: Option<OfficerRole>,
) -> Result<(ApplicationRow, SlotKey), StoreError> {
    let application = load_application_tx(conn, application_id)?;
    if application.current_stage != stage {
        return Err(StoreError::StaleState {
            application_id: application.application_id,
            requested: stage,
            current: application.current_stage,
        });
    }
    let role = resolve_review_role(application.position_type, stage, requested)?;
    let slot = SlotKey::new(&application, stage, role);
    if !slot_is_open_tx(conn, &slot)? {
        return Err(StoreError::StaleState {
            application_id: application.application_id,
            requested: stage,
            current: application.current_stage,
        });
    }
    Ok((application, slot))
}

fn require_officer_for_slot_tx(
    conn: &Connection,
    slot: &SlotKey,
    officer_id: &str,
) -> Result<OfficerRow, StoreError> {
    match find_officer_tx(conn, officer_id)? {
        Some(officer) if officer.is_active && officer.role == slot.review_role => Ok(officer),
        _ => Err(StoreError::UnauthorizedRole {
            officer_id: officer_id.to_string(),
            stage: slot.stage,
            required: slot.review_role,
        }),
    }
}

/// The officer must be active, hold the slot's role and be its active assignee.
pub(super) fn authorize_assignee_tx(
    conn: &Connection,
    slot: &SlotKey,
    officer_id: &str,
) -> Result<OfficerRow, StoreError> {
    let officer = require_officer_for_slot_tx(conn, slot, officer_id)?;
    let is_assignee = active_assignment_tx(conn, slot)?
        .is_some_and(|active| active.officer_id == officer.officer_id);
    if !is_assignee {
        return Err(StoreError::UnauthorizedRole {
            officer_id: officer.officer_id,
            stage: slot.stage,
            required: slot.review_role,
        });
    }
    Ok(officer)
}

/// Opens every review slot of `stage` and runs the engine for each. Slots the engine cannot
/// fill are flagged for manual assignment; that is not an error here.
pub(super) fn open_stage_tx(
    conn: &Connection,
    application: &ApplicationRow,
    stage: Stage,
    now_ms: i64,
    cas_retries: u32,
) -> Result<Vec<SlotAssignment>, StoreError> {
    let mut out = Vec::new();
    for role in review_roles(application.position_type, stage) {
        let slot = SlotKey::new(application, stage, role);
        conn.execute(
            r#"
            INSERT INTO review_slots(application_id, stage, review_role, attempt, opened_at_ms,
                                     needs_manual_assignment, resolved_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL)
            "#,
            params![
                slot.application_id,
                slot.stage.as_str(),
                slot.review_role.as_str(),
                slot.attempt,
                now_ms,
            ],
        )?;
        conn.execute(
            r#"
            INSERT INTO stage_outcomes(application_id, stage, review_role, attempt, decision,
                                       officer_id, comments, signature_id, decided_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, NULL, ?6)
            "#,
            params![
                slot.application_id,
                slot.stage.as_str(),
                slot.review_role.as_str(),
                slot.attempt,
                Decision::Pending.as_str(),
                now_ms,
            ],
        )?;
        out.push(auto_assign_tx(conn, application.position_type, &slot, now_ms, cas_retries)?);
    }
    Ok(out)
}

fn auto_assign_tx(
    conn: &Connection,
    position: PositionType,
    slot: &SlotKey,
    now_ms: i64,
    cas_retries: u32,
) -> Result<SlotAssignment, StoreError> {
    let Some(rule) = select_rule_tx(conn, position, slot.review_role)? else {
        return needs_manual_tx(conn, slot, ManualReason::NoActiveRule, now_ms);
    };

    let candidates = active_officers_with_role_tx(conn, slot.review_role)?;
    let chosen = match rule.strategy {
        AssignmentStrategy::Manual => {
            return needs_manual_tx(conn, slot, ManualReason::ManualStrategy, now_ms);
        }
        AssignmentStrategy::RoundRobin => {
            pick_round_robin_tx(conn, &rule, &candidates, cas_retries)?
        }
        AssignmentStrategy::LeastWorkload => pick_least_workload_tx(conn, &rule, &candidates)?,
    };
    let Some(officer_id) = chosen else {
        return needs_manual_tx(conn, slot, ManualReason::NoEligibleOfficer, now_ms);
    };

    if let Some(active) = active_assignment_tx(conn, slot)? {
        if active.officer_id == officer_id {
            return Ok(SlotAssignment::Assigned(active));
        }
    }

    let row = insert_assignment_tx(
        conn,
        slot,
        &officer_id,
        rule.strategy,
        Some(rule.rule_id),
        now_ms,
    )?;
    Ok(SlotAssignment::Assigned(row))
}

fn has_capacity(rule: &RuleRow, workload: i64) -> bool {
    rule.max_workload_per_officer == 0 || workload < rule.max_workload_per_officer
}

fn pick_round_robin_tx(
    conn: &Connection,
    rule: &RuleRow,
    candidates: &[OfficerRow],
    cas_retries: u32,
) -> Result<Option<String>, StoreError> {
    if candidates.is_empty() {
        return Ok(None);
    }
    let count = i64::try_from(candidates.len())
        .map_err(|_| StoreError::InvalidInput("numeric overflow"))?;

    let mut cursor = rule.last_round_robin_index;
    for attempt in 0..=cas_retries {
        let start = (cursor + 1).rem_euclid(count);
        let mut chosen = None;
        for step in 0..count {
            let index = (start + step).rem_euclid(count);
            let officer = &candidates[index as usize];
            if has_capacity(rule, officer_workload_tx(conn, &officer.officer_id)?) {
                chosen = Some((index, officer));
                break;
            }
        }
        let Some((index, officer)) = chosen else {
            return Ok(None);
        };

        if advance_round_robin_cursor_tx(conn, rule.rule_id, cursor, index)? {
            return Ok(Some(officer.officer_id.clone()));
        }
        tracing::debug!(rule_id = rule.rule_id, attempt, "round-robin cursor moved; retrying");
        cursor = round_robin_cursor_tx(conn, rule.rule_id)?;
    }

    tracing::warn!(
        rule_id = rule.rule_id,
        "round-robin cursor contention; falling back to role order"
    );
    for officer in candidates {
        if has_capacity(rule, officer_workload_tx(conn, &officer.officer_id)?) {
            return Ok(Some(officer.officer_id.clone()));
        }
    }
    Ok(None)
}

fn pick_least_workload_tx(
    conn: &Connection,
    rule: &RuleRow,
    candidates: &[OfficerRow],
) -> Result<Option<String>, StoreError> {
    let mut best: Option<(i64, &OfficerRow)> = None;
    for officer in candidates {
        let workload = officer_workload_tx(conn, &officer.officer_id)?;
        if !has_capacity(rule, workload) {
            continue;
        }
        // Candidates arrive ordered by id, so strict `<` keeps the smallest id on ties.
        if best.is_none_or(|(current, _)| workload < current) {
            best = Some((workload, officer));
        }
    }
    Ok(best.map(|(_, officer)| officer.officer_id.clone()))
}

/// Active assignments on slots that are still waiting for a decision.
pub(super) fn officer_workload_tx(conn: &Connection, officer_id: &str) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        r#"
        SELECT COUNT(*)
        FROM assignment_histories a
        JOIN review_slots s
          ON s.application_id = a.application_id AND s.stage = a.stage
         AND s.review_role = a.review_role AND s.attempt = a.attempt
        WHERE a.officer_id = ?1 AND a.is_active = 1 AND s.resolved_at_ms IS NULL
        "#,
        params![officer_id],
        |row| row.get::<_, i64>(0),
    )?)
}

fn needs_manual_tx(
    conn: &Connection,
    slot: &SlotKey,
    reason: ManualReason,
    now_ms: i64,
) -> Result<SlotAssignment, StoreError> {
    conn.execute(
        r#"
        UPDATE review_slots SET needs_manual_assignment=1
        WHERE application_id=?1 AND stage=?2 AND review_role=?3 AND attempt=?4
        "#,
        params![
            slot.application_id,
            slot.stage.as_str(),
            slot.review_role.as_str(),
            slot.attempt,
        ],
    )?;
    insert_event_tx(
        conn,
        now_ms,
        Some(&slot.application_id),
        "assignment_needs_manual",
        &json!({
            "stage": slot.stage.as_str(),
            "review_role": slot.review_role.as_str(),
            "attempt": slot.attempt,
            "reason": reason.as_str(),
        }),
    )?;
    tracing::info!(
        application_id = %slot.application_id,
        stage = slot.stage.as_str(),
        review_role = slot.review_role.as_str(),
        reason = reason.as_str(),
        "slot needs manual assignment"
    );
    Ok(SlotAssignment::NeedsManual {
        stage: slot.stage,
        review_role: slot.review_role,
        reason,
    })
}

/// Supersedes the slot's active record (if any) and inserts the new active one.
fn insert_assignment_tx(
    conn: &Connection,
    slot: &SlotKey,
    officer_id: &str,
    strategy: AssignmentStrategy,
    rule_id: Option<i64>,
    now_ms: i64,
) -> Result<AssignmentRow, StoreError> {
    let previous = active_assignment_tx(conn, slot)?;
    if let Some(previous) = previous.as_ref() {
        conn.execute(
            "UPDATE assignment_histories SET is_active=0, superseded_at_ms=?2 \
             WHERE assignment_id=?1",
            params![previous.assignment_id, now_ms],
        )?;
    }
    let previous_officer_id = previous.map(|row| row.officer_id);

    conn.execute(
        r#"
        INSERT INTO assignment_histories(
          application_id, stage, review_role, attempt, officer_id, previous_officer_id,
          strategy_used, rule_id, is_active, assigned_at_ms, superseded_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, NULL)
        "#,
        params![
            slot.application_id,
            slot.stage.as_str(),
            slot.review_role.as_str(),
            slot.attempt,
            officer_id,
            previous_officer_id,
            strategy.as_str(),
            rule_id,
            now_ms,
        ],
    )
    .map_err(|err| {
        map_insert_conflict(
            err,
            StoreError::AlreadyAssigned {
                application_id: slot.application_id.clone(),
                stage: slot.stage,
                officer_id: officer_id.to_string(),
            },
        )
    })?;
    let assignment_id = conn.last_insert_rowid();

    conn.execute(
        r#"
        UPDATE review_slots SET needs_manual_assignment=0
        WHERE application_id=?1 AND stage=?2 AND review_role=?3 AND attempt=?4
        "#,
        params![
            slot.application_id,
            slot.stage.as_str(),
            slot.review_role.as_str(),
            slot.attempt,
        ],
    )?;
    insert_event_tx(
        conn,
        now_ms,
        Some(&slot.application_id),
        "assignment_created",
        &json!({
            "assignment_id": assignment_id,
            "stage": slot.stage.as_str(),
            "review_role": slot.review_role.as_str(),
            "attempt": slot.attempt,
            "officer_id": officer_id,
            "previous_officer_id": previous_officer_id,
            "strategy": strategy.as_str(),
            "rule_id": rule_id,
        }),
    )?;
    tracing::info!(
        application_id = %slot.application_id,
        stage = slot.stage.as_str(),
        officer_id,
        strategy = strategy.as_str(),
        "officer assigned"
    );

    Ok(AssignmentRow {
        assignment_id,
        application_id: slot.application_id.clone(),
        stage: slot.stage,
        review_role: slot.review_role,
        attempt: slot.attempt,
        officer_id: officer_id.to_string(),
        previous_officer_id,
        strategy_used: strategy,
        rule_id,
        is_active: true,
        assigned_at_ms: now_ms,
        superseded_at_ms: None,
    })
}

/// Resolves every still-open slot of the stage and releases its assignee. Used when a
/// parallel stage is rejected through one of its slots.
pub(super) fn close_open_slots_tx(
    conn: &Connection,
    application_id: &str,
    stage: Stage,
    attempt: i64,
    now_ms: i64,
) -> Result<usize, StoreError> {
    conn.execute(
        r#"
        UPDATE assignment_histories SET is_active=0, superseded_at_ms=?4
        WHERE application_id=?1 AND stage=?2 AND attempt=?3 AND is_active=1
          AND review_role IN (
            SELECT review_role FROM review_slots
            WHERE application_id=?1 AND stage=?2 AND attempt=?3 AND resolved_at_ms IS NULL
          )
        "#,
        params![application_id, stage.as_str(), attempt, now_ms],
    )?;
    Ok(conn.execute(
        r#"
        UPDATE review_slots SET resolved_at_ms=?4
        WHERE application_id=?1 AND stage=?2 AND attempt=?3 AND resolved_at_ms IS NULL
        "#,
        params![application_id, stage.as_str(), attempt, now_ms],
    )?)
}

/// Ends every active assignment `officer_id` holds on an undecided slot and flags those
/// slots for manual assignment. Returns the number of slots released.
pub(super) fn release_officer_slots_tx(
    conn: &Connection,
    officer_id: &str,
    now_ms: i64,
) -> Result<usize, StoreError> {
    let held = {
        let mut stmt = conn.prepare(
            r#"
            SELECT a.assignment_id, a.application_id, a.stage, a.review_role, a.attempt
            FROM assignment_histories a
            JOIN review_slots s
              ON s.application_id = a.application_id AND s.stage = a.stage
             AND s.review_role = a.review_role AND s.attempt = a.attempt
            WHERE a.officer_id = ?1 AND a.is_active = 1 AND s.resolved_at_ms IS NULL
            ORDER BY a.assignment_id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![officer_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                SlotKey {
                    application_id: row.get(1)?,
                    stage: enum_col(row, 2, Stage::parse)?,
                    review_role: enum_col(row, 3, OfficerRole::parse)?,
                    attempt: row.get(4)?,
                },
            ))
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    for (assignment_id, slot) in &held {
        conn.execute(
            "UPDATE assignment_histories SET is_active=0, superseded_at_ms=?2 \
             WHERE assignment_id=?1",
            params![assignment_id, now_ms],
        )?;
        needs_manual_tx(conn, slot, ManualReason::OfficerDeactivated, now_ms)?;
    }
    Ok(held.len())
}

pub(super) fn slot_is_open_tx(conn: &Connection, slot: &SlotKey) -> Result<bool, StoreError> {
    let resolved = conn
        .query_row(
            r#"
            SELECT resolved_at_ms FROM review_slots
            WHERE application_id=?1 AND stage=?2 AND review_role=?3 AND attempt=?4
            "#,
            params![
                slot.application_id,
                slot.stage.as_str(),
                slot.review_role.as_str(),
                slot.attempt,
            ],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?;
    Ok(matches!(resolved, Some(None)))
}

pub(super) fn active_assignment_tx(
    conn: &Connection,
    slot: &SlotKey,
) -> Result<Option<AssignmentRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM assignment_histories \
                 WHERE application_id=?1 AND stage=?2 AND review_role=?3 AND attempt=?4 \
                   AND is_active=1"
            ),
            params![
                slot.application_id,
                slot.stage.as_str(),
                slot.review_role.as_str(),
                slot.attempt,
            ],
            assignment_from_row,
        )
        .optional()?)
}

pub(super) fn assignments_for_application_tx(
    conn: &Connection,
    application_id: &str,
) -> Result<Vec<AssignmentRow>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignment_histories \
         WHERE application_id=?1 ORDER BY assignment_id ASC"
    ))?;
    let rows = stmt.query_map(params![application_id], assignment_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<AssignmentRow> {
    Ok(AssignmentRow {
        assignment_id: row.get(0)?,
        application_id: row.get(1)?,
        stage: enum_col(row, 2, Stage::parse)?,
        review_role: enum_col(row, 3, OfficerRole::parse)?,
        attempt: row.get(4)?,
        officer_id: row.get(5)?,
        previous_officer_id: row.get(6)?,
        strategy_used: enum_col(row, 7, AssignmentStrategy::parse)?,
        rule_id: row.get(8)?,
        is_active: bool_col(row, 9)?,
        assigned_at_ms: row.get(10)?,
        superseded_at_ms: row.get(11)?,
    })
}
