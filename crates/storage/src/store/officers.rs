#![forbid(unsafe_code)]

use super::assignment::release_officer_slots_tx;
use super::support::{bool_col, enum_col, insert_event_tx};
use super::{
    OfficerRow, OfficerUpsertRequest, OfficersListRequest, SqliteStore, StoreError,
    canonicalize_officer, require_text, write_tx,
};
use pm_core::OfficerRole;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::json;

const OFFICER_COLUMNS: &str = "officer_id, name, role, is_active, created_at_ms, updated_at_ms";

impl SqliteStore {
    /// Creates the officer or replaces name and role. Upserting a deactivated officer
    /// reactivates it.
    pub fn officer_upsert(
        &mut self,
        request: OfficerUpsertRequest,
    ) -> Result<OfficerRow, StoreError> {
        let officer_id = canonicalize_officer(&request.officer_id)?;
        let name = require_text(&request.name, "officer name must not be empty")?;

        let tx = write_tx(&mut self.conn)?;
        tx.execute(
            r#"
            INSERT INTO officers(officer_id, name, role, is_active, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            ON CONFLICT(officer_id) DO UPDATE SET
              name=excluded.name,
              role=excluded.role,
              is_active=1,
              updated_at_ms=excluded.updated_at_ms
            "#,
            params![officer_id, name, request.role.as_str(), request.now_ms],
        )?;
        insert_event_tx(
            &tx,
            request.now_ms,
            None,
            "officer_upserted",
            &json!({ "officer_id": officer_id, "role": request.role.as_str() }),
        )?;
        let officer = load_officer_tx(&tx, &officer_id)?;
        tx.commit()?;

        tracing::info!(
            officer_id = %officer.officer_id,
            role = officer.role.as_str(),
            "officer upserted"
        );
        Ok(officer)
    }

    /// Removes the officer from automatic assignment. Undecided slots the officer held lose
    /// their assignee and are flagged for manual assignment.
    pub fn officer_deactivate(
        &mut self,
        officer_id: &str,
        now_ms: i64,
    ) -> Result<OfficerRow, StoreError> {
        let officer_id = canonicalize_officer(officer_id)?;

        let tx = write_tx(&mut self.conn)?;
        let changed = tx.execute(
            "UPDATE officers SET is_active=0, updated_at_ms=?2 WHERE officer_id=?1",
            params![officer_id, now_ms],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownId);
        }
        let released = release_officer_slots_tx(&tx, &officer_id, now_ms)?;
        insert_event_tx(
            &tx,
            now_ms,
            None,
            "officer_deactivated",
            &json!({ "officer_id": officer_id, "released_slots": released }),
        )?;
        let officer = load_officer_tx(&tx, &officer_id)?;
        tx.commit()?;

        tracing::info!(officer_id = %officer.officer_id, released, "officer deactivated");
        Ok(officer)
    }

    pub fn officer_get(&self, officer_id: &str) -> Result<OfficerRow, StoreError> {
        let officer_id = canonicalize_officer(officer_id)?;
        load_officer_tx(&self.conn, &officer_id)
    }

    pub fn officer_list(
        &self,
        request: OfficersListRequest,
    ) -> Result<Vec<OfficerRow>, StoreError> {
        let role = request.role.map(OfficerRole::as_str);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OFFICER_COLUMNS} FROM officers \
             WHERE (?1 IS NULL OR role = ?1) AND (?2 = 1 OR is_active = 1) \
             ORDER BY officer_id ASC"
        ))?;
        let rows = stmt.query_map(
            params![role, i64::from(request.include_inactive)],
            officer_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn officer_from_row(row: &Row<'_>) -> rusqlite::Result<OfficerRow> {
    Ok(OfficerRow {
        officer_id: row.get(0)?,
        name: row.get(1)?,
        role: enum_col(row, 2, OfficerRole::parse)?,
        is_active: bool_col(row, 3)?,
        created_at_ms: row.get(4)?,
        updated_at_ms: row.get(5)?,
    })
}

pub(super) fn load_officer_tx(
    conn: &Connection,
    officer_id: &str,
) -> Result<OfficerRow, StoreError> {
    find_officer_tx(conn, officer_id)?.ok_or(StoreError::UnknownId)
}

pub(super) fn find_officer_tx(
    conn: &Connection,
    officer_id: &str,
) -> Result<Option<OfficerRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {OFFICER_COLUMNS} FROM officers WHERE officer_id=?1"),
            params![officer_id],
            officer_from_row,
        )
        .optional()?)
}

/// Active officers holding `role`, in the stable order the round-robin cursor indexes.
pub(super) fn active_officers_with_role_tx(
    conn: &Connection,
    role: OfficerRole,
) -> Result<Vec<OfficerRow>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OFFICER_COLUMNS} FROM officers \
         WHERE role=?1 AND is_active=1 \
         ORDER BY officer_id ASC"
    ))?;
    let rows = stmt.query_map(params![role.as_str()], officer_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
