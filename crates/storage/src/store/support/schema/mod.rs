#![forbid(unsafe_code)]

mod sql;

use super::super::StoreError;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;

const SCHEMA_VERSION: i64 = 1;

/// Refuses to open a database that was not created by this schema version.
///
/// An empty database passes; anything else must carry exactly the known table set and a
/// matching `schema_state` row.
pub(in crate::store) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    let required: BTreeSet<&str> = sql::REQUIRED_TABLES.into_iter().collect();

    if tables
        .iter()
        .any(|table| !required.contains(table.as_str()))
    {
        return Err(StoreError::InvalidInput("RESET_REQUIRED: unsupported tables detected"));
    }

    for table in required {
        if !tables.contains(table) {
            return Err(StoreError::InvalidInput("RESET_REQUIRED: required table is missing"));
        }
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM schema_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(_) => Err(StoreError::InvalidInput("RESET_REQUIRED: schema version mismatch")),
        None => Err(StoreError::InvalidInput("RESET_REQUIRED: schema state row is missing")),
    }
}

pub(in crate::store) fn install_schema(conn: &Connection, now_ms: i64) -> Result<(), StoreError> {
    conn.execute_batch(&sql::full_schema_sql())?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_state(singleton, schema_version, created_at_ms, \
         updated_at_ms) VALUES (1, ?1, ?2, ?2)",
        params![SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}
