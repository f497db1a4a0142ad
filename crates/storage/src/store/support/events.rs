#![forbid(unsafe_code)]

use super::super::{EventRow, StoreError};
use rusqlite::{Connection, params};
use serde_json::Value;

pub(in crate::store) fn insert_event_tx(
    conn: &Connection,
    ts_ms: i64,
    application_id: Option<&str>,
    event_type: &str,
    payload: &Value,
) -> Result<EventRow, StoreError> {
    let payload_json = payload.to_string();
    conn.execute(
        r#"
        INSERT INTO events(ts_ms, application_id, type, payload_json)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![ts_ms, application_id, event_type, payload_json],
    )?;
    let seq = conn.last_insert_rowid();
    tracing::debug!(seq, event_type, application_id, "event appended");
    Ok(EventRow {
        seq,
        ts_ms,
        application_id: application_id.map(str::to_string),
        event_type: event_type.to_string(),
        payload_json,
    })
}
