#![forbid(unsafe_code)]

mod applications;
mod appointments;
mod assignment;
mod error;
mod hsm;
mod officers;
mod policy;
mod reporting;
mod rules;
mod signatures;
mod support;
mod types;
mod workflow;

pub use error::StoreError;
pub use hsm::{HsmClient, HsmError, HsmReceipt, HsmSignRequest};
pub use policy::*;
pub use types::*;

use pm_core::{ApplicationId, OfficerId};
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use support::{install_schema, preflight_gate};

const DB_FILE_NAME: &str = "pmcrms.db";
const DEFAULT_EVENTS_LIMIT: usize = 200;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
    policy: WorkflowPolicy,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_policy(storage_dir, WorkflowPolicy::default())
    }

    pub fn open_with_policy(
        storage_dir: impl AsRef<Path>,
        policy: WorkflowPolicy,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        preflight_gate(&conn)?;
        install_schema(&conn, now_ms())?;

        tracing::debug!(storage_dir = %storage_dir.display(), "store opened");
        Ok(Self {
            conn,
            storage_dir,
            policy,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Audit log, oldest first. `since_event_id` is exclusive.
    pub fn list_events(
        &self,
        application_id: Option<&str>,
        since_event_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<EventRow>, StoreError> {
        let application_id = application_id.map(canonicalize_application).transpose()?;
        let since_seq = match since_event_id {
            None => 0i64,
            Some(event_id) => parse_event_id(event_id).ok_or(StoreError::InvalidInput(
                "since must be like evt_<16-digit-seq>",
            ))?,
        };
        let limit = to_sqlite_i64(limit.unwrap_or(DEFAULT_EVENTS_LIMIT))?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, ts_ms, application_id, type, payload_json
            FROM events
            WHERE seq > ?1 AND (?2 IS NULL OR application_id = ?2)
            ORDER BY seq ASC
            LIMIT ?3
            "#,
        )?;
        let rows = stmt.query_map(params![since_seq, application_id, limit], |row| {
            Ok(EventRow {
                seq: row.get(0)?,
                ts_ms: row.get(1)?,
                application_id: row.get(2)?,
                event_type: row.get(3)?,
                payload_json: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Takes the database write lock up front; concurrent writers in other processes wait on
/// the busy timeout instead of failing on lock upgrade.
fn write_tx(conn: &mut Connection) -> Result<Transaction<'_>, StoreError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn map_insert_conflict(err: rusqlite::Error, conflict: StoreError) -> StoreError {
    if is_constraint_violation(&err) {
        return conflict;
    }
    StoreError::Sql(err)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

fn canonicalize_application(value: &str) -> Result<String, StoreError> {
    ApplicationId::try_new(value.trim())
        .map(ApplicationId::into_string)
        .map_err(|_| StoreError::InvalidInput("invalid application_id"))
}

fn canonicalize_officer(value: &str) -> Result<String, StoreError> {
    OfficerId::try_new(value.trim())
        .map(OfficerId::into_string)
        .map_err(|_| StoreError::InvalidInput("invalid officer_id"))
}

fn require_text(value: &str, message: &'static str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput(message));
    }
    Ok(trimmed.to_string())
}

fn parse_event_id(event_id: &str) -> Option<i64> {
    let digits = event_id.trim().strip_prefix("evt_")?;
    digits.parse::<i64>().ok()
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
