#![forbid(unsafe_code)]

//! OTP issue and verification in front of the HSM. The HSM call itself always runs between
//! two transactions, never inside one.

use super::applications::load_application_tx;
use super::assignment::{SlotKey, authorize_assignee_tx, resolve_review_role};
use super::hsm::{HsmClient, HsmError, HsmSignRequest, sign_with_retry};
use super::support::{enum_col, insert_event_tx};
use super::{
    ApplicationRow, OtpGenerateRequest, OtpIssue, SignatureApplyRequest, SignatureApplyResult,
    SignatureOutcome, SignatureRow, SqliteStore, StoreError, WorkflowPolicy,
    canonicalize_application, canonicalize_officer, write_tx,
};
use pm_core::pipeline::is_signature_gated;
use pm_core::{SignatureStatus, Stage};
use rand::Rng;
use rand::rngs::OsRng;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

const SIGNATURE_COLUMNS: &str = "signature_id, application_id, stage, attempt, officer_id, status, \
     otp_expires_at_ms, otp_attempts, hsm_transaction_id, signed_document_path, failure_reason, \
     failed_at_ms, created_at_ms, updated_at_ms";

const REASON_OTP_EXHAUSTED: &str = "otp_attempts_exceeded";
const REASON_HSM_UNAVAILABLE: &str = "hsm_unavailable";
const REASON_HSM_REJECTED: &str = "hsm_rejected";

impl SqliteStore {
    /// Issues a fresh OTP for the assignee of a signing stage. The plaintext code is only in
    /// the returned value.
    pub fn generate_otp(&mut self, request: OtpGenerateRequest) -> Result<OtpIssue, StoreError> {
        let application_id = canonicalize_application(&request.application_id)?;
        let officer_id = canonicalize_officer(&request.officer_id)?;
        let policy = self.policy.clone();
        let now_ms = request.now_ms;

        let tx = write_tx(&mut self.conn)?;
        let (_, slot) = signing_slot_tx(&tx, &application_id, request.stage, &officer_id)?;

        let signature_id = match latest_signature_tx(&tx, &slot, &officer_id)? {
            None => insert_signature_tx(&tx, &slot, &officer_id, now_ms)?,
            Some(record) => match record.status {
                SignatureStatus::Signed => {
                    return Err(StoreError::AlreadySigned {
                        signature_id: record.signature_id,
                    });
                }
                SignatureStatus::Failed => {
                    let retry_after_ms = retry_after_ms(&record, &policy, now_ms);
                    if retry_after_ms > 0 {
                        return Err(StoreError::OtpAttemptsExceeded {
                            signature_id: record.signature_id,
                            retry_after_ms,
                        });
                    }
                    insert_signature_tx(&tx, &slot, &officer_id, now_ms)?
                }
                SignatureStatus::OtpIssued => {
                    let expires_at_ms = record.otp_expires_at_ms.unwrap_or(0);
                    if now_ms < expires_at_ms {
                        return Err(StoreError::OtpAlreadyIssued {
                            signature_id: record.signature_id,
                            expires_at_ms,
                        });
                    }
                    expire_otp_tx(&tx, &record, now_ms)?;
                    record.signature_id
                }
                SignatureStatus::Pending => record.signature_id,
            },
        };

        let otp_code = issue_otp_tx(&tx, signature_id, &application_id, now_ms, policy.otp_ttl_ms)?;
        let record = load_signature_tx(&tx, signature_id)?;
        tx.commit()?;

        tracing::info!(
            application_id = %application_id,
            signature_id,
            stage = request.stage.as_str(),
            "otp issued"
        );
        Ok(OtpIssue { record, otp_code })
    }

    /// Verifies the OTP and, when it matches, asks the HSM to sign.
    ///
    /// A wrong code is not an error: the attempt is recorded and reported as `Mismatch`, or
    /// `Failed` once the attempts run out.
    pub fn apply_signature(
        &mut self,
        request: SignatureApplyRequest,
        hsm: &dyn HsmClient,
    ) -> Result<SignatureApplyResult, StoreError> {
        let application_id = canonicalize_application(&request.application_id)?;
        let officer_id = canonicalize_officer(&request.officer_id)?;
        let otp_code = request.otp_code.trim();
        if otp_code.is_empty() {
            return Err(StoreError::InvalidInput("otp_code must not be empty"));
        }
        let document_path = request
            .document_path
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let policy = self.policy.clone();
        let now_ms = request.now_ms;

        let tx = write_tx(&mut self.conn)?;
        let (_, slot) = signing_slot_tx(&tx, &application_id, request.stage, &officer_id)?;
        let record = latest_signature_tx(&tx, &slot, &officer_id)?
            .ok_or(StoreError::InvalidInput("otp has not been issued"))?;
        match record.status {
            SignatureStatus::OtpIssued => {}
            SignatureStatus::Pending => {
                return Err(StoreError::InvalidInput("otp has not been issued"));
            }
            SignatureStatus::Signed => {
                return Err(StoreError::AlreadySigned {
                    signature_id: record.signature_id,
                });
            }
            SignatureStatus::Failed => {
                return Err(StoreError::OtpAttemptsExceeded {
                    signature_id: record.signature_id,
                    retry_after_ms: retry_after_ms(&record, &policy, now_ms),
                });
            }
        }

        let (otp_hash, verified_at_ms) = otp_secret_tx(&tx, record.signature_id)?;
        if verified_at_ms.is_some() {
            return Err(StoreError::InvalidInput("signature is already being applied"));
        }
        if record.otp_expires_at_ms.is_none_or(|expires| now_ms >= expires) {
            expire_otp_tx(&tx, &record, now_ms)?;
            tx.commit()?;
            return Err(StoreError::OtpExpired {
                signature_id: record.signature_id,
            });
        }

        if otp_hash.as_deref() != Some(otp_digest(record.signature_id, otp_code).as_str()) {
            let attempts = record.otp_attempts + 1;
            let exhausted = attempts >= policy.max_otp_attempts;
            if exhausted {
                mark_failed_tx(&tx, &record, REASON_OTP_EXHAUSTED, Some(attempts), now_ms)?;
            } else {
                tx.execute(
                    "UPDATE digital_signatures SET otp_attempts=?2, updated_at_ms=?3 \
                     WHERE signature_id=?1",
                    params![record.signature_id, attempts, now_ms],
                )?;
                insert_event_tx(
                    &tx,
                    now_ms,
                    Some(&application_id),
                    "signature_otp_mismatch",
                    &json!({ "signature_id": record.signature_id, "otp_attempts": attempts }),
                )?;
            }
            let record = load_signature_tx(&tx, record.signature_id)?;
            tx.commit()?;

            tracing::warn!(
                application_id = %application_id,
                signature_id = record.signature_id,
                attempts,
                "otp mismatch"
            );
            let outcome = if exhausted {
                SignatureOutcome::Failed
            } else {
                SignatureOutcome::Mismatch {
                    attempts_remaining: policy.max_otp_attempts - attempts,
                }
            };
            return Ok(SignatureApplyResult { record, outcome });
        }

        let verified = tx.execute(
            r#"
            UPDATE digital_signatures SET otp_verified_at_ms=?2, otp_hash=NULL, updated_at_ms=?2
            WHERE signature_id=?1 AND status='otp_issued' AND otp_verified_at_ms IS NULL
            "#,
            params![record.signature_id, now_ms],
        )?;
        if verified == 0 {
            return Err(StoreError::InvalidInput("signature is already being applied"));
        }
        insert_event_tx(
            &tx,
            now_ms,
            Some(&application_id),
            "signature_otp_verified",
            &json!({ "signature_id": record.signature_id }),
        )?;
        tx.commit()?;

        let hsm_request = HsmSignRequest {
            signature_id: record.signature_id,
            application_id: &application_id,
            stage: record.stage,
            officer_id: &officer_id,
            document_path,
        };
        let signed = sign_with_retry(hsm, &hsm_request, policy.hsm_retries, policy.hsm_backoff);

        let tx = write_tx(&mut self.conn)?;
        match signed {
            Ok(receipt) => {
                tx.execute(
                    r#"
                    UPDATE digital_signatures
                    SET status=?2, hsm_transaction_id=?3, signed_document_path=?4, updated_at_ms=?5
                    WHERE signature_id=?1
                    "#,
                    params![
                        record.signature_id,
                        SignatureStatus::Signed.as_str(),
                        receipt.transaction_id,
                        receipt.signed_document_path,
                        now_ms,
                    ],
                )?;
                insert_event_tx(
                    &tx,
                    now_ms,
                    Some(&application_id),
                    "signature_signed",
                    &json!({
                        "signature_id": record.signature_id,
                        "hsm_transaction_id": receipt.transaction_id,
                    }),
                )?;
                let record = load_signature_tx(&tx, record.signature_id)?;
                tx.commit()?;

                tracing::info!(
                    application_id = %application_id,
                    signature_id = record.signature_id,
                    "document signed"
                );
                Ok(SignatureApplyResult {
                    record,
                    outcome: SignatureOutcome::Signed,
                })
            }
            Err(failure) => {
                let reason = match failure.error {
                    HsmError::Unavailable(_) => REASON_HSM_UNAVAILABLE,
                    HsmError::Rejected(_) => REASON_HSM_REJECTED,
                };
                mark_failed_tx(&tx, &record, reason, None, now_ms)?;
                tx.commit()?;

                tracing::error!(
                    application_id = %application_id,
                    signature_id = record.signature_id,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "hsm signing failed"
                );
                Err(match failure.error {
                    HsmError::Unavailable(detail) => StoreError::HsmUnavailable {
                        attempts: failure.attempts,
                        detail,
                    },
                    HsmError::Rejected(detail) => StoreError::HsmRejected { detail },
                })
            }
        }
    }

    pub fn signatures_for(&self, application_id: &str) -> Result<Vec<SignatureRow>, StoreError> {
        let application_id = canonicalize_application(application_id)?;
        load_application_tx(&self.conn, &application_id)?;
        signatures_for_application_tx(&self.conn, &application_id)
    }
}

fn signing_slot_tx(
    conn: &Connection,
    application_id: &str,
    stage: Stage,
    officer_id: &str,
) -> Result<(ApplicationRow, SlotKey), StoreError> {
    if !is_signature_gated(stage) {
        return Err(StoreError::InvalidInput("stage does not take a signature"));
    }
    let application = load_application_tx(conn, application_id)?;
    if application.current_stage != stage {
        return Err(StoreError::StaleState {
            application_id: application.application_id,
            requested: stage,
            current: application.current_stage,
        });
    }
    let role = resolve_review_role(application.position_type, stage, None)?;
    let slot = SlotKey::new(&application, stage, role);
    authorize_assignee_tx(conn, &slot, officer_id)?;
    Ok((application, slot))
}

/// Only OTP exhaustion imposes a cool-down; an HSM failure may be retried with a new OTP
/// immediately.
fn retry_after_ms(record: &SignatureRow, policy: &WorkflowPolicy, now_ms: i64) -> i64 {
    if record.failure_reason.as_deref() != Some(REASON_OTP_EXHAUSTED) {
        return 0;
    }
    let failed_at_ms = record.failed_at_ms.unwrap_or(record.updated_at_ms);
    failed_at_ms
        .saturating_add(policy.otp_cooldown_ms)
        .saturating_sub(now_ms)
        .max(0)
}

fn otp_digest(signature_id: i64, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature_id.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn insert_signature_tx(
    conn: &Connection,
    slot: &SlotKey,
    officer_id: &str,
    now_ms: i64,
) -> Result<i64, StoreError> {
    conn.execute(
        r#"
        INSERT INTO digital_signatures(application_id, stage, attempt, officer_id, status,
                                       otp_attempts, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
        "#,
        params![
            slot.application_id,
            slot.stage.as_str(),
            slot.attempt,
            officer_id,
            SignatureStatus::Pending.as_str(),
            now_ms,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn issue_otp_tx(
    conn: &Connection,
    signature_id: i64,
    application_id: &str,
    now_ms: i64,
    ttl_ms: i64,
) -> Result<String, StoreError> {
    let expires_at_ms = now_ms
        .checked_add(ttl_ms)
        .ok_or(StoreError::InvalidInput("now_ms is out of range"))?;
    let code = format!("{:06}", OsRng.gen_range(0..1_000_000u32));
    conn.execute(
        r#"
        UPDATE digital_signatures
        SET status=?2, otp_hash=?3, otp_expires_at_ms=?4, otp_attempts=0,
            otp_verified_at_ms=NULL, updated_at_ms=?5
        WHERE signature_id=?1
        "#,
        params![
            signature_id,
            SignatureStatus::OtpIssued.as_str(),
            otp_digest(signature_id, &code),
            expires_at_ms,
            now_ms,
        ],
    )?;
    insert_event_tx(
        conn,
        now_ms,
        Some(application_id),
        "signature_otp_issued",
        &json!({ "signature_id": signature_id, "expires_at_ms": expires_at_ms }),
    )?;
    Ok(code)
}

fn expire_otp_tx(conn: &Connection, record: &SignatureRow, now_ms: i64) -> Result<(), StoreError> {
    conn.execute(
        r#"
        UPDATE digital_signatures
        SET status=?2, otp_hash=NULL, otp_expires_at_ms=NULL, updated_at_ms=?3
        WHERE signature_id=?1
        "#,
        params![record.signature_id, SignatureStatus::Pending.as_str(), now_ms],
    )?;
    insert_event_tx(
        conn,
        now_ms,
        Some(&record.application_id),
        "signature_otp_expired",
        &json!({ "signature_id": record.signature_id }),
    )?;
    Ok(())
}

fn mark_failed_tx(
    conn: &Connection,
    record: &SignatureRow,
    reason: &str,
    otp_attempts: Option<i64>,
    now_ms: i64,
) -> Result<(), StoreError> {
    conn.execute(
        r#"
        UPDATE digital_signatures
        SET status=?2, failure_reason=?3, failed_at_ms=?4, otp_hash=NULL,
            otp_attempts=COALESCE(?5, otp_attempts), updated_at_ms=?4
        WHERE signature_id=?1
        "#,
        params![
            record.signature_id,
            SignatureStatus::Failed.as_str(),
            reason,
            now_ms,
            otp_attempts,
        ],
    )?;
    insert_event_tx(
        conn,
        now_ms,
        Some(&record.application_id),
        "signature_failed",
        &json!({ "signature_id": record.signature_id, "reason": reason }),
    )?;
    Ok(())
}

fn otp_secret_tx(
    conn: &Connection,
    signature_id: i64,
) -> Result<(Option<String>, Option<i64>), StoreError> {
    Ok(conn.query_row(
        "SELECT otp_hash, otp_verified_at_ms FROM digital_signatures WHERE signature_id=?1",
        params![signature_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?)
}

fn latest_signature_tx(
    conn: &Connection,
    slot: &SlotKey,
    officer_id: &str,
) -> Result<Option<SignatureRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {SIGNATURE_COLUMNS} FROM digital_signatures \
                 WHERE application_id=?1 AND stage=?2 AND attempt=?3 AND officer_id=?4 \
                 ORDER BY signature_id DESC LIMIT 1"
            ),
            params![slot.application_id, slot.stage.as_str(), slot.attempt, officer_id],
            signature_from_row,
        )
        .optional()?)
}

/// The Signed record that backs an approval of `slot` by `officer_id`, if any.
pub(super) fn signed_signature_id_tx(
    conn: &Connection,
    slot: &SlotKey,
    officer_id: &str,
) -> Result<Option<i64>, StoreError> {
    Ok(conn
        .query_row(
            r#"
            SELECT signature_id FROM digital_signatures
            WHERE application_id=?1 AND stage=?2 AND attempt=?3 AND officer_id=?4
              AND status='signed'
            ORDER BY signature_id DESC LIMIT 1
            "#,
            params![slot.application_id, slot.stage.as_str(), slot.attempt, officer_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?)
}

fn load_signature_tx(conn: &Connection, signature_id: i64) -> Result<SignatureRow, StoreError> {
    conn.query_row(
        &format!("SELECT {SIGNATURE_COLUMNS} FROM digital_signatures WHERE signature_id=?1"),
        params![signature_id],
        signature_from_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownId)
}

pub(super) fn signatures_for_application_tx(
    conn: &Connection,
    application_id: &str,
) -> Result<Vec<SignatureRow>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SIGNATURE_COLUMNS} FROM digital_signatures \
         WHERE application_id=?1 ORDER BY signature_id ASC"
    ))?;
    let rows = stmt.query_map(params![application_id], signature_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn signature_from_row(row: &Row<'_>) -> rusqlite::Result<SignatureRow> {
    Ok(SignatureRow {
        signature_id: row.get(0)?,
        application_id: row.get(1)?,
        stage: enum_col(row, 2, Stage::parse)?,
        attempt: row.get(3)?,
        officer_id: row.get(4)?,
        status: enum_col(row, 5, SignatureStatus::parse)?,
        otp_expires_at_ms: row.get(6)?,
        otp_attempts: row.get(7)?,
        hsm_transaction_id: row.get(8)?,
        signed_document_path: row.get(9)?,
        failure_reason: row.get(10)?,
        failed_at_ms: row.get(11)?,
        created_at_ms: row.get(12)?,
        updated_at_ms: row.get(13)?,
    })
}
