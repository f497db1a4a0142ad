#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS digital_signatures (
          signature_id INTEGER PRIMARY KEY AUTOINCREMENT,
          application_id TEXT NOT NULL,
          stage TEXT NOT NULL,
          attempt INTEGER NOT NULL,
          officer_id TEXT NOT NULL,
          status TEXT NOT NULL CHECK(status IN ('pending', 'otp_issued', 'signed', 'failed')),
          otp_hash TEXT,
          otp_expires_at_ms INTEGER,
          otp_attempts INTEGER NOT NULL DEFAULT 0,
          otp_verified_at_ms INTEGER,
          hsm_transaction_id TEXT,
          signed_document_path TEXT,
          failure_reason TEXT,
          failed_at_ms INTEGER,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          FOREIGN KEY (application_id)
            REFERENCES position_applications(application_id)
            ON DELETE CASCADE
        );
"#;
