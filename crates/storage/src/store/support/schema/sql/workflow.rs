#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS position_applications (
          application_id TEXT PRIMARY KEY,
          position_type TEXT NOT NULL,
          applicant_name TEXT NOT NULL,
          current_stage TEXT NOT NULL,
          rejected_at_stage TEXT,
          attempt INTEGER NOT NULL DEFAULT 1,
          revision INTEGER NOT NULL DEFAULT 0,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS review_slots (
          application_id TEXT NOT NULL,
          stage TEXT NOT NULL,
          review_role TEXT NOT NULL,
          attempt INTEGER NOT NULL,
          opened_at_ms INTEGER NOT NULL,
          needs_manual_assignment INTEGER NOT NULL DEFAULT 0,
          resolved_at_ms INTEGER,
          PRIMARY KEY (application_id, stage, review_role, attempt),
          FOREIGN KEY (application_id)
            REFERENCES position_applications(application_id)
            ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS stage_outcomes (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          application_id TEXT NOT NULL,
          stage TEXT NOT NULL,
          review_role TEXT NOT NULL,
          attempt INTEGER NOT NULL,
          decision TEXT NOT NULL CHECK(decision IN ('pending', 'approved', 'rejected')),
          officer_id TEXT,
          comments TEXT,
          signature_id INTEGER,
          decided_at_ms INTEGER NOT NULL,
          FOREIGN KEY (application_id, stage, review_role, attempt)
            REFERENCES review_slots(application_id, stage, review_role, attempt)
            ON DELETE CASCADE
        );
"#;
