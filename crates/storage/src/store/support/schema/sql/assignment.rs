#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS auto_assignment_rules (
          rule_id INTEGER PRIMARY KEY AUTOINCREMENT,
          position_type TEXT NOT NULL,
          target_role TEXT NOT NULL,
          strategy TEXT NOT NULL CHECK(strategy IN ('round_robin', 'least_workload', 'manual')),
          max_workload_per_officer INTEGER NOT NULL DEFAULT 0 CHECK(max_workload_per_officer >= 0),
          is_active INTEGER NOT NULL DEFAULT 1,
          priority INTEGER NOT NULL DEFAULT 0,
          last_round_robin_index INTEGER NOT NULL DEFAULT -1,
          escalation_time_hours INTEGER,
          escalation_role TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS assignment_histories (
          assignment_id INTEGER PRIMARY KEY AUTOINCREMENT,
          application_id TEXT NOT NULL,
          stage TEXT NOT NULL,
          review_role TEXT NOT NULL,
          attempt INTEGER NOT NULL,
          officer_id TEXT NOT NULL,
          previous_officer_id TEXT,
          strategy_used TEXT NOT NULL,
          rule_id INTEGER,
          is_active INTEGER NOT NULL,
          assigned_at_ms INTEGER NOT NULL,
          superseded_at_ms INTEGER,
          FOREIGN KEY (application_id, stage, review_role, attempt)
            REFERENCES review_slots(application_id, stage, review_role, attempt)
            ON DELETE CASCADE,
          FOREIGN KEY (officer_id) REFERENCES officers(officer_id)
        );
"#;
