#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS appointments (
          appointment_id INTEGER PRIMARY KEY AUTOINCREMENT,
          application_id TEXT NOT NULL,
          scheduled_by TEXT NOT NULL,
          scheduled_at_ms INTEGER NOT NULL,
          place TEXT NOT NULL,
          status TEXT NOT NULL CHECK(status IN (
            'scheduled', 'confirmed', 'completed', 'cancelled', 'rescheduled'
          )),
          rescheduled_to_id INTEGER,
          completion_notes TEXT,
          cancel_reason TEXT,
          reminder_sent INTEGER NOT NULL DEFAULT 0,
          reminder_sent_at_ms INTEGER,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          FOREIGN KEY (application_id)
            REFERENCES position_applications(application_id)
            ON DELETE CASCADE,
          FOREIGN KEY (rescheduled_to_id) REFERENCES appointments(appointment_id),
          CHECK(rescheduled_to_id IS NULL OR rescheduled_to_id <> appointment_id),
          CHECK(status <> 'cancelled' OR cancel_reason IS NOT NULL)
        );
"#;
