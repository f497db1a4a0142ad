#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE INDEX IF NOT EXISTS idx_officers_role ON officers(role, is_active, officer_id);
        CREATE INDEX IF NOT EXISTS idx_events_application_seq ON events(application_id, seq);
        CREATE INDEX IF NOT EXISTS idx_applications_stage
          ON position_applications(position_type, current_stage);
        CREATE INDEX IF NOT EXISTS idx_review_slots_open
          ON review_slots(resolved_at_ms, opened_at_ms);
        CREATE INDEX IF NOT EXISTS idx_stage_outcomes_slot
          ON stage_outcomes(application_id, stage, review_role, attempt, seq);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_stage_outcomes_one_decision
          ON stage_outcomes(application_id, stage, review_role, attempt)
          WHERE decision <> 'pending';
        CREATE INDEX IF NOT EXISTS idx_rules_match
          ON auto_assignment_rules(position_type, target_role, is_active, priority);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_one_active
          ON assignment_histories(application_id, stage, review_role, attempt) WHERE is_active = 1;
        CREATE INDEX IF NOT EXISTS idx_assignments_officer
          ON assignment_histories(officer_id, is_active);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_one_active
          ON appointments(application_id) WHERE status IN ('scheduled', 'confirmed');
        CREATE INDEX IF NOT EXISTS idx_signatures_lookup
          ON digital_signatures(application_id, stage, officer_id, signature_id);
"#;
