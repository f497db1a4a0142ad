#![forbid(unsafe_code)]

mod appointments;
mod assignment;
mod core;
mod indexes;
mod signatures;
mod workflow;

pub(super) const REQUIRED_TABLES: [&str; 10] = [
    "schema_state",
    "officers",
    "position_applications",
    "review_slots",
    "stage_outcomes",
    "auto_assignment_rules",
    "assignment_histories",
    "appointments",
    "digital_signatures",
    "events",
];

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(core::SQL);
    sql.push_str(workflow::SQL);
    sql.push_str(assignment::SQL);
    sql.push_str(appointments::SQL);
    sql.push_str(signatures::SQL);
    sql.push_str(indexes::SQL);
    sql
}
