#![forbid(unsafe_code)]

mod events;
mod rows;
mod schema;

pub(super) use events::insert_event_tx;
pub(super) use rows::{bool_col, enum_col, opt_enum_col};
pub(super) use schema::{install_schema, preflight_gate};
