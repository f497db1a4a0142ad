#![forbid(unsafe_code)]

pub mod ids;
pub mod model;
pub mod pipeline;
pub mod status;

pub use ids::{ApplicationId, IdError, OfficerId};
pub use model::{AssignmentStrategy, Decision, OfficerRole, PositionType, Stage};
pub use pipeline::StageResolution;
pub use status::{AppointmentStatus, SignatureStatus};

#[cfg(test)]
mod tests;
