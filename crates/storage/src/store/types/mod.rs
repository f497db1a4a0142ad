#![forbid(unsafe_code)]

mod applications;
mod appointments;
mod assignment;
mod reporting;
mod signatures;
mod workflow;

pub use applications::*;
pub use appointments::*;
pub use assignment::*;
pub use reporting::*;
pub use signatures::*;
pub use workflow::*;
