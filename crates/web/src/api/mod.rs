//! REST API endpoint modules.

pub mod branches;
pub mod register;
pub mod status;
