//! Data Transfer Objects for persistence.

mod session;

pub use session::{SESSION_SCHEMA_VERSION, SessionDTO, SessionV1_0_0};
