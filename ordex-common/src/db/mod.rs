//! Database models and queries

pub mod codes;
pub mod init;
pub mod members;

pub use codes::{CodeType, EventCode};
pub use members::Member;
