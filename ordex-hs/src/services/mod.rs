//! History services

pub mod audit;
pub mod history;
pub mod legacy;

pub use audit::{AuditSummary, IntegrityAuditor};
pub use history::{EventInput, HistoryService};
pub use legacy::{LegacyConverter, LegacyMigration, MigrationReport};
