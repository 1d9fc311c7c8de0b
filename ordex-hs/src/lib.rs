//! # Ordex History Service (ordex-hs)
//!
//! Initiatic-history consistency core for the ordex records backend.
//!
//! Each member's classified history events (inductions, role assignments,
//! sanctions) live in a normalized, append-mostly event table. A denormalized
//! JSON mirror of that history is cached on the member record for fast reads,
//! guarded by a SHA-256 checksum over its canonical serialization. This crate
//! owns everything that keeps the two representations consistent:
//!
//! - [`checksum`] — canonical snapshot projection and checksum engine
//! - [`db`] — event store access (`history_events` table)
//! - [`sync`] — full cache rebuild for one member
//! - [`services::history`] — create / deactivate / reactivate / list
//! - [`services::legacy`] — conversion and migration of prior-generation data
//! - [`services::audit`] — checksum verification and repair

pub mod checksum;
pub mod db;
pub mod error;
pub mod order_reference;
pub mod services;
pub mod sync;

pub use error::{HistoryError, HistoryResult};
pub use services::audit::{AuditSummary, IntegrityAuditor};
pub use services::history::{EventInput, HistoryService};
pub use services::legacy::{LegacyConverter, LegacyMigration, MigrationReport};
pub use sync::CacheSynchronizer;
