//! Integrity auditing
//!
//! The event store is the source of truth; the member-record cache can drift
//! when something writes around the service layer (historical migration bugs,
//! manual data fixes). The auditor recomputes each member's checksum from the
//! event store, compares it to the stored value, and optionally repairs
//! divergence by rebuilding the cache.

use crate::checksum;
use crate::error::HistoryResult;
use crate::sync::{self, CacheSynchronizer};
use ordex_common::db::members;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Outcome of one audit run
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditSummary {
    pub total: usize,
    pub intact_count: usize,
    pub divergent_count: usize,
    pub repaired_count: usize,
    /// Divergent members, for operator review
    pub divergent_member_ids: Vec<i64>,
}

/// Recomputes and verifies history checksums across members
pub struct IntegrityAuditor {
    db: SqlitePool,
    synchronizer: CacheSynchronizer,
}

impl IntegrityAuditor {
    /// Create new integrity auditor
    pub fn new(db: SqlitePool) -> Self {
        Self {
            synchronizer: CacheSynchronizer::new(db.clone()),
            db,
        }
    }

    /// Audit all members, or the given subset. With `repair` set, divergent
    /// members get their cache rebuilt and re-verified.
    ///
    /// Safe to run repeatedly; repair is a cache rebuild and is idempotent.
    pub async fn audit(
        &self,
        member_ids: Option<&[i64]>,
        repair: bool,
    ) -> HistoryResult<AuditSummary> {
        let ids = match member_ids {
            Some(ids) => ids.to_vec(),
            None => members::list_member_ids(&self.db).await?,
        };

        let mut summary = AuditSummary::default();

        for member_id in ids {
            let member = match members::load_member(&self.db, member_id).await? {
                Some(member) => member,
                None => {
                    warn!(member_id, "Skipping unknown member");
                    continue;
                }
            };
            summary.total += 1;

            let snapshots = sync::project_history(&self.db, member_id).await?;
            let expected = checksum::mirror_checksum(&snapshots)?;

            if member.history_checksum.as_deref() == Some(expected.as_str()) {
                debug!(member_id, "History cache intact");
                summary.intact_count += 1;
                continue;
            }

            warn!(
                member_id,
                stored = member.history_checksum.as_deref().unwrap_or("(none)"),
                expected = %expected,
                "History cache divergent"
            );
            summary.divergent_count += 1;
            summary.divergent_member_ids.push(member_id);

            if repair {
                self.synchronizer.rebuild(member_id).await?;

                // Re-read to confirm the rebuild took
                let repaired = members::load_member(&self.db, member_id).await?;
                let confirmed = repaired
                    .and_then(|m| m.history_checksum)
                    .map(|chk| chk == expected)
                    .unwrap_or(false);
                if confirmed {
                    info!(member_id, "History cache repaired");
                    summary.repaired_count += 1;
                } else {
                    warn!(member_id, "History cache still divergent after rebuild");
                }
            }
        }

        info!(
            total = summary.total,
            intact = summary.intact_count,
            divergent = summary.divergent_count,
            repaired = summary.repaired_count,
            "Integrity audit finished"
        );

        Ok(summary)
    }
}
