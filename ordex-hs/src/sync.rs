//! Cache synchronizer
//!
//! Rebuilds the denormalized history mirror and its checksum for one member
//! from the event store. Always a full rebuild, never an incremental patch:
//! the cache is a pure function of the event store, so a rebuild restores
//! consistency after any kind of divergence, including writes that bypassed
//! the service layer.

use crate::checksum::{self, EventSnapshot};
use ordex_common::db::members;
use ordex_common::{Error, Result};
use sha2::{Digest, Sha256};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

/// Rebuilds `history_mirror` / `history_checksum` on the member record
pub struct CacheSynchronizer {
    db: SqlitePool,
}

impl CacheSynchronizer {
    /// Create new cache synchronizer
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Rebuild one member's cache in its own transaction.
    ///
    /// Returns the new checksum. Idempotent: with no intervening event store
    /// change, repeated calls produce byte-identical mirror and checksum.
    pub async fn rebuild(&self, member_id: i64) -> Result<String> {
        let mut tx = self.db.begin().await?;
        let chk = Self::rebuild_on(&mut *tx, member_id).await?;
        tx.commit().await?;

        Ok(chk)
    }

    /// Rebuild one member's cache on an existing connection, composing into
    /// the caller's transaction.
    pub async fn rebuild_on(conn: &mut SqliteConnection, member_id: i64) -> Result<String> {
        let snapshots = project_history(&mut *conn, member_id).await?;

        let mirror_bytes = checksum::canonical_bytes(&snapshots)?;
        let chk = format!("{:x}", Sha256::digest(&mirror_bytes));
        let mirror = String::from_utf8(mirror_bytes)
            .map_err(|e| Error::Internal(format!("History mirror is not valid UTF-8: {}", e)))?;

        members::update_history_cache(&mut *conn, member_id, &mirror, &chk).await?;

        debug!(member_id, events = snapshots.len(), checksum = %chk, "Rebuilt history cache");

        Ok(chk)
    }
}

/// Canonical projection of one member's complete history (active and
/// inactive events), newest first by (effective_date, created_at, id)
pub async fn project_history<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    member_id: i64,
) -> Result<Vec<EventSnapshot>> {
    let rows = sqlx::query(
        r#"
        SELECT e.active, c.name AS code, t.name AS code_type, e.effective_date,
               c.description, e.notes, e.order_reference, e.origin
        FROM history_events e
        JOIN event_codes c ON c.id = e.code_id
        JOIN code_types t ON t.id = c.type_id
        WHERE e.member_id = ?
        ORDER BY e.effective_date DESC, e.created_at DESC, e.id DESC
        "#,
    )
    .bind(member_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .iter()
        .map(|row| EventSnapshot {
            active: row.get("active"),
            code: row.get("code"),
            code_type: row.get("code_type"),
            date: row
                .get::<chrono::NaiveDate, _>("effective_date")
                .format("%Y-%m-%d")
                .to_string(),
            description: row.get("description"),
            notes: row.get("notes"),
            order_reference: row.get("order_reference"),
            origin: row.get("origin"),
        })
        .collect())
}
