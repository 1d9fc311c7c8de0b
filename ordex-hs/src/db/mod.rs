//! Database access for ordex-hs
//!
//! Shared tables (members, classification codes) come from `ordex-common`;
//! this module owns the `history_events` table and its indexes.

pub mod events;

use ordex_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects through the shared initializer (pragmas + shared tables), then
/// creates the history-specific tables.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = ordex_common::db::init::init_database(db_path).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize history-specific tables (idempotent)
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS history_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER NOT NULL REFERENCES members(id),
            code_id INTEGER NOT NULL REFERENCES event_codes(id),
            effective_date TEXT NOT NULL,
            order_reference TEXT,
            notes TEXT,
            origin TEXT NOT NULL DEFAULT 'manual',
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Storage-level backstop for the per-member (code, order reference)
    // uniqueness of active events; racing creates fall through to this
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS history_events_order_ref
        ON history_events (member_id, code_id, order_reference)
        WHERE active = 1 AND order_reference IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS history_events_member_date
        ON history_events (member_id, effective_date DESC)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (history_events)");

    Ok(())
}
