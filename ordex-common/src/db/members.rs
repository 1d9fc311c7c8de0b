//! Member database operations
//!
//! The member record proper (addresses, enrollments, positions) is owned by
//! other modules; this core only needs existence checks and the two history
//! cache fields.

use crate::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, SqlitePool};

/// Member record (history-relevant projection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub display_name: String,
    /// Denormalized JSON array of history event snapshots, newest first
    pub history_mirror: String,
    /// Lowercase hex SHA-256 of the canonical mirror serialization
    pub history_checksum: Option<String>,
}

/// Insert a member, returning the new row id
pub async fn insert_member(pool: &SqlitePool, display_name: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO members (display_name) VALUES (?)")
        .bind(display_name)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Check whether a member row exists
pub async fn member_exists<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    member_id: i64,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE id = ?)")
        .bind(member_id)
        .fetch_one(executor)
        .await?;

    Ok(exists)
}

/// Load one member with its history cache fields
pub async fn load_member<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    member_id: i64,
) -> Result<Option<Member>> {
    let row = sqlx::query(
        r#"
        SELECT id, display_name, history_mirror, history_checksum
        FROM members
        WHERE id = ?
        "#,
    )
    .bind(member_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|row| Member {
        id: row.get("id"),
        display_name: row.get("display_name"),
        history_mirror: row.get("history_mirror"),
        history_checksum: row.get("history_checksum"),
    }))
}

/// Overwrite the two history cache fields for one member
///
/// This is the only writer of `history_mirror`/`history_checksum`; everything
/// else reads them.
pub async fn update_history_cache<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    member_id: i64,
    mirror: &str,
    checksum: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE members
        SET history_mirror = ?, history_checksum = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(mirror)
    .bind(checksum)
    .bind(member_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// List all member ids, ascending
pub async fn list_member_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar("SELECT id FROM members ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(ids)
}
