//! History event database operations
//!
//! The event store is append-mostly: rows are inserted by the event service,
//! soft-deactivated or reactivated by the same, and never physically deleted.

use chrono::{NaiveDate, Utc};
use ordex_common::Result;
use sqlx::{Row, Sqlite};

/// History event row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEvent {
    pub id: i64,
    pub member_id: i64,
    pub code_id: i64,
    pub effective_date: NaiveDate,
    pub order_reference: Option<String>,
    pub notes: Option<String>,
    pub origin: String,
    pub active: bool,
    pub created_at: String,
}

/// Fields for a new history event row
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub member_id: i64,
    pub code_id: i64,
    pub effective_date: NaiveDate,
    pub order_reference: Option<String>,
    pub notes: Option<String>,
    pub origin: String,
}

/// Current UTC timestamp in the `created_at` column format.
///
/// Microsecond precision keeps the (effective_date, created_at) ordering
/// stable for events recorded on the same day.
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn event_from_row(row: &sqlx::sqlite::SqliteRow) -> HistoryEvent {
    HistoryEvent {
        id: row.get("id"),
        member_id: row.get("member_id"),
        code_id: row.get("code_id"),
        effective_date: row.get("effective_date"),
        order_reference: row.get("order_reference"),
        notes: row.get("notes"),
        origin: row.get("origin"),
        active: row.get("active"),
        created_at: row.get("created_at"),
    }
}

/// Insert a history event row, returning the new row id
pub async fn insert_event<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    event: &NewEvent,
    created_at: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO history_events (
            member_id, code_id, effective_date, order_reference, notes, origin, active, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(event.member_id)
    .bind(event.code_id)
    .bind(event.effective_date)
    .bind(&event.order_reference)
    .bind(&event.notes)
    .bind(&event.origin)
    .bind(created_at)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load one history event by id
pub async fn load_event<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    event_id: i64,
) -> Result<Option<HistoryEvent>> {
    let row = sqlx::query(
        r#"
        SELECT id, member_id, code_id, effective_date, order_reference,
               notes, origin, active, created_at
        FROM history_events
        WHERE id = ?
        "#,
    )
    .bind(event_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.as_ref().map(event_from_row))
}

/// List one member's history events, newest first by
/// (effective_date, created_at, id)
pub async fn list_events<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    member_id: i64,
    include_inactive: bool,
) -> Result<Vec<HistoryEvent>> {
    let sql = if include_inactive {
        r#"
        SELECT id, member_id, code_id, effective_date, order_reference,
               notes, origin, active, created_at
        FROM history_events
        WHERE member_id = ?
        ORDER BY effective_date DESC, created_at DESC, id DESC
        "#
    } else {
        r#"
        SELECT id, member_id, code_id, effective_date, order_reference,
               notes, origin, active, created_at
        FROM history_events
        WHERE member_id = ? AND active = 1
        ORDER BY effective_date DESC, created_at DESC, id DESC
        "#
    };

    let rows = sqlx::query(sql).bind(member_id).fetch_all(executor).await?;

    Ok(rows.iter().map(event_from_row).collect())
}

/// Check whether an active event already carries this (code, order reference)
/// pair for the member
pub async fn order_reference_in_use<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    member_id: i64,
    code_id: i64,
    order_reference: &str,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM history_events
            WHERE member_id = ? AND code_id = ? AND order_reference = ? AND active = 1
        )
        "#,
    )
    .bind(member_id)
    .bind(code_id)
    .bind(order_reference)
    .fetch_one(executor)
    .await?;

    Ok(exists)
}

/// Update the soft-delete state and notes of one event
pub async fn update_event_state<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    event_id: i64,
    active: bool,
    notes: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE history_events SET active = ?, notes = ? WHERE id = ?")
        .bind(active)
        .bind(notes)
        .bind(event_id)
        .execute(executor)
        .await?;

    Ok(())
}
