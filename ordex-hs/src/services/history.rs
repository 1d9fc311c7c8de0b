//! Event service
//!
//! Public entry point for creating, deactivating, reactivating and listing
//! history events. Every mutation wraps the event store write and the cache
//! rebuild in one transaction, so the member's mirror and checksum are
//! consistent with the event store whenever a call returns successfully.

use crate::db::events::{self, HistoryEvent, NewEvent};
use crate::error::{HistoryError, HistoryResult};
use crate::order_reference;
use crate::sync::CacheSynchronizer;
use chrono::{Local, NaiveDate};
use ordex_common::db::{codes, members};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

fn default_origin() -> String {
    "manual".to_string()
}

/// Input payload for creating a history event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInput {
    pub code_id: Option<i64>,
    pub effective_date: Option<NaiveDate>,
    pub order_reference: Option<String>,
    pub notes: Option<String>,
    /// Provenance marker: "manual" for direct entry, "legacy" for migrated data
    #[serde(default = "default_origin")]
    pub origin: String,
}

impl Default for EventInput {
    fn default() -> Self {
        Self {
            code_id: None,
            effective_date: None,
            order_reference: None,
            notes: None,
            origin: default_origin(),
        }
    }
}

/// Event service over the history event store
pub struct HistoryService {
    db: SqlitePool,
}

impl HistoryService {
    /// Create new event service
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// List one member's events, newest first by (effective_date, created_at).
    ///
    /// Inactive events are filtered out unless `include_inactive` is set.
    pub async fn list_events(
        &self,
        member_id: i64,
        include_inactive: bool,
    ) -> HistoryResult<Vec<HistoryEvent>> {
        if !members::member_exists(&self.db, member_id).await? {
            return Err(HistoryError::InvalidOwner);
        }

        Ok(events::list_events(&self.db, member_id, include_inactive).await?)
    }

    /// Validate and create a history event, then rebuild the member's cache,
    /// all in one transaction.
    pub async fn create_event(
        &self,
        member_id: i64,
        input: EventInput,
    ) -> HistoryResult<HistoryEvent> {
        if !members::member_exists(&self.db, member_id).await? {
            return Err(HistoryError::InvalidOwner);
        }

        let code_id = input.code_id.ok_or(HistoryError::MissingCode)?;
        let code = codes::load_code(&self.db, code_id)
            .await?
            .ok_or_else(|| HistoryError::CodeNotFound(code_id.to_string()))?;

        let effective_date = input.effective_date.ok_or(HistoryError::MissingDate)?;
        let today = Local::now().date_naive();
        if effective_date > today {
            return Err(HistoryError::FutureDate(effective_date));
        }

        let reference = match input.order_reference.as_deref() {
            Some(raw) => order_reference::normalize(raw)?,
            None => None,
        };

        let mut tx = self.db.begin().await?;

        if let Some(reference) = &reference {
            if events::order_reference_in_use(&mut *tx, member_id, code.id, reference).await? {
                return Err(HistoryError::DuplicateOrderReference {
                    code_id: code.id,
                    reference: reference.clone(),
                });
            }
        }

        let new_event = NewEvent {
            member_id,
            code_id: code.id,
            effective_date,
            order_reference: reference.clone(),
            notes: input.notes,
            origin: input.origin,
        };

        // The partial unique index backstops the duplicate check under
        // concurrent creates
        let event_id = match events::insert_event(&mut *tx, &new_event, &events::timestamp_now())
            .await
        {
            Ok(id) => id,
            Err(ordex_common::Error::Database(e)) if is_unique_violation(&e) => {
                return Err(HistoryError::DuplicateOrderReference {
                    code_id: code.id,
                    reference: reference.unwrap_or_default(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        CacheSynchronizer::rebuild_on(&mut *tx, member_id).await?;
        tx.commit().await?;

        info!(member_id, event_id, code = %code.name, "Created history event");

        self.load_required(event_id).await
    }

    /// Soft-delete an event, appending a dated marker (plus the reason, when
    /// given) to its notes. No-op if the event is already inactive and no
    /// reason is supplied.
    pub async fn deactivate_event(
        &self,
        event_id: i64,
        reason: Option<&str>,
    ) -> HistoryResult<HistoryEvent> {
        let event = events::load_event(&self.db, event_id)
            .await?
            .ok_or(HistoryError::InvalidEvent)?;

        if !event.active && reason.is_none() {
            debug!(event_id, "Event already inactive, nothing to do");
            return Ok(event);
        }

        let today = Local::now().date_naive();
        let marker = match reason {
            Some(reason) => format!("[deactivated {}] {}", today.format("%Y-%m-%d"), reason),
            None => format!("[deactivated {}]", today.format("%Y-%m-%d")),
        };
        let notes = match event.notes.as_deref() {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, marker),
            _ => marker,
        };

        let mut tx = self.db.begin().await?;
        events::update_event_state(&mut *tx, event_id, false, Some(&notes)).await?;
        CacheSynchronizer::rebuild_on(&mut *tx, event.member_id).await?;
        tx.commit().await?;

        info!(event_id, member_id = event.member_id, "Deactivated history event");

        self.load_required(event_id).await
    }

    /// Restore a soft-deleted event. No-op if the event is already active.
    pub async fn reactivate_event(&self, event_id: i64) -> HistoryResult<HistoryEvent> {
        let event = events::load_event(&self.db, event_id)
            .await?
            .ok_or(HistoryError::InvalidEvent)?;

        if event.active {
            debug!(event_id, "Event already active, nothing to do");
            return Ok(event);
        }

        let mut tx = self.db.begin().await?;
        events::update_event_state(&mut *tx, event_id, true, event.notes.as_deref()).await?;
        CacheSynchronizer::rebuild_on(&mut *tx, event.member_id).await?;
        tx.commit().await?;

        info!(event_id, member_id = event.member_id, "Reactivated history event");

        self.load_required(event_id).await
    }

    async fn load_required(&self, event_id: i64) -> HistoryResult<HistoryEvent> {
        events::load_event(&self.db, event_id)
            .await?
            .ok_or_else(|| {
                ordex_common::Error::Internal(format!("Event {} vanished after write", event_id))
                    .into()
            })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}
