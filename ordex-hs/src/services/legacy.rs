//! Legacy history conversion
//!
//! A prior schema generation stored each member's history as a free-form JSON
//! array directly on the member record: arbitrary key casing, Portuguese or
//! English key names, dates in several formats, and classifications given
//! either as a direct code id or as free text. The converter turns one such
//! object into an [`EventInput`]; the migration runner feeds converted inputs
//! through the event service so every create-time invariant applies to
//! migrated data as well.

use crate::error::{HistoryError, HistoryResult};
use crate::services::history::{EventInput, HistoryService};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ordex_common::db::codes;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Key aliases, tried in order
const DATE_KEYS: &[&str] = &["data", "date"];
const CODE_ID_KEYS: &[&str] = &["codigo", "code_id"];
const DESCRIPTION_KEYS: &[&str] = &["descricao", "description", "titulo", "title"];
const TYPE_KEYS: &[&str] = &["tipo", "type"];
const ORDER_REFERENCE_KEYS: &[&str] = &["ordem_servico", "order_reference"];
const NOTES_KEYS: &[&str] = &["observacoes", "notes"];

/// Date formats tried in order before the ISO datetime fallback
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Converts one legacy event object into an event service create-request
pub struct LegacyConverter {
    db: SqlitePool,
}

impl LegacyConverter {
    /// Create new legacy converter
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Convert one legacy event object.
    ///
    /// `code_cache` is an optional caller-owned lookup cache keyed by
    /// lowercased `type::description`, threaded through repeated calls to
    /// avoid redundant lookups across a large batch. It never changes
    /// outcomes: only successful resolutions are cached.
    pub async fn convert(
        &self,
        raw: &Value,
        mut code_cache: Option<&mut HashMap<String, i64>>,
    ) -> HistoryResult<EventInput> {
        let object = raw.as_object().ok_or_else(|| {
            ordex_common::Error::InvalidInput("Legacy record is not a JSON object".to_string())
        })?;

        // Normalize keys to lower case for lookup
        let fields: HashMap<String, &Value> = object
            .iter()
            .map(|(key, value)| (key.to_lowercase(), value))
            .collect();

        let effective_date = parse_date_field(&fields)?;
        let code_id = self.resolve_code(&fields, &mut code_cache).await?;

        // Order reference and notes are copied through verbatim; the event
        // service normalizes and validates them at create time
        Ok(EventInput {
            code_id: Some(code_id),
            effective_date: Some(effective_date),
            order_reference: text_field(&fields, ORDER_REFERENCE_KEYS),
            notes: text_field(&fields, NOTES_KEYS),
            origin: "legacy".to_string(),
        })
    }

    /// Resolve the classification code: direct id when present and
    /// resolvable, free-text description lookup otherwise.
    async fn resolve_code(
        &self,
        fields: &HashMap<String, &Value>,
        code_cache: &mut Option<&mut HashMap<String, i64>>,
    ) -> HistoryResult<i64> {
        if let Some(id) = integer_field(fields, CODE_ID_KEYS) {
            if codes::load_code(&self.db, id).await?.is_some() {
                return Ok(id);
            }
            debug!(code_id = id, "Legacy code id does not resolve, falling back to description");
        }

        let description = match text_field(fields, DESCRIPTION_KEYS) {
            Some(description) if !description.trim().is_empty() => description.trim().to_string(),
            _ => return Err(HistoryError::MissingCode),
        };
        let type_name = text_field(fields, TYPE_KEYS);

        let cache_key = format!(
            "{}::{}",
            type_name.as_deref().unwrap_or("").to_lowercase(),
            description.to_lowercase()
        );
        if let Some(cache) = code_cache.as_deref() {
            if let Some(&id) = cache.get(&cache_key) {
                return Ok(id);
            }
        }

        let matches =
            codes::find_code_ids_by_name(&self.db, &description, type_name.as_deref()).await?;
        let code_id = match matches.as_slice() {
            [] => return Err(HistoryError::CodeNotFound(description)),
            [only] => *only,
            [first, ..] => {
                warn!(
                    description = %description,
                    type_name = type_name.as_deref().unwrap_or("(any)"),
                    matches = matches.len(),
                    chosen = first,
                    "Ambiguous legacy classification, using first match"
                );
                *first
            }
        };

        if let Some(cache) = code_cache.as_deref_mut() {
            cache.insert(cache_key, code_id);
        }

        Ok(code_id)
    }
}

fn parse_date_field(fields: &HashMap<String, &Value>) -> HistoryResult<NaiveDate> {
    let text = match text_field(fields, DATE_KEYS) {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => return Err(HistoryError::MissingDate),
    };

    parse_legacy_date(&text).ok_or(HistoryError::UnparseableDate(text))
}

/// Try each known legacy date format in order, then the ISO datetime fallback
pub fn parse_legacy_date(text: &str) -> Option<NaiveDate> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime.date());
    }

    None
}

/// First alias key present with a usable textual value
fn text_field(fields: &HashMap<String, &Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        match fields.get(*key) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => continue,
        }
    }
    None
}

/// First alias key present with an integer value (number or numeric string)
fn integer_field(fields: &HashMap<String, &Value>, keys: &[&str]) -> Option<i64> {
    for key in keys {
        match fields.get(*key) {
            Some(Value::Number(n)) => return n.as_i64(),
            Some(Value::String(s)) => return s.trim().parse().ok(),
            _ => continue,
        }
    }
    None
}

/// Per-record migration failure
#[derive(Debug, Clone, Serialize)]
pub struct MigrationFailure {
    /// Member key as given in the input document
    pub member: String,
    /// Index of the failing record within that member's array
    pub index: usize,
    pub message: String,
}

/// Outcome of one migration run
#[derive(Debug, Default, Serialize)]
pub struct MigrationReport {
    pub total: usize,
    pub migrated: usize,
    pub failed: usize,
    pub failures: Vec<MigrationFailure>,
}

/// Batch migration of legacy history documents.
///
/// Each record is converted and created independently; a bad record is
/// recorded against its member and does not abort the batch. Infrastructure
/// faults still propagate.
pub struct LegacyMigration {
    converter: LegacyConverter,
    service: HistoryService,
}

impl LegacyMigration {
    /// Create new migration runner
    pub fn new(db: SqlitePool) -> Self {
        Self {
            converter: LegacyConverter::new(db.clone()),
            service: HistoryService::new(db),
        }
    }

    /// Migrate a document mapping member id to an array of legacy event
    /// objects. With `dry_run` set, records are converted and validated but
    /// nothing is written.
    pub async fn run(&self, document: &Value, dry_run: bool) -> HistoryResult<MigrationReport> {
        let members = document.as_object().ok_or_else(|| {
            ordex_common::Error::InvalidInput(
                "Migration input must be a JSON object keyed by member id".to_string(),
            )
        })?;

        let mut report = MigrationReport::default();
        let mut code_cache: HashMap<String, i64> = HashMap::new();

        for (member_key, records) in members {
            let member_id: Option<i64> = member_key.trim().parse().ok();

            let records = match records.as_array() {
                Some(records) => records,
                None => {
                    report.failed += 1;
                    report.failures.push(MigrationFailure {
                        member: member_key.clone(),
                        index: 0,
                        message: "Expected a JSON array of legacy events".to_string(),
                    });
                    continue;
                }
            };

            for (index, raw) in records.iter().enumerate() {
                report.total += 1;

                let outcome = self
                    .migrate_record(member_id, raw, &mut code_cache, dry_run)
                    .await;
                match outcome {
                    Ok(()) => report.migrated += 1,
                    Err(e) if e.is_validation() => {
                        debug!(member = %member_key, index, error = %e, "Legacy record rejected");
                        report.failed += 1;
                        report.failures.push(MigrationFailure {
                            member: member_key.clone(),
                            index,
                            message: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        info!(
            total = report.total,
            migrated = report.migrated,
            failed = report.failed,
            dry_run,
            "Legacy migration finished"
        );

        Ok(report)
    }

    async fn migrate_record(
        &self,
        member_id: Option<i64>,
        raw: &Value,
        code_cache: &mut HashMap<String, i64>,
        dry_run: bool,
    ) -> HistoryResult<()> {
        let member_id = member_id.ok_or(HistoryError::InvalidOwner)?;
        let input = self.converter.convert(raw, Some(code_cache)).await?;

        if !dry_run {
            self.service.create_event(member_id, input).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordex_common::db::members;
    use serde_json::json;

    async fn setup_test_db() -> (SqlitePool, i64, i64) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        ordex_common::db::init::create_shared_tables(&pool).await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();

        let member_id = members::insert_member(&pool, "Test Member").await.unwrap();
        let type_id = codes::insert_code_type(&pool, "Progressao").await.unwrap();
        let code_id = codes::insert_code(&pool, type_id, "Grau I", Some("Primeiro grau"))
            .await
            .unwrap();

        (pool, member_id, code_id)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_legacy_date_formats() {
        assert_eq!(parse_legacy_date("2024-01-05"), Some(date("2024-01-05")));
        assert_eq!(parse_legacy_date("05/01/2024"), Some(date("2024-01-05")));
        assert_eq!(parse_legacy_date("2024/01/05"), Some(date("2024-01-05")));
        assert_eq!(parse_legacy_date("05-01-2024"), Some(date("2024-01-05")));
        assert_eq!(
            parse_legacy_date("2024-01-05T10:30:00"),
            Some(date("2024-01-05"))
        );
        assert_eq!(
            parse_legacy_date("2024-01-05T10:30:00+00:00"),
            Some(date("2024-01-05"))
        );
        assert_eq!(parse_legacy_date("January 5, 2024"), None);
        assert_eq!(parse_legacy_date("31/31/2024"), None);
    }

    #[tokio::test]
    async fn test_convert_by_description_and_type() {
        let (pool, _member_id, code_id) = setup_test_db().await;
        let converter = LegacyConverter::new(pool);

        let raw = json!({
            "descricao": "Grau I",
            "tipo": "Progressao",
            "data": "2024-01-01",
            "ordem_servico": "OS/2024"
        });

        let input = converter.convert(&raw, None).await.unwrap();
        assert_eq!(input.code_id, Some(code_id));
        assert_eq!(input.effective_date, Some(date("2024-01-01")));
        assert_eq!(input.order_reference.as_deref(), Some("OS/2024"));
        assert_eq!(input.origin, "legacy");
    }

    #[tokio::test]
    async fn test_convert_is_case_insensitive() {
        let (pool, _member_id, code_id) = setup_test_db().await;
        let converter = LegacyConverter::new(pool);

        let raw = json!({
            "DESCRICAO": "grau i",
            "Tipo": "PROGRESSAO",
            "Data": "01/02/2024",
            "Observacoes": "carried over"
        });

        let input = converter.convert(&raw, None).await.unwrap();
        assert_eq!(input.code_id, Some(code_id));
        assert_eq!(input.effective_date, Some(date("2024-02-01")));
        assert_eq!(input.notes.as_deref(), Some("carried over"));
    }

    #[tokio::test]
    async fn test_convert_by_direct_code_id() {
        let (pool, _member_id, code_id) = setup_test_db().await;
        let converter = LegacyConverter::new(pool);

        let raw = json!({ "codigo": code_id, "data": "2024-01-01" });
        let input = converter.convert(&raw, None).await.unwrap();
        assert_eq!(input.code_id, Some(code_id));
    }

    #[tokio::test]
    async fn test_convert_unresolvable_code_id_falls_back_to_description() {
        let (pool, _member_id, code_id) = setup_test_db().await;
        let converter = LegacyConverter::new(pool);

        let raw = json!({
            "codigo": code_id + 500,
            "descricao": "Grau I",
            "data": "2024-01-01"
        });
        let input = converter.convert(&raw, None).await.unwrap();
        assert_eq!(input.code_id, Some(code_id));
    }

    #[tokio::test]
    async fn test_convert_missing_code() {
        let (pool, _member_id, _code_id) = setup_test_db().await;
        let converter = LegacyConverter::new(pool);

        let raw = json!({ "data": "2024-01-01" });
        let result = converter.convert(&raw, None).await;
        assert!(matches!(result, Err(HistoryError::MissingCode)));

        let raw = json!({ "descricao": "   ", "data": "2024-01-01" });
        let result = converter.convert(&raw, None).await;
        assert!(matches!(result, Err(HistoryError::MissingCode)));
    }

    #[tokio::test]
    async fn test_convert_unknown_description() {
        let (pool, _member_id, _code_id) = setup_test_db().await;
        let converter = LegacyConverter::new(pool);

        let raw = json!({ "descricao": "Grau XIX", "data": "2024-01-01" });
        let result = converter.convert(&raw, None).await;
        assert!(matches!(result, Err(HistoryError::CodeNotFound(_))));
    }

    #[tokio::test]
    async fn test_convert_unparseable_date() {
        let (pool, _member_id, _code_id) = setup_test_db().await;
        let converter = LegacyConverter::new(pool);

        let raw = json!({ "descricao": "Grau I", "data": "soon" });
        let result = converter.convert(&raw, None).await;
        assert!(matches!(result, Err(HistoryError::UnparseableDate(_))));
    }

    #[tokio::test]
    async fn test_code_cache_is_outcome_neutral() {
        let (pool, _member_id, code_id) = setup_test_db().await;
        let converter = LegacyConverter::new(pool);
        let mut cache = HashMap::new();

        let raw = json!({ "descricao": "Grau I", "tipo": "Progressao", "data": "2024-01-01" });

        let cold = converter.convert(&raw, Some(&mut cache)).await.unwrap();
        assert_eq!(cache.get("progressao::grau i"), Some(&code_id));

        let warm = converter.convert(&raw, Some(&mut cache)).await.unwrap();
        assert_eq!(cold.code_id, warm.code_id);
    }

    #[tokio::test]
    async fn test_migration_continues_past_bad_records() {
        let (pool, member_id, _code_id) = setup_test_db().await;
        let migration = LegacyMigration::new(pool.clone());

        let document = json!({
            (member_id.to_string()): [
                { "descricao": "Grau I", "tipo": "Progressao", "data": "2024-01-01" },
                { "descricao": "Grau I", "data": "not a date" },
                { "data": "2024-02-01" },
                { "descricao": "Grau I", "data": "02/03/2024", "observacoes": "late entry" }
            ]
        });

        let report = migration.run(&document, false).await.unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.migrated, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[1].index, 2);

        let service = HistoryService::new(pool);
        let events = service.list_events(member_id, true).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.origin == "legacy"));
    }

    #[tokio::test]
    async fn test_migration_dry_run_writes_nothing() {
        let (pool, member_id, _code_id) = setup_test_db().await;
        let migration = LegacyMigration::new(pool.clone());

        let document = json!({
            (member_id.to_string()): [
                { "descricao": "Grau I", "tipo": "Progressao", "data": "2024-01-01" }
            ]
        });

        let report = migration.run(&document, true).await.unwrap();
        assert_eq!(report.migrated, 1);

        let service = HistoryService::new(pool);
        assert!(service.list_events(member_id, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migration_unknown_member_is_recorded() {
        let (pool, _member_id, _code_id) = setup_test_db().await;
        let migration = LegacyMigration::new(pool);

        let document = json!({
            "9999": [ { "descricao": "Grau I", "data": "2024-01-01" } ]
        });

        let report = migration.run(&document, false).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].member, "9999");
    }
}
