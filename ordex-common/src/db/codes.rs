//! Classification code database operations
//!
//! Codes categorize history events (induction grades, administrative roles,
//! sanctions). Each code belongs to exactly one classification type.

use crate::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, SqlitePool};

/// Classification type (e.g. "Progression", "Office", "Sanction")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeType {
    pub id: i64,
    pub name: String,
}

/// Classification code within a type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCode {
    pub id: i64,
    pub type_id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Insert a classification type, returning the new row id
pub async fn insert_code_type(pool: &SqlitePool, name: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO code_types (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Insert a classification code, returning the new row id
pub async fn insert_code(
    pool: &SqlitePool,
    type_id: i64,
    name: &str,
    description: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO event_codes (type_id, name, description) VALUES (?, ?, ?)")
        .bind(type_id)
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Load a classification code by id
pub async fn load_code<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    code_id: i64,
) -> Result<Option<EventCode>> {
    let row = sqlx::query("SELECT id, type_id, name, description FROM event_codes WHERE id = ?")
        .bind(code_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(|row| EventCode {
        id: row.get("id"),
        type_id: row.get("type_id"),
        name: row.get("name"),
        description: row.get("description"),
    }))
}

/// Find code ids by case-insensitive exact name, optionally narrowed by
/// classification type name. Ordered by id so callers that take the first
/// match get a deterministic one.
pub async fn find_code_ids_by_name<'e>(
    executor: impl sqlx::Executor<'e, Database = Sqlite>,
    name: &str,
    type_name: Option<&str>,
) -> Result<Vec<i64>> {
    let ids = match type_name {
        Some(type_name) => {
            sqlx::query_scalar(
                r#"
                SELECT c.id
                FROM event_codes c
                JOIN code_types t ON t.id = c.type_id
                WHERE LOWER(c.name) = LOWER(?) AND LOWER(t.name) = LOWER(?)
                ORDER BY c.id
                "#,
            )
            .bind(name)
            .bind(type_name)
            .fetch_all(executor)
            .await?
        }
        None => {
            sqlx::query_scalar(
                "SELECT id FROM event_codes WHERE LOWER(name) = LOWER(?) ORDER BY id",
            )
            .bind(name)
            .fetch_all(executor)
            .await?
        }
    };

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::create_shared_tables;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_shared_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_insert_and_load_code() {
        let pool = setup_test_db().await;

        let type_id = insert_code_type(&pool, "Progression").await.unwrap();
        let code_id = insert_code(&pool, type_id, "First Degree", Some("Entered"))
            .await
            .unwrap();

        let code = load_code(&pool, code_id).await.unwrap().unwrap();
        assert_eq!(code.type_id, type_id);
        assert_eq!(code.name, "First Degree");
        assert_eq!(code.description.as_deref(), Some("Entered"));

        assert!(load_code(&pool, code_id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_code_ids_case_insensitive() {
        let pool = setup_test_db().await;

        let type_id = insert_code_type(&pool, "Progression").await.unwrap();
        let code_id = insert_code(&pool, type_id, "First Degree", None).await.unwrap();

        let ids = find_code_ids_by_name(&pool, "FIRST degree", None).await.unwrap();
        assert_eq!(ids, vec![code_id]);
    }

    #[tokio::test]
    async fn test_find_code_ids_scoped_by_type() {
        let pool = setup_test_db().await;

        let progression = insert_code_type(&pool, "Progression").await.unwrap();
        let office = insert_code_type(&pool, "Office").await.unwrap();
        let in_progression = insert_code(&pool, progression, "Herald", None).await.unwrap();
        let in_office = insert_code(&pool, office, "Herald", None).await.unwrap();

        // Unscoped lookup sees both, ordered by id
        let all = find_code_ids_by_name(&pool, "herald", None).await.unwrap();
        assert_eq!(all, vec![in_progression, in_office]);

        // Scoped lookup sees only the matching type
        let scoped = find_code_ids_by_name(&pool, "herald", Some("office")).await.unwrap();
        assert_eq!(scoped, vec![in_office]);
    }
}
