//! Error types for the history core
//!
//! Every variant except the infrastructure passthroughs is a synchronous
//! validation failure addressed to a single input field, so form and API
//! layers can surface it per-field.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for history operations
pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

/// History core error type
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Member reference is missing or not persisted
    #[error("Member reference is missing or not persisted")]
    InvalidOwner,

    /// Event reference is missing or not persisted
    #[error("Event reference is missing or not persisted")]
    InvalidEvent,

    /// No classification code supplied and none resolvable
    #[error("No classification code supplied")]
    MissingCode,

    /// Classification code does not resolve to an existing code
    #[error("Classification code not found: {0}")]
    CodeNotFound(String),

    /// Effective date absent
    #[error("Effective date is required")]
    MissingDate,

    /// Effective date lies in the future
    #[error("Effective date {0} is in the future")]
    FutureDate(NaiveDate),

    /// Order reference is malformed or its year is out of range
    #[error("Invalid order reference {reference:?}: {reason}")]
    InvalidOrderReference { reference: String, reason: String },

    /// Another active event for the same member already carries this
    /// (code, order reference) pair
    #[error("Order reference {reference:?} already in use for code {code_id}")]
    DuplicateOrderReference { code_id: i64, reference: String },

    /// Legacy conversion only: none of the known date formats matched
    #[error("Unparseable legacy date: {0:?}")]
    UnparseableDate(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Shared infrastructure error
    #[error(transparent)]
    Common(#[from] ordex_common::Error),
}

impl HistoryError {
    /// True for validation failures; false for infrastructure faults that
    /// should propagate instead of being recorded against a batch item.
    pub fn is_validation(&self) -> bool {
        !matches!(self, HistoryError::Database(_) | HistoryError::Common(_))
    }

    /// The input field a validation failure concerns, if any
    pub fn field(&self) -> Option<&'static str> {
        match self {
            HistoryError::InvalidOwner => Some("member"),
            HistoryError::InvalidEvent => Some("event"),
            HistoryError::MissingCode | HistoryError::CodeNotFound(_) => Some("code"),
            HistoryError::MissingDate
            | HistoryError::FutureDate(_)
            | HistoryError::UnparseableDate(_) => Some("effective_date"),
            HistoryError::InvalidOrderReference { .. }
            | HistoryError::DuplicateOrderReference { .. } => Some("order_reference"),
            HistoryError::Database(_) | HistoryError::Common(_) => None,
        }
    }

    /// Render as a field -> messages map for form/API layers
    pub fn field_errors(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut errors = BTreeMap::new();
        errors.insert(self.field().unwrap_or("__all__"), vec![self.to_string()]);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(HistoryError::MissingDate.is_validation());
        assert!(HistoryError::InvalidOwner.is_validation());
        assert!(!HistoryError::Database(sqlx::Error::RowNotFound).is_validation());
    }

    #[test]
    fn test_field_mapping() {
        assert_eq!(HistoryError::MissingCode.field(), Some("code"));
        assert_eq!(
            HistoryError::DuplicateOrderReference {
                code_id: 3,
                reference: "OS/2024".to_string(),
            }
            .field(),
            Some("order_reference")
        );
        assert_eq!(HistoryError::Database(sqlx::Error::RowNotFound).field(), None);
    }

    #[test]
    fn test_field_errors_map() {
        let errors = HistoryError::MissingDate.field_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["effective_date"], vec!["Effective date is required"]);
    }
}
