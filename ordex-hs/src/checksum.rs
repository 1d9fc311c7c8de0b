//! Canonical history projection and checksum engine
//!
//! The member-record cache (`history_mirror` + `history_checksum`) and the
//! integrity auditor both work off the same canonical form: an array of
//! [`EventSnapshot`] objects serialized as compact JSON. The serialization is
//! part of the on-disk contract — changing the key set, key order, or date
//! format invalidates every stored checksum and must be treated as a schema
//! migration.

use ordex_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One denormalized event snapshot as stored in the history mirror.
///
/// Fields are declared in lexicographic key order; serde_json serializes
/// struct fields in declaration order, which makes the declaration order the
/// canonical key order for hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub active: bool,
    /// Classification code name
    pub code: String,
    /// Classification type name
    pub code_type: String,
    /// ISO calendar date (YYYY-MM-DD)
    pub date: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub order_reference: Option<String>,
    /// Provenance marker: "manual" or "legacy"
    pub origin: String,
}

/// Serialize a snapshot list to its canonical byte form (compact JSON, UTF-8)
pub fn canonical_bytes(snapshots: &[EventSnapshot]) -> Result<Vec<u8>> {
    serde_json::to_vec(snapshots)
        .map_err(|e| Error::Internal(format!("Failed to serialize history mirror: {}", e)))
}

/// Compute the lowercase hex SHA-256 checksum of the canonical serialization
pub fn mirror_checksum(snapshots: &[EventSnapshot]) -> Result<String> {
    let bytes = canonical_bytes(snapshots)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> EventSnapshot {
        EventSnapshot {
            active: true,
            code: "First Degree".to_string(),
            code_type: "Progression".to_string(),
            date: "2024-01-01".to_string(),
            description: Some("Entered".to_string()),
            notes: None,
            order_reference: Some("OS/2024".to_string()),
            origin: "manual".to_string(),
        }
    }

    #[test]
    fn test_empty_list_canonical_form() {
        let bytes = canonical_bytes(&[]).unwrap();
        assert_eq!(bytes, b"[]");
        assert_eq!(
            mirror_checksum(&[]).unwrap(),
            format!("{:x}", Sha256::digest(b"[]"))
        );
    }

    #[test]
    fn test_key_order_is_lexicographic() {
        let json = String::from_utf8(canonical_bytes(&[sample_snapshot()]).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"[{"active":true,"code":"First Degree","code_type":"Progression","date":"2024-01-01","description":"Entered","notes":null,"order_reference":"OS/2024","origin":"manual"}]"#
        );
    }

    #[test]
    fn test_checksum_is_deterministic() {
        let snapshots = vec![sample_snapshot(), {
            let mut s = sample_snapshot();
            s.active = false;
            s.date = "2023-06-15".to_string();
            s
        }];

        let first = mirror_checksum(&snapshots).unwrap();
        let second = mirror_checksum(&snapshots).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let baseline = mirror_checksum(&[sample_snapshot()]).unwrap();

        let mut flipped = sample_snapshot();
        flipped.active = false;
        assert_ne!(baseline, mirror_checksum(&[flipped]).unwrap());

        let mut renoted = sample_snapshot();
        renoted.notes = Some("amended".to_string());
        assert_ne!(baseline, mirror_checksum(&[renoted]).unwrap());
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let snapshot = sample_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: EventSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }
}
