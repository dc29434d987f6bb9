// 🔍 Deduplication Engine - Keep duplicate regulations out of the store
// One strategy: exact match on the normalized (title, created_at, external_link) key

use crate::record::{Record, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

// ============================================================================
// IDENTITY KEY
// ============================================================================

/// Normalized identity of a regulation.
///
/// title → stringified and trimmed, created_at → stringified,
/// external_link → stringified. Null in any position → "".
/// Comparison is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub title: String,
    pub created_at: String,
    pub external_link: String,
}

impl IdentityKey {
    pub fn new(title: &Value, created_at: &Value, external_link: &Value) -> Self {
        IdentityKey {
            title: title.to_key_string().trim().to_string(),
            created_at: created_at.to_key_string(),
            external_link: external_link.to_key_string(),
        }
    }

    pub fn of(record: &Record) -> Self {
        Self::new(&record.title, &record.created_at, &record.external_link)
    }

    pub fn of_summary(summary: &StoredSummary) -> Self {
        Self::new(&summary.title, &summary.created_at, &summary.external_link)
    }

    /// Write the normalized identity back into `record`.
    ///
    /// Stored rows then re-read to exactly this key.
    pub fn apply(&self, record: &mut Record) {
        record.title = Value::String(self.title.clone());
        record.created_at = Value::String(self.created_at.clone());
        record.external_link = Value::String(self.external_link.clone());
    }
}

/// Projection of a stored regulation used for duplicate detection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoredSummary {
    pub title: Value,
    pub created_at: Value,
    pub entity: Value,
    pub external_link: Value,
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Not stored, first of its key in the batch
    New,

    /// Key already present in the store
    DuplicateOfStored,

    /// An earlier record in the same batch has the same key
    DuplicateInBatch,
}

/// Records to insert plus what was dropped
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Survivors in original relative order, identity fields normalized
    pub accepted: Vec<Record>,
    pub stored_duplicates: usize,
    pub batch_duplicates: usize,
}

impl Resolution {
    pub fn total_duplicates(&self) -> usize {
        self.stored_duplicates + self.batch_duplicates
    }
}

// ============================================================================
// DEDUPLICATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DeduplicationEngine;

impl DeduplicationEngine {
    pub fn new() -> Self {
        DeduplicationEngine
    }

    /// Classify every candidate, in order. First occurrence of a key wins.
    pub fn classify(&self, candidates: &[Record], existing: &[StoredSummary]) -> Vec<Classification> {
        let stored: HashSet<IdentityKey> = existing.iter().map(IdentityKey::of_summary).collect();
        let mut seen: HashSet<IdentityKey> = HashSet::new();

        candidates
            .iter()
            .map(|record| {
                let key = IdentityKey::of(record);
                if stored.contains(&key) {
                    Classification::DuplicateOfStored
                } else if seen.insert(key) {
                    Classification::New
                } else {
                    Classification::DuplicateInBatch
                }
            })
            .collect()
    }

    /// The subset of `candidates` to insert
    pub fn resolve(&self, candidates: &[Record], existing: &[StoredSummary]) -> Resolution {
        let mut resolution = Resolution::default();

        let classes = self.classify(candidates, existing);
        for (record, class) in candidates.iter().zip(classes) {
            match class {
                Classification::New => {
                    let mut accepted = record.clone();
                    IdentityKey::of(record).apply(&mut accepted);
                    resolution.accepted.push(accepted);
                }
                Classification::DuplicateOfStored => resolution.stored_duplicates += 1,
                Classification::DuplicateInBatch => resolution.batch_duplicates += 1,
            }
        }

        if resolution.stored_duplicates > 0 {
            info!(count = resolution.stored_duplicates, "duplicates of stored records found");
        }
        if resolution.batch_duplicates > 0 {
            info!(count = resolution.batch_duplicates, "duplicates within batch removed");
        }

        resolution
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_record(title: &str, created_at: &str, link: Option<&str>) -> Record {
        Record::new()
            .with("title", title)
            .with("created_at", created_at)
            .with("entity", "ANI")
            .with("external_link", link)
    }

    fn stored(title: &str, created_at: &str, link: &str) -> StoredSummary {
        StoredSummary {
            title: title.into(),
            created_at: created_at.into(),
            entity: "ANI".into(),
            external_link: link.into(),
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let engine = DeduplicationEngine::new();

        let a = create_test_record("Decreto 1", "2024-01-01", Some("http://a"));
        let a_prime = create_test_record("Decreto 1", "2024-01-01", Some("http://a"))
            .with("summary", "second copy");
        let b = create_test_record("Decreto 2", "2024-01-02", None);

        let resolution = engine.resolve(&[a.clone(), a_prime, b], &[]);

        assert_eq!(resolution.accepted.len(), 2);
        assert_eq!(resolution.accepted[0].get("summary"), &Value::Null, "A kept, A' dropped");
        assert_eq!(resolution.accepted[1].title, Value::from("Decreto 2"));
        assert_eq!(resolution.batch_duplicates, 1);
        assert_eq!(resolution.stored_duplicates, 0);
    }

    #[test]
    fn test_stored_duplicate_dropped() {
        let engine = DeduplicationEngine::new();

        let existing = vec![stored("Decreto 123", "2024-01-01", "http://x")];
        let batch = vec![
            create_test_record("Decreto 123", "2024-01-01", Some("http://x")),
            create_test_record("Resolución 9", "2024-02-01", Some("http://y")),
        ];

        let resolution = engine.resolve(&batch, &existing);

        assert_eq!(resolution.accepted.len(), 1);
        assert_eq!(resolution.accepted[0].title, Value::from("Resolución 9"));
        assert_eq!(resolution.stored_duplicates, 1);
    }

    #[test]
    fn test_symmetry_between_store_and_batch() {
        let engine = DeduplicationEngine::new();
        let a = create_test_record("Decreto 5", "2024-05-05", Some("http://z"));
        let b = create_test_record(" Decreto 5 ", "2024-05-05", Some("http://z"));

        // Both in the batch
        assert_eq!(engine.resolve(&[a.clone(), b.clone()], &[]).accepted.len(), 1);
        assert_eq!(engine.resolve(&[b.clone(), a.clone()], &[]).accepted.len(), 1);

        // One stored, other in batch
        let stored_a = stored("Decreto 5", "2024-05-05", "http://z");
        let stored_b = stored(" Decreto 5 ", "2024-05-05", "http://z");
        assert!(engine.resolve(&[b], &[stored_a]).accepted.is_empty());
        assert!(engine.resolve(&[a], &[stored_b]).accepted.is_empty());
    }

    #[test]
    fn test_title_trimmed_and_case_sensitive() {
        let upper = create_test_record("DECRETO 1", "2024-01-01", None);
        let lower = create_test_record("  decreto 1\n", "2024-01-01", None);

        assert_ne!(IdentityKey::of(&upper), IdentityKey::of(&lower));
        assert_eq!(IdentityKey::of(&lower).title, "decreto 1");
    }

    #[test]
    fn test_null_components_still_deduplicated() {
        let engine = DeduplicationEngine::new();
        let bare1 = Record::new().with("entity", "ANI");
        let bare2 = Record::new().with("entity", "ANI");

        let key = IdentityKey::of(&bare1);
        assert_eq!(key.title, "");
        assert_eq!(key.created_at, "");
        assert_eq!(key.external_link, "");

        let resolution = engine.resolve(&[bare1, bare2], &[]);
        assert_eq!(resolution.accepted.len(), 1);
        assert_eq!(resolution.batch_duplicates, 1);
    }

    #[test]
    fn test_null_link_matches_empty_stored_link() {
        let engine = DeduplicationEngine::new();
        let existing = vec![stored("Decreto 9", "2024-09-09", "")];
        let batch = vec![create_test_record("Decreto 9", "2024-09-09", None)];

        assert!(engine.resolve(&batch, &existing).accepted.is_empty());
    }

    #[test]
    fn test_accepted_records_are_normalized() {
        let engine = DeduplicationEngine::new();
        let record = Record::new()
            .with("title", "  Decreto 7 ")
            .with("created_at", 2024i64)
            .with("entity", "ANI");

        let resolution = engine.resolve(&[record], &[]);
        let accepted = &resolution.accepted[0];

        assert_eq!(accepted.title, Value::from("Decreto 7"));
        assert_eq!(accepted.created_at, Value::from("2024"));
        assert_eq!(accepted.external_link, Value::from(""));
        assert_eq!(accepted.entity, Value::from("ANI"));
    }

    #[test]
    fn test_classify_all_three_kinds() {
        let engine = DeduplicationEngine::new();
        let existing = vec![stored("Old", "2023-01-01", "")];
        let batch = vec![
            create_test_record("Old", "2023-01-01", None),
            create_test_record("New", "2024-01-01", None),
            create_test_record("New", "2024-01-01", None),
        ];

        assert_eq!(
            engine.classify(&batch, &existing),
            vec![
                Classification::DuplicateOfStored,
                Classification::New,
                Classification::DuplicateInBatch,
            ]
        );
    }

    #[test]
    fn test_empty_existing_keeps_distinct_records() {
        let engine = DeduplicationEngine::new();
        let batch = vec![
            create_test_record("A", "2024-01-01", None),
            create_test_record("A", "2024-01-02", None),
            create_test_record("A", "2024-01-01", Some("http://a")),
        ];

        let resolution = engine.resolve(&batch, &[]);
        assert_eq!(resolution.accepted.len(), 3);
        assert_eq!(resolution.total_duplicates(), 0);
    }
}
