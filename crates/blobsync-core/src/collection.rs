use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::{write::UpsertSummary, Record, RecordMeta};

/// Records of one collection, unique by id, kept in insertion order.
///
/// Serialized as a plain array of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Record>", into = "Vec<Record>")]
pub struct Collection {
    records: IndexMap<String, Record>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn to_vec(&self) -> Vec<Record> {
        self.records.values().cloned().collect()
    }

    pub fn metadata(&self) -> Vec<RecordMeta> {
        self.records.values().map(Record::meta).collect()
    }

    /// Replaces the record with the same id in place, or appends it.
    /// Returns true when an existing record was replaced.
    pub fn upsert(&mut self, record: Record) -> bool {
        match self.records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                self.records.insert(record.id.clone(), record);
                false
            }
        }
    }

    pub fn upsert_many(&mut self, records: impl IntoIterator<Item = Record>) -> UpsertSummary {
        let mut summary = UpsertSummary::default();
        for record in records {
            if self.upsert(record) {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }
        summary
    }

    pub fn remove(&mut self, id: &str) -> Option<Record> {
        self.records.shift_remove(id)
    }
}

impl From<Vec<Record>> for Collection {
    fn from(records: Vec<Record>) -> Self {
        let mut collection = Collection::new();
        collection.upsert_many(records);
        collection
    }
}

impl From<Collection> for Vec<Record> {
    fn from(collection: Collection) -> Self {
        collection.records.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upsert_new_id_appends() {
        let mut col = Collection::new();
        assert!(!col.upsert(Record::new("a", "1")));
        assert!(!col.upsert(Record::new("b", "2")));
        assert_eq!(col.len(), 2);
        assert_eq!(col.metadata().len(), 2);
    }

    #[test]
    fn test_upsert_existing_id_replaces_in_place() {
        let mut col = Collection::new();
        col.upsert(Record::new("a", "1"));
        col.upsert(Record::new("b", "2"));
        assert!(col.upsert(Record::new("a", "updated").with_sync_info(200, 2)));

        assert_eq!(col.len(), 2);
        let ids: Vec<_> = col.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(col.get("a").unwrap().encrypted_data, json!("updated"));
    }

    #[test]
    fn test_upsert_many_counts() {
        let mut col = Collection::new();
        col.upsert(Record::new("a", "1"));
        let summary = col.upsert_many(vec![Record::new("a", "x"), Record::new("b", "y"), Record::new("c", "z")]);
        assert_eq!(summary, UpsertSummary { inserted: 2, updated: 1 });
        assert_eq!(summary.count(), 3);
    }

    #[test]
    fn test_remove_keeps_order_of_the_rest() {
        let mut col: Collection = vec![Record::new("a", "1"), Record::new("b", "2"), Record::new("c", "3")].into();
        assert!(col.remove("b").is_some());
        assert!(col.remove("b").is_none());
        let ids: Vec<_> = col.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_serializes_as_array() {
        let col: Collection = vec![Record::new("a", "1")].into();
        let value = serde_json::to_value(&col).unwrap();
        assert_eq!(value, json!([{ "id": "a", "encryptedData": "1" }]));

        let back: Collection = serde_json::from_value(value).unwrap();
        assert_eq!(back, col);
    }

    #[test]
    fn test_duplicate_ids_in_source_collapse() {
        let col: Collection = vec![Record::new("a", "old"), Record::new("a", "new")].into();
        assert_eq!(col.len(), 1);
        assert_eq!(col.get("a").unwrap().encrypted_data, json!("new"));
    }
}
