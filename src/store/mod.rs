use crate::query::Queryable;

/// Raw fetched collection owned by a single view instance. Mutations happen
/// only after the matching remote operation has succeeded.
#[derive(Clone, Debug, Default)]
pub struct RecordStore<T> {
    records: Vec<T>,
    skipped: usize,
}

impl<T: Queryable> RecordStore<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }

    /// Replaces the store contents with a freshly fetched batch. `skipped`
    /// carries the count of records the fetch could not decode.
    pub fn load(&mut self, records: Vec<T>, skipped: usize) {
        self.records = records;
        self.skipped = skipped;
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn insert(&mut self, record: T) {
        self.records.push(record);
    }

    /// Replaces the record with a matching id by the server-returned payload.
    /// Returns false when no record carries that id.
    pub fn update(&mut self, record: T) -> bool {
        match self.records.iter().position(|r| r.id() == record.id()) {
            Some(idx) => {
                self.records[idx] = record;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.records
            .iter()
            .position(|r| r.id() == id)
            .map(|idx| self.records.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{NumericField, Queryable};

    #[derive(Clone, Debug, PartialEq)]
    struct Rec {
        id: String,
        name: String,
    }

    impl Queryable for Rec {
        fn id(&self) -> &str {
            &self.id
        }

        fn display_name(&self) -> String {
            self.name.clone()
        }

        fn search_fields(&self) -> Vec<&str> {
            vec![&self.name]
        }

        fn numeric_field(&self, _field: NumericField) -> Option<f64> {
            None
        }
    }

    fn rec(id: &str, name: &str) -> Rec {
        Rec {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn update_replaces_matching_record_in_place() {
        let mut store = RecordStore::new();
        store.load(vec![rec("1", "a"), rec("2", "b")], 0);

        assert!(store.update(rec("2", "b-normalized")));
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[1].name, "b-normalized");

        assert!(!store.update(rec("9", "ghost")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_targets_by_id_only() {
        let mut store = RecordStore::new();
        store.load(vec![rec("1", "a"), rec("2", "b")], 0);

        assert_eq!(store.remove("1").map(|r| r.name), Some("a".to_string()));
        assert_eq!(store.len(), 1);
        assert!(store.remove("1").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn load_carries_the_skip_count() {
        let mut store = RecordStore::new();
        store.load(vec![rec("1", "a")], 3);
        assert_eq!(store.skipped(), 3);
    }
}
