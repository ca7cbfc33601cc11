use crate::record::Record;
use std::collections::HashMap;
use std::sync::RwLock;

/// Storage abstraction underneath the per-key consensus state.
///
/// `get` is total: a key that has never been written yields a fresh
/// zero-version record. Durability is the implementation's concern; the
/// agent relies only on this contract.
pub trait Storage: Send + Sync + 'static {
    fn get(&self, key: &str) -> Record;

    fn get_all(&self) -> Vec<Record>;

    /// Upserts a record by key.
    fn put(&self, record: Record);
}

/// In-memory storage engine.
#[derive(Default)]
pub struct MemStore {
    records: RwLock<HashMap<String, Record>>,
}

impl MemStore {
    pub fn new() -> MemStore {
        MemStore::default()
    }
}

impl Storage for MemStore {
    fn get(&self, key: &str) -> Record {
        match self.records.read().unwrap().get(key) {
            Some(record) => record.clone(),
            None => Record::new(key),
        }
    }

    fn get_all(&self) -> Vec<Record> {
        self.records.read().unwrap().values().cloned().collect()
    }

    fn put(&self, record: Record) {
        self.records.write().unwrap().insert(record.key.clone(), record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn get_of_absent_key_is_fresh() {
        let store = MemStore::new();
        let record = store.get("missing");
        assert_eq!(0, record.version);
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn put_upserts() {
        let store = MemStore::new();

        let mut record = store.get("k");
        record.version = 1;
        record.value = Bytes::from("a");
        store.put(record);
        assert_eq!(Bytes::from("a"), store.get("k").value);

        let mut record = store.get("k");
        record.version = 2;
        record.value = Bytes::from("b");
        store.put(record);

        assert_eq!(2, store.get("k").version);
        assert_eq!(1, store.get_all().len());
    }
}
