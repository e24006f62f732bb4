use crate::sync::lock;
use crate::types::DataValue;
use std::collections::HashMap;
use std::sync::Mutex;

/// Key/value data local to a single context
#[derive(Default)]
pub(crate) struct DataStore {
    entries: Mutex<HashMap<String, DataValue>>,
}

impl DataStore {
    /// Seed a store with a copy of another store's map. Values are shared.
    pub(crate) fn from_snapshot(entries: HashMap<String, DataValue>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub(crate) fn insert(&self, key: String, value: DataValue) {
        lock(&self.entries).insert(key, value);
    }

    pub(crate) fn get(&self, key: &str) -> Option<DataValue> {
        lock(&self.entries).get(key).cloned()
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        lock(&self.entries).contains_key(key)
    }

    pub(crate) fn snapshot(&self) -> HashMap<String, DataValue> {
        lock(&self.entries).clone()
    }
}
