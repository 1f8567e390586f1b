use super::{RecordStore, StoreError};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// In-process store for tests and embedding.
///
/// [`MemoryStore::fail_saves`] makes every subsequent save fail, which lets
/// callers exercise the store-unavailable path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<BTreeMap<String, Value>>,
    fail_saves: Cell<bool>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }

    /// Raw value under `key`, cloned.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.records.borrow().get(key).cloned()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.records.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        if self.fail_saves.get() {
            return Err(StoreError::Rejected(key.to_string()));
        }
        self.records
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failed_save_keeps_previous_value() {
        let store = MemoryStore::new();
        store.save("k", &json!([1])).unwrap();
        store.fail_saves(true);
        assert!(matches!(
            store.save("k", &json!([2])),
            Err(StoreError::Rejected(_))
        ));
        assert_eq!(store.raw("k"), Some(json!([1])));
    }
}
