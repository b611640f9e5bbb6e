use crate::{error::StoreError, store::KeyValueOp};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

/// In-memory key-value backend
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueOp for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    fn del(&self, key: &str) -> Result<(), StoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn get_many_raw(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        let data = self.data.read();
        Ok(keys.iter().map(|key| data.get(key).cloned()).collect())
    }

    fn start(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn clear(&self) {
        self.data.write().clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;
    use ethers::types::U256;

    #[test]
    fn memory_store_round_trip() {
        let db = Database::new(Box::new(MemoryStore::new()));

        db.put("1337:KEY", &U256::max_value()).unwrap();
        let value: U256 = db.get("1337:KEY").unwrap();
        assert_eq!(value, U256::max_value());

        assert!(matches!(
            db.get::<U256>("1337:MISSING"),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(db.get_opt::<U256>("1337:MISSING").unwrap(), None);

        db.del("1337:KEY").unwrap();
        assert_eq!(db.get_opt::<U256>("1337:KEY").unwrap(), None);
    }

    #[test]
    fn memory_store_get_many_preserves_key_order() {
        let db = Database::new(Box::new(MemoryStore::new()));

        db.put("a", &1u64).unwrap();
        db.put("c", &3u64).unwrap();

        let values: Vec<Option<u64>> =
            db.get_many(&["a".to_string(), "b".to_string(), "c".to_string()]).unwrap();
        assert_eq!(values, vec![Some(1), None, Some(3)]);
    }

    #[test]
    fn memory_store_clear() {
        let db = Database::new(Box::new(MemoryStore::new()));
        db.put("a", &1u64).unwrap();
        db.clear();
        assert_eq!(db.get_opt::<u64>("a").unwrap(), None);
    }
}
