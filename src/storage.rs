use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Result, WalletError};

/// Key-value persistence for the wallet record, account index, permissions and settings.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl dyn KeyValueStore {
    // Generic Helper: Put
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let serialized = serde_json::to_vec(value)?;
        self.put_raw(key, serialized)
    }

    // Generic Helper: Get
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }
}

pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(Path::new(path)).map_err(|e| WalletError::Storage(e.to_string()))?;
        Ok(SledStore { db })
    }
}

impl KeyValueStore for SledStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key.as_bytes())
            .map(|v| v.map(|ivec| ivec.to_vec()))
            .map_err(|e| WalletError::Storage(e.to_string()))
    }

    fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| WalletError::Storage(e.to_string()))?;
        self.db.flush().map_err(|e| WalletError::Storage(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| WalletError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// Volatile store, used by tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().map_err(|_| WalletError::Storage("store poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| WalletError::Storage("store poisoned".to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| WalletError::Storage("store poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
