//! Flat byte-keyed persistence consumed by the mempool and reputation services.
//!
//! The durable backend is an external collaborator; everything in this crate talks to it
//! through [KeyValueOp]. Values are encoded with `serde_json` so 256-bit integers
//! round-trip losslessly as canonical hex strings.

use crate::error::StoreError;
use dyn_clone::DynClone;
use serde::{de::DeserializeOwned, Serialize};

/// Binary-safe key-value operations
pub trait KeyValueOp: Send + Sync + DynClone {
    /// Returns the raw value stored under `key`, if any
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores `value` under `key`, overwriting any previous value
    fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Deletes the value stored under `key`
    fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Returns the values for `keys` in key order; missing keys yield `None` slots
    fn get_many_raw(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError>;

    /// Brackets the durable state, called once on startup
    fn start(&self) -> Result<(), StoreError>;

    /// Brackets the durable state, called once on shutdown
    fn stop(&self) -> Result<(), StoreError>;

    /// Drops all stored values
    fn clear(&self);
}

dyn_clone::clone_trait_object!(KeyValueOp);

/// Typed view over a [KeyValueOp] backend
#[derive(Clone)]
pub struct Database {
    inner: Box<dyn KeyValueOp>,
}

impl Database {
    pub fn new(inner: Box<dyn KeyValueOp>) -> Self {
        Self { inner }
    }

    /// Retrieves and decodes the value under `key`, failing with [StoreError::NotFound]
    /// when no value is stored
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
        let raw = self
            .inner
            .get_raw(key)?
            .ok_or_else(|| StoreError::NotFound { key: key.to_string() })?;
        serde_json::from_slice(&raw).map_err(|e| StoreError::Codec { inner: e.to_string() })
    }

    /// Retrieves and decodes the value under `key`, mapping a missing value to `None`
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.inner.get_raw(key)? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| StoreError::Codec { inner: e.to_string() }),
            None => Ok(None),
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw =
            serde_json::to_vec(value).map_err(|e| StoreError::Codec { inner: e.to_string() })?;
        self.inner.put_raw(key, raw)
    }

    pub fn del(&self, key: &str) -> Result<(), StoreError> {
        self.inner.del(key)
    }

    /// Decoded values for `keys` in key order; missing keys yield `None` slots
    pub fn get_many<T: DeserializeOwned>(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<T>>, StoreError> {
        let raws = self.inner.get_many_raw(keys)?;
        raws.into_iter()
            .map(|raw| match raw {
                Some(raw) => serde_json::from_slice(&raw)
                    .map(Some)
                    .map_err(|e| StoreError::Codec { inner: e.to_string() }),
                None => Ok(None),
            })
            .collect()
    }

    pub fn start(&self) -> Result<(), StoreError> {
        self.inner.start()
    }

    pub fn stop(&self) -> Result<(), StoreError> {
        self.inner.stop()
    }

    pub fn clear(&self) {
        self.inner.clear()
    }
}
