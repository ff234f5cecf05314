//! Per-instance memoization of static metadata responses.
//!
//! Entries are keyed by request path and live exactly as long as the
//! owning server handle (and its clones).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::GsfResult;

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached document for `key`, fetching and storing it on a miss.
    /// Failed fetches are not cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> GsfResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GsfResult<Value>>,
    {
        if let Some(hit) = self.lookup(key) {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.lock().insert(key.to_string(), value.clone());
        Ok(value)
    }

    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        // A poisoned map still holds valid JSON documents.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
