//! Persistent key/value state.
//!
//! The store is a flat map of string keys to JSON documents. Every write
//! replaces the whole value of its key. [`StateStore`] gives the keys the
//! agent uses a typed face.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use rb_core::types::{AccessLock, BlockRule, RedirectRule};

use crate::error::StoreError;

pub const KEY_POLICY_URL: &str = "configUrl";
pub const KEY_BLOCK_RULES: &str = "blockRules";
pub const KEY_REDIRECT_RULES: &str = "redirectRules";
pub const KEY_ACCESS_LOCK: &str = "accessLock";
pub const KEY_LAST_ATTEMPT: &str = "lastFetchAttempt";
pub const KEY_LAST_RESULT: &str = "lastFetchResult";
pub const KEY_LAST_SUCCESS: &str = "lastSuccessfulFetch";

#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// =============================================================================
// Memory Store
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock_map(&self.values).get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        lock_map(&self.values).insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock_map(&self.values).remove(key);
        Ok(())
    }
}

fn lock_map(values: &Mutex<BTreeMap<String, String>>) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
    values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// File Store
// =============================================================================

/// Store backed by a single JSON object on disk.
///
/// The file is read once at open and rewritten (via a temp file and rename)
/// on every mutation. The in-memory map only changes once the write lands.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: tokio::sync::Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Json {
                key: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            values: tokio::sync::Mutex::new(values),
        })
    }

    async fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(values).map_err(|source| StoreError::Json {
            key: self.path.display().to_string(),
            source,
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut values = self.values.lock().await;
        let mut next = values.clone();
        next.insert(key.to_string(), value);
        self.persist(&next).await?;
        *values = next;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().await;
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.persist(&next).await?;
        *values = next;
        Ok(())
    }
}

// =============================================================================
// Typed State
// =============================================================================

/// Outcome of the most recent refresh attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchTelemetry {
    pub attempt_time: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub success_time: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct StateStore {
    inner: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").finish_non_exhaustive()
    }
}

impl StateStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.inner.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Json {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Json {
            key: key.to_string(),
            source,
        })?;
        self.inner.set(key, raw).await
    }

    pub async fn policy_url(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .get_json::<String>(KEY_POLICY_URL)
            .await?
            .filter(|url| !url.is_empty()))
    }

    pub async fn set_policy_url(&self, url: &str) -> Result<(), StoreError> {
        self.set_json(KEY_POLICY_URL, url).await
    }

    pub async fn remove_policy_url(&self) -> Result<(), StoreError> {
        self.inner.remove(KEY_POLICY_URL).await
    }

    pub async fn block_rules(&self) -> Result<Vec<BlockRule>, StoreError> {
        Ok(self.get_json(KEY_BLOCK_RULES).await?.unwrap_or_default())
    }

    pub async fn set_block_rules(&self, rules: &[BlockRule]) -> Result<(), StoreError> {
        self.set_json(KEY_BLOCK_RULES, rules).await
    }

    pub async fn redirect_rules(&self) -> Result<Vec<RedirectRule>, StoreError> {
        Ok(self.get_json(KEY_REDIRECT_RULES).await?.unwrap_or_default())
    }

    pub async fn set_redirect_rules(&self, rules: &[RedirectRule]) -> Result<(), StoreError> {
        self.set_json(KEY_REDIRECT_RULES, rules).await
    }

    pub async fn access_lock(&self) -> Result<AccessLock, StoreError> {
        Ok(self.get_json(KEY_ACCESS_LOCK).await?.unwrap_or_default())
    }

    pub async fn set_access_lock(&self, lock: &AccessLock) -> Result<(), StoreError> {
        self.set_json(KEY_ACCESS_LOCK, lock).await
    }

    pub async fn remove_access_lock(&self) -> Result<(), StoreError> {
        self.inner.remove(KEY_ACCESS_LOCK).await
    }

    pub async fn telemetry(&self) -> Result<FetchTelemetry, StoreError> {
        Ok(FetchTelemetry {
            attempt_time: self.get_json(KEY_LAST_ATTEMPT).await?,
            result: self.get_json(KEY_LAST_RESULT).await?,
            success_time: self.get_json(KEY_LAST_SUCCESS).await?,
        })
    }

    pub async fn record_attempt(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_json(KEY_LAST_ATTEMPT, &at).await
    }

    pub async fn record_result(&self, result: &str) -> Result<(), StoreError> {
        self.set_json(KEY_LAST_RESULT, result).await
    }

    pub async fn record_success(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.record_result("Success").await?;
        self.set_json(KEY_LAST_SUCCESS, &at).await
    }
}
