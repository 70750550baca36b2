//! Versioned blob storage abstraction (S3-style, with version history).
//!
//! This module defines the storage contract the reconciliation core depends
//! on. The contract assumes a content-addressable object store with version
//! history per key:
//!
//! - Every `put` appends a new version to the key's chain
//! - Reads default to the chain head ("latest")
//! - Historical versions stay retrievable until explicitly deleted
//!
//! ## Multi-Cloud Compatibility
//!
//! The version token is an opaque `String` to support different backends:
//! - S3: version ID (already a string)
//! - GCS: numeric generation (stored as string)
//! - Azure: version ID / `ETag`
//!
//! This abstraction avoids leaking backend-specific assumptions into the
//! reconciliation layer.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};

/// Metadata about one version of a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobVersion {
    /// Opaque version token for this entry in the key's chain.
    pub version_id: String,
    /// True for the chain head (the version `get` returns).
    pub is_latest: bool,
    /// When the version was written.
    pub modified_at: DateTime<Utc>,
}

/// Versioned object storage.
///
/// All storage backends (S3, GCS, memory) implement this trait. Keys are
/// append-only version chains; the only structural mutation is the explicit
/// per-version delete used by revert.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Appends a new version of the object at `key`.
    ///
    /// Returns the version token of the written entry.
    async fn put(&self, key: &str, data: Bytes) -> Result<String>;

    /// Reads the latest version of the object at `key`.
    ///
    /// Returns `Error::NotFound` if the key has no versions.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Reads a specific version of the object at `key`.
    ///
    /// Returns `Error::NotFound` if the key or version does not exist.
    async fn get_version(&self, key: &str, version_id: &str) -> Result<Bytes>;

    /// Lists the version chain for `key`, newest first.
    ///
    /// Returns an empty vec if the key has no versions. Exactly one entry
    /// carries `is_latest = true` when the chain is non-empty.
    async fn list_versions(&self, key: &str) -> Result<Vec<BlobVersion>>;

    /// Copies the content of `(key, version_id)` to a new version at
    /// `dest_key`, returning the new version token.
    ///
    /// `dest_key` may equal `key`; the copy then becomes the new chain head.
    /// Returns `Error::NotFound` if the source version does not exist.
    async fn copy_version(&self, key: &str, version_id: &str, dest_key: &str) -> Result<String>;

    /// Deletes one version of `key`, or the whole key when `version_id` is
    /// `None`.
    ///
    /// Succeeds even if the key or version does not exist (idempotent).
    async fn delete(&self, key: &str, version_id: Option<&str>) -> Result<()>;
}

/// In-memory blob store for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production. Version tokens
/// are per-key monotonic counters (stored as strings) so deleting a
/// historical version never causes a token to be reissued.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, VersionChain>>,
}

#[derive(Debug, Default)]
struct VersionChain {
    versions: Vec<StoredVersion>,
    next_token: u64,
}

#[derive(Debug, Clone)]
struct StoredVersion {
    token: u64,
    data: Bytes,
    modified_at: DateTime<Utc>,
}

impl VersionChain {
    fn push(&mut self, data: Bytes) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        self.versions.push(StoredVersion {
            token,
            data,
            modified_at: Utc::now(),
        });
        token
    }

    fn find(&self, version_id: &str) -> Option<&StoredVersion> {
        let token: u64 = version_id.parse().ok()?;
        self.versions.iter().find(|v| v.token == token)
    }
}

impl MemoryBlobStore {
    /// Creates a new empty memory blob store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_locked(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, VersionChain>>> {
        self.objects.read().map_err(|_| Error::Internal {
            message: "blob store lock poisoned".into(),
        })
    }

    fn write_locked(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, VersionChain>>> {
        self.objects.write().map_err(|_| Error::Internal {
            message: "blob store lock poisoned".into(),
        })
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<String> {
        let mut objects = self.write_locked()?;
        let chain = objects.entry(key.to_string()).or_default();
        let token = chain.push(data);
        Ok(token.to_string())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let objects = self.read_locked()?;
        objects
            .get(key)
            .and_then(|chain| chain.versions.last())
            .map(|v| v.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {key}")))
    }

    async fn get_version(&self, key: &str, version_id: &str) -> Result<Bytes> {
        let objects = self.read_locked()?;
        objects
            .get(key)
            .and_then(|chain| chain.find(version_id))
            .map(|v| v.data.clone())
            .ok_or_else(|| Error::NotFound(format!("version not found: {key}@{version_id}")))
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<BlobVersion>> {
        let objects = self.read_locked()?;
        let Some(chain) = objects.get(key) else {
            return Ok(Vec::new());
        };

        let head = chain.versions.len().saturating_sub(1);
        Ok(chain
            .versions
            .iter()
            .enumerate()
            .rev()
            .map(|(i, v)| BlobVersion {
                version_id: v.token.to_string(),
                is_latest: i == head,
                modified_at: v.modified_at,
            })
            .collect())
    }

    async fn copy_version(&self, key: &str, version_id: &str, dest_key: &str) -> Result<String> {
        let mut objects = self.write_locked()?;
        let data = objects
            .get(key)
            .and_then(|chain| chain.find(version_id))
            .map(|v| v.data.clone())
            .ok_or_else(|| Error::NotFound(format!("version not found: {key}@{version_id}")))?;

        let chain = objects.entry(dest_key.to_string()).or_default();
        let token = chain.push(data);
        Ok(token.to_string())
    }

    async fn delete(&self, key: &str, version_id: Option<&str>) -> Result<()> {
        let mut objects = self.write_locked()?;
        match version_id {
            None => {
                objects.remove(key);
            }
            Some(version_id) => {
                let now_empty = objects.get_mut(key).is_some_and(|chain| {
                    if let Ok(token) = version_id.parse::<u64>() {
                        chain.versions.retain(|v| v.token != token);
                    }
                    chain.versions.is_empty()
                });
                if now_empty {
                    objects.remove(key);
                }
            }
        }
        Ok(())
    }
}
