//! Storage backend abstraction.
//!
//! The vault drives its container through this trait, so the lifecycle
//! protocol stays independent of where bytes actually live. Two backends
//! ship with the crate: [`memory::MemoryStore`] (in-process, used heavily
//! by the test suite) and [`disk::DiskStore`] (payloads on disk, metadata
//! in SQLite). A cloud deployment implements the trait over its SDK.

pub mod disk;
pub mod memory;

use crate::config::TransferOptions;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error;

/// String key/value metadata attached to an object.
pub type MetadataMap = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("container `{0}` not found")]
    ContainerNotFound(String),
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("object `{0}` has no soft-deleted state to restore")]
    NotSoftDeleted(String),
    #[error("snapshot `{snapshot}` of object `{name}` not found")]
    SnapshotNotFound { name: String, snapshot: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which entries a listing should surface. Defaults to live base objects
/// only; soft-deleted entries and snapshot entries are opt-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingScope {
    pub include_deleted: bool,
    pub include_snapshots: bool,
}

impl ListingScope {
    /// Live base objects only.
    pub fn live() -> Self {
        Self::default()
    }

    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn with_snapshots(mut self) -> Self {
        self.include_snapshots = true;
        self
    }
}

/// One entry of a container listing: a base object or a snapshot of one.
/// Snapshots share the logical name of their parent and are distinguished
/// by a store-assigned id whose ordering is creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub name: String,
    pub deleted: bool,
    pub snapshot: Option<String>,
}

impl ObjectEntry {
    pub fn is_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }
}

/// Operations the vault requires from a blob container.
///
/// Contract notes implementations must honor:
/// - `put_object` stores content and the supplied metadata map atomically;
///   an overwrite keeps the existing snapshots of the name.
/// - `get_object` serves live objects only.
/// - metadata reads and writes work on soft-deleted objects too — the
///   delete/recover audit protocol depends on it. Snapshot metadata is a
///   frozen copy and is read-only.
/// - `soft_delete_object` / `undelete_object` move an object (and,
///   when asked, its snapshots) between the live and deleted listings.
/// - `purge_object` is the permanent "hard delete", snapshots included.
/// - `TransferOptions` is a parallelism hint; backends without internal
///   chunking may ignore it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Normalized name of the container this store is bound to.
    fn container_name(&self) -> &str;

    async fn container_exists(&self) -> StoreResult<bool>;

    /// Idempotent container creation.
    async fn create_container_if_absent(&self) -> StoreResult<()>;

    /// Disable public access on the container.
    async fn set_container_private(&self) -> StoreResult<()>;

    /// Whether a live object with this name exists.
    async fn object_exists(&self, name: &str) -> StoreResult<bool>;

    async fn put_object(
        &self,
        name: &str,
        content: Bytes,
        metadata: MetadataMap,
        transfer: &TransferOptions,
    ) -> StoreResult<()>;

    async fn get_object(&self, name: &str, transfer: &TransferOptions) -> StoreResult<Bytes>;

    async fn soft_delete_object(&self, name: &str, include_snapshots: bool) -> StoreResult<()>;

    async fn undelete_object(&self, name: &str) -> StoreResult<()>;

    async fn purge_object(&self, name: &str) -> StoreResult<()>;

    async fn list_objects(
        &self,
        prefix: &str,
        scope: ListingScope,
    ) -> StoreResult<Vec<ObjectEntry>>;

    /// Metadata of a base object (`snapshot: None`) or of one frozen
    /// snapshot (`snapshot: Some(id)`).
    async fn get_object_metadata(
        &self,
        name: &str,
        snapshot: Option<&str>,
    ) -> StoreResult<MetadataMap>;

    /// Replace the metadata map of a base object.
    async fn set_object_metadata(&self, name: &str, metadata: MetadataMap) -> StoreResult<()>;

    /// Freeze the current content and metadata of a live object. Returns
    /// the store-assigned snapshot id.
    async fn create_snapshot(&self, name: &str) -> StoreResult<String>;

    /// Destroy the container and everything in it.
    async fn delete_container(&self) -> StoreResult<()>;
}
