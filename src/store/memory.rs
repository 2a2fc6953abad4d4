//! In-process storage backend.
//!
//! Keeps everything behind one mutex: payload bytes, metadata maps,
//! soft-delete marks, and ordered snapshots. Behavior matches the trait
//! contract exactly, which makes this the reference backend for the test
//! suite and a convenient stand-in while prototyping.

use crate::config::{TransferOptions, normalize_container_name};
use crate::errors::VaultResult;
use crate::store::{ListingScope, MetadataMap, ObjectEntry, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone)]
struct SnapshotState {
    id: String,
    content: Bytes,
    metadata: MetadataMap,
    deleted: bool,
}

#[derive(Debug, Clone)]
struct ObjectState {
    content: Bytes,
    metadata: MetadataMap,
    etag: String,
    deleted: bool,
    // Creation order; snapshot ids are assigned from a counter so the
    // order survives re-listing.
    snapshots: Vec<SnapshotState>,
}

#[derive(Debug, Default)]
struct ContainerState {
    exists: bool,
    public_access: bool,
    next_snapshot: u64,
    objects: HashMap<String, ObjectState>,
}

/// In-memory implementation of [`ObjectStore`].
pub struct MemoryStore {
    container: String,
    state: Mutex<ContainerState>,
}

impl MemoryStore {
    /// Bind to a container name. The name is normalized and validated the
    /// same way as for every other backend; the container itself is not
    /// created until `create_container_if_absent`.
    pub fn new(container: &str) -> VaultResult<Self> {
        Ok(Self {
            container: normalize_container_name(container)?,
            state: Mutex::new(ContainerState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ContainerState> {
        self.state.lock().unwrap()
    }

    fn guard(&self) -> StoreResult<MutexGuard<'_, ContainerState>> {
        let state = self.lock();
        if !state.exists {
            return Err(StoreError::ContainerNotFound(self.container.clone()));
        }
        Ok(state)
    }

    /// Number of base objects currently held, in any state. Test helper.
    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn container_name(&self) -> &str {
        &self.container
    }

    async fn container_exists(&self) -> StoreResult<bool> {
        Ok(self.lock().exists)
    }

    async fn create_container_if_absent(&self) -> StoreResult<()> {
        let mut state = self.lock();
        if !state.exists {
            state.exists = true;
            debug!(container = %self.container, "created container");
        }
        Ok(())
    }

    async fn set_container_private(&self) -> StoreResult<()> {
        let mut state = self.guard()?;
        state.public_access = false;
        Ok(())
    }

    async fn object_exists(&self, name: &str) -> StoreResult<bool> {
        let state = self.guard()?;
        Ok(state.objects.get(name).is_some_and(|obj| !obj.deleted))
    }

    async fn put_object(
        &self,
        name: &str,
        content: Bytes,
        metadata: MetadataMap,
        transfer: &TransferOptions,
    ) -> StoreResult<()> {
        debug!(
            name,
            bytes = content.len(),
            parallel_hint = transfer.parallel_operations,
            "put object"
        );
        let mut state = self.guard()?;
        let etag = format!("{:x}", md5::compute(&content));
        // Overwrite keeps the name's snapshot history.
        let snapshots = state
            .objects
            .remove(name)
            .map(|prior| prior.snapshots)
            .unwrap_or_default();
        state.objects.insert(
            name.to_string(),
            ObjectState {
                content,
                metadata,
                etag,
                deleted: false,
                snapshots,
            },
        );
        Ok(())
    }

    async fn get_object(&self, name: &str, _transfer: &TransferOptions) -> StoreResult<Bytes> {
        let state = self.guard()?;
        state
            .objects
            .get(name)
            .filter(|obj| !obj.deleted)
            .map(|obj| obj.content.clone())
            .ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))
    }

    async fn soft_delete_object(&self, name: &str, include_snapshots: bool) -> StoreResult<()> {
        let mut state = self.guard()?;
        let object = state
            .objects
            .get_mut(name)
            .ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))?;
        object.deleted = true;
        if include_snapshots {
            for snapshot in &mut object.snapshots {
                snapshot.deleted = true;
            }
        }
        debug!(name, include_snapshots, "soft-deleted object");
        Ok(())
    }

    async fn undelete_object(&self, name: &str) -> StoreResult<()> {
        let mut state = self.guard()?;
        let object = state
            .objects
            .get_mut(name)
            .ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))?;
        if !object.deleted {
            return Err(StoreError::NotSoftDeleted(name.to_string()));
        }
        object.deleted = false;
        for snapshot in &mut object.snapshots {
            snapshot.deleted = false;
        }
        debug!(name, "undeleted object");
        Ok(())
    }

    async fn purge_object(&self, name: &str) -> StoreResult<()> {
        let mut state = self.guard()?;
        state
            .objects
            .remove(name)
            .ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))?;
        debug!(name, "purged object");
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        scope: ListingScope,
    ) -> StoreResult<Vec<ObjectEntry>> {
        let state = self.guard()?;
        let mut entries = Vec::new();
        for (name, object) in &state.objects {
            if !name.starts_with(prefix) {
                continue;
            }
            if !object.deleted || scope.include_deleted {
                entries.push(ObjectEntry {
                    name: name.clone(),
                    deleted: object.deleted,
                    snapshot: None,
                });
            }
            if scope.include_snapshots {
                for snapshot in &object.snapshots {
                    if snapshot.deleted && !scope.include_deleted {
                        continue;
                    }
                    entries.push(ObjectEntry {
                        name: name.clone(),
                        deleted: snapshot.deleted,
                        snapshot: Some(snapshot.id.clone()),
                    });
                }
            }
        }
        Ok(entries)
    }

    async fn get_object_metadata(
        &self,
        name: &str,
        snapshot: Option<&str>,
    ) -> StoreResult<MetadataMap> {
        let state = self.guard()?;
        let object = state
            .objects
            .get(name)
            .ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))?;
        match snapshot {
            None => Ok(object.metadata.clone()),
            Some(id) => object
                .snapshots
                .iter()
                .find(|snap| snap.id == id)
                .map(|snap| snap.metadata.clone())
                .ok_or_else(|| StoreError::SnapshotNotFound {
                    name: name.to_string(),
                    snapshot: id.to_string(),
                }),
        }
    }

    async fn set_object_metadata(&self, name: &str, metadata: MetadataMap) -> StoreResult<()> {
        let mut state = self.guard()?;
        let object = state
            .objects
            .get_mut(name)
            .ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))?;
        object.metadata = metadata;
        Ok(())
    }

    async fn create_snapshot(&self, name: &str) -> StoreResult<String> {
        let mut state = self.guard()?;
        let id = format!("snap-{:08}", state.next_snapshot);
        state.next_snapshot += 1;
        let object = state
            .objects
            .get_mut(name)
            .filter(|obj| !obj.deleted)
            .ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))?;
        object.snapshots.push(SnapshotState {
            id: id.clone(),
            content: object.content.clone(),
            metadata: object.metadata.clone(),
            deleted: false,
        });
        debug!(name, snapshot = %id, "created snapshot");
        Ok(id)
    }

    async fn delete_container(&self) -> StoreResult<()> {
        let mut state = self.lock();
        if !state.exists {
            return Err(StoreError::ContainerNotFound(self.container.clone()));
        }
        state.exists = false;
        state.objects.clear();
        debug!(container = %self.container, "deleted container");
        Ok(())
    }
}
