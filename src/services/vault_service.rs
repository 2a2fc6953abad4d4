//! src/services/vault_service.rs
//!
//! VaultService — the blob lifecycle layer. It owns the audit-metadata
//! protocol (who uploaded/deleted/recovered what, and when) and drives a
//! single container through an [`ObjectStore`] backend. The service holds
//! no state between calls beyond its store handle, so one instance can be
//! shared freely across tasks; concurrent operations on the same logical
//! name race at the store with last-writer-wins semantics.

use crate::config::TransferOptions;
use crate::errors::{VaultError, VaultResult};
use crate::models::file_record::{
    FileRecord, blob_name_for, directory_prefix, keys, timestamp_now,
};
use crate::store::{ListingScope, ObjectStore, StoreError};
use bytes::Bytes;
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Lifecycle manager for one blob container.
#[derive(Clone)]
pub struct VaultService {
    store: Arc<dyn ObjectStore>,
    transfer: TransferOptions,
}

impl VaultService {
    /// Bind to a container, creating it if absent and disabling public
    /// access. Any failure here is a [`VaultError::Configuration`] and no
    /// service is handed out — the container either ends up ready or the
    /// vault is unusable.
    pub async fn connect(
        store: Arc<dyn ObjectStore>,
        transfer: TransferOptions,
    ) -> VaultResult<Self> {
        let container = store.container_name().to_string();
        store.create_container_if_absent().await.map_err(|err| {
            VaultError::Configuration(format!(
                "failed to prepare container `{}`: {}",
                container, err
            ))
        })?;
        store.set_container_private().await.map_err(|err| {
            VaultError::Configuration(format!(
                "failed to restrict access on container `{}`: {}",
                container, err
            ))
        })?;
        info!(container = %container, "vault ready");
        Ok(Self { store, transfer })
    }

    /// Whether the configured container is currently reachable.
    /// Side-effect-free; store failures report as `false`.
    pub async fn connection_check(&self) -> bool {
        self.store.container_exists().await.unwrap_or(false)
    }

    /// Upload a local file into a logical directory of the container.
    ///
    /// The blob name is `directory/file_name`. Content and the full audit
    /// metadata record are stored in one call, then the initial snapshot
    /// is captured. Re-uploading an existing name overwrites content and
    /// metadata and adds a snapshot; earlier snapshots are retained.
    ///
    /// A missing or unreadable source path fails with
    /// [`VaultError::LocalIo`] before anything is written to the store.
    pub async fn upload(
        &self,
        local_path: impl AsRef<Path>,
        directory: &str,
        uploaded_by: &str,
        comments: &str,
    ) -> VaultResult<FileRecord> {
        let local_path = local_path.as_ref();
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                VaultError::local_io(
                    local_path,
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "source path has no usable file name",
                    ),
                )
            })?;
        let content = fs::read(local_path)
            .await
            .map_err(|err| VaultError::local_io(local_path, err))?;

        let blob_name = blob_name_for(directory, file_name);
        let record = FileRecord::new_active(
            &blob_name,
            file_name,
            content.len() as u64,
            uploaded_by,
            comments,
        );
        self.store
            .put_object(
                &blob_name,
                Bytes::from(content),
                record.to_metadata(),
                &self.transfer,
            )
            .await?;
        self.store.create_snapshot(&blob_name).await?;

        debug!(blob = %blob_name, by = uploaded_by, "uploaded");
        Ok(record)
    }

    /// Download a live blob to a local path, overwriting any existing
    /// file there.
    pub async fn download(
        &self,
        blob_name: &str,
        destination: impl AsRef<Path>,
    ) -> VaultResult<()> {
        let destination = destination.as_ref();
        let content = self
            .store
            .get_object(blob_name, &self.transfer)
            .await
            .map_err(|err| not_found_as(err, blob_name))?;
        fs::write(destination, &content)
            .await
            .map_err(|err| VaultError::local_io(destination, err))?;
        debug!(blob = %blob_name, to = %destination.display(), "downloaded");
        Ok(())
    }

    /// Soft-delete a blob and its snapshots, stamping `DeleteDate` and
    /// `DeletedBy` first so the audit trail survives into the deleted
    /// state. Repeating the call on an already-deleted blob restamps and
    /// re-deletes; a genuinely absent name is [`VaultError::NotFound`].
    pub async fn delete(&self, blob_name: &str, user_id: &str) -> VaultResult<()> {
        let mut metadata = self
            .store
            .get_object_metadata(blob_name, None)
            .await
            .map_err(|err| not_found_as(err, blob_name))?;
        metadata.insert(keys::DELETE_DATE.to_string(), timestamp_now());
        metadata.insert(keys::DELETED_BY.to_string(), user_id.to_string());
        self.store.set_object_metadata(blob_name, metadata).await?;
        self.store
            .soft_delete_object(blob_name, true)
            .await
            .map_err(|err| not_found_as(err, blob_name))?;

        debug!(blob = %blob_name, by = user_id, "soft-deleted");
        Ok(())
    }

    /// Restore a soft-deleted blob (snapshots included) and stamp
    /// `RecoverDate` and `RecoveredBy`.
    ///
    /// Known quirk, kept for compatibility with existing containers:
    /// `DeleteDate`/`DeletedBy` are not reset to `N/A`, so the most recent
    /// deletion stays visible on a recovered blob.
    pub async fn recover(&self, blob_name: &str, user_id: &str) -> VaultResult<()> {
        self.store
            .undelete_object(blob_name)
            .await
            .map_err(|err| not_found_as(err, blob_name))?;
        let mut metadata = self
            .store
            .get_object_metadata(blob_name, None)
            .await
            .map_err(|err| not_found_as(err, blob_name))?;
        metadata.insert(keys::RECOVER_DATE.to_string(), timestamp_now());
        metadata.insert(keys::RECOVERED_BY.to_string(), user_id.to_string());
        self.store.set_object_metadata(blob_name, metadata).await?;

        debug!(blob = %blob_name, by = user_id, "recovered");
        Ok(())
    }

    /// Audit records for every live blob under a logical directory, in
    /// store-listing order. An empty or unknown directory yields an empty
    /// vec, not an error.
    pub async fn list_active(&self, directory: &str) -> VaultResult<Vec<FileRecord>> {
        let prefix = directory_prefix(directory);
        let entries = self.store.list_objects(&prefix, ListingScope::live()).await?;
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let metadata = self.store.get_object_metadata(&entry.name, None).await?;
            records.push(FileRecord::from_metadata(&entry.name, &metadata)?);
        }
        Ok(records)
    }

    /// Names of soft-deleted blobs under a logical directory. Bare names
    /// only — metadata is deliberately not fetched here, unlike
    /// [`list_active`](Self::list_active).
    pub async fn list_inactive(&self, directory: &str) -> VaultResult<Vec<String>> {
        let prefix = directory_prefix(directory);
        let entries = self
            .store
            .list_objects(&prefix, ListingScope::live().with_deleted())
            .await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.deleted && !entry.is_snapshot())
            .map(|entry| entry.name)
            .collect())
    }

    /// Audit records for every snapshot of one blob, in snapshot creation
    /// order as reported by the store.
    ///
    /// Snapshots are addressed only by their parent's logical name, so
    /// this walks the container-wide snapshot listing and filters on
    /// exact name match — on a very large container this scan is the
    /// most expensive call in the crate.
    pub async fn list_versions(&self, blob_name: &str) -> VaultResult<Vec<FileRecord>> {
        let entries = self
            .store
            .list_objects("", ListingScope::live().with_snapshots())
            .await?;
        let mut records = Vec::new();
        for entry in entries {
            let Some(snapshot_id) = entry.snapshot else {
                continue;
            };
            if entry.name != blob_name {
                continue;
            }
            let metadata = self
                .store
                .get_object_metadata(&entry.name, Some(&snapshot_id))
                .await?;
            records.push(FileRecord::from_metadata(&entry.name, &metadata)?);
        }
        Ok(records)
    }

    /// Destroy the container and everything in it. Irreversible; no
    /// confirmation happens at this layer.
    pub async fn delete_container(&self) -> VaultResult<()> {
        self.store.delete_container().await?;
        info!(container = %self.store.container_name(), "container deleted");
        Ok(())
    }

    /// Permanently delete every object in the container — live and
    /// soft-deleted, snapshots included — leaving the container itself in
    /// place.
    ///
    /// The per-object deletes run concurrently and the call fails fast:
    /// the first store failure cancels the remaining deletes and is
    /// returned, so the container may be left partially purged.
    pub async fn purge_container_contents(&self) -> VaultResult<()> {
        let entries = self
            .store
            .list_objects("", ListingScope::live().with_deleted())
            .await?;
        let purges = entries
            .iter()
            .filter(|entry| !entry.is_snapshot())
            .map(|entry| self.store.purge_object(&entry.name));
        try_join_all(purges).await?;

        info!(container = %self.store.container_name(), "container contents purged");
        Ok(())
    }
}

/// Store-level "wrong state" lookups surface to callers as `NotFound` on
/// the logical name; everything else stays an opaque store failure.
fn not_found_as(err: StoreError, blob_name: &str) -> VaultError {
    match err {
        StoreError::ObjectNotFound(_) | StoreError::NotSoftDeleted(_) => {
            VaultError::NotFound(blob_name.to_string())
        }
        other => VaultError::Store(other),
    }
}
