//! End-to-end lifecycle coverage against the in-memory backend, plus one
//! full pass over the disk backend.

use anyhow::Result;
use async_trait::async_trait;
use blob_vault::config::DiskStoreConfig;
use blob_vault::store::{
    ListingScope, MetadataMap, ObjectEntry, ObjectStore, StoreError, StoreResult,
};
use blob_vault::{
    BlobStatus, DiskStore, MemoryStore, NOT_APPLICABLE, TransferOptions, VaultError, VaultService,
};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

async fn vault() -> (VaultService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new("Lifecycle Tests").unwrap());
    let service = VaultService::connect(store.clone(), TransferOptions::default())
        .await
        .unwrap();
    (service, store)
}

fn write_source(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn upload_then_download_round_trips_bytes() -> Result<()> {
    let (service, _) = vault().await;
    let scratch = TempDir::new()?;
    let source = write_source(&scratch, "payload.bin", &[0u8, 159, 146, 150, 7, 255]);

    service.upload(&source, "bin", "alice", "raw bytes").await?;

    let restored = scratch.path().join("restored.bin");
    service.download("bin/payload.bin", &restored).await?;
    assert_eq!(std::fs::read(&restored)?, std::fs::read(&source)?);
    Ok(())
}

#[tokio::test]
async fn upload_writes_the_full_audit_record() -> Result<()> {
    let (service, _) = vault().await;
    let scratch = TempDir::new()?;
    let source = write_source(&scratch, "a.txt", b"Test file");

    let record = service.upload(&source, "docs", "alice", "unit notes").await?;

    assert_eq!(record.blob_name, "docs/a.txt");
    assert_eq!(record.file_name, "a.txt");
    assert_eq!(record.file_size, "9");
    assert_eq!(record.status, BlobStatus::Active);
    assert_eq!(record.uploaded_by, "alice");
    assert_eq!(record.comments, "unit notes");
    assert_ne!(record.upload_date, NOT_APPLICABLE);
    assert_eq!(record.delete_date, NOT_APPLICABLE);
    assert_eq!(record.recover_date, NOT_APPLICABLE);
    assert_eq!(record.deleted_by, NOT_APPLICABLE);
    assert_eq!(record.recovered_by, NOT_APPLICABLE);

    // The same record materializes back out of the live listing.
    let listed = service.list_active("docs").await?;
    assert_eq!(listed, vec![record]);
    Ok(())
}

#[tokio::test]
async fn repeated_uploads_accumulate_snapshot_versions() -> Result<()> {
    let (service, _) = vault().await;
    let scratch = TempDir::new()?;
    let source = write_source(&scratch, "a.txt", b"v1");

    service.upload(&source, "docs", "alice", "first").await?;
    std::fs::write(&source, b"v2")?;
    service.upload(&source, "docs", "alice", "second").await?;
    assert_eq!(service.list_versions("docs/a.txt").await?.len(), 2);

    std::fs::write(&source, b"v3")?;
    service.upload(&source, "docs", "alice", "third").await?;
    let versions = service.list_versions("docs/a.txt").await?;
    assert_eq!(versions.len(), 3);
    // Snapshot metadata is frozen at upload time.
    assert_eq!(versions[0].comments, "first");
    assert_eq!(versions[2].comments, "third");

    // Overwrites never multiply the live entry.
    assert_eq!(service.list_active("docs").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn delete_moves_blob_from_active_to_inactive_listing() -> Result<()> {
    let (service, _) = vault().await;
    let scratch = TempDir::new()?;
    let source = write_source(&scratch, "a.txt", b"Test file");
    service.upload(&source, "docs", "alice", "").await?;

    service.delete("docs/a.txt", "bob").await?;

    assert!(service.list_active("docs").await?.is_empty());
    assert_eq!(service.list_inactive("docs").await?, vec!["docs/a.txt"]);
    assert!(matches!(
        service.download("docs/a.txt", scratch.path().join("out.txt")).await,
        Err(VaultError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn delete_then_recover_restores_download() -> Result<()> {
    let (service, _) = vault().await;
    let scratch = TempDir::new()?;
    let source = write_source(&scratch, "a.txt", b"Test file");
    service.upload(&source, "docs", "alice", "").await?;

    service.delete("docs/a.txt", "bob").await?;
    service.recover("docs/a.txt", "carol").await?;

    let restored = scratch.path().join("restored.txt");
    service.download("docs/a.txt", &restored).await?;
    assert_eq!(std::fs::read(&restored)?, b"Test file");
    assert!(service.list_inactive("docs").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn recover_keeps_the_delete_audit_fields() -> Result<()> {
    let (service, _) = vault().await;
    let scratch = TempDir::new()?;
    let source = write_source(&scratch, "a.txt", b"Test file");
    service.upload(&source, "docs", "alice", "").await?;

    service.delete("docs/a.txt", "bob").await?;
    service.recover("docs/a.txt", "carol").await?;

    let record = service.list_active("docs").await?.remove(0);
    assert_eq!(record.recovered_by, "carol");
    assert_ne!(record.recover_date, NOT_APPLICABLE);
    // The latest deletion stays on the audit trail after recovery.
    assert_eq!(record.deleted_by, "bob");
    assert_ne!(record.delete_date, NOT_APPLICABLE);
    Ok(())
}

#[tokio::test]
async fn upload_with_missing_source_is_local_io_and_writes_nothing() {
    let (service, store) = vault().await;

    let err = service
        .upload("/definitely/not/here.txt", "docs", "alice", "")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::LocalIo { .. }));
    assert_eq!(store.object_count(), 0);
}

#[tokio::test]
async fn lifecycle_calls_on_unknown_names_are_not_found() {
    let (service, _) = vault().await;
    let scratch = TempDir::new().unwrap();

    let download = service
        .download("docs/ghost.txt", scratch.path().join("out.txt"))
        .await;
    assert!(matches!(download, Err(VaultError::NotFound(_))));

    let delete = service.delete("docs/ghost.txt", "bob").await;
    assert!(matches!(delete, Err(VaultError::NotFound(_))));

    let recover = service.recover("docs/ghost.txt", "bob").await;
    assert!(matches!(recover, Err(VaultError::NotFound(_))));
}

#[tokio::test]
async fn delete_is_repeatable_while_soft_deleted() -> Result<()> {
    let (service, _) = vault().await;
    let scratch = TempDir::new()?;
    let source = write_source(&scratch, "a.txt", b"Test file");
    service.upload(&source, "docs", "alice", "").await?;

    service.delete("docs/a.txt", "bob").await?;
    service.delete("docs/a.txt", "dave").await?;

    assert_eq!(service.list_inactive("docs").await?, vec!["docs/a.txt"]);
    service.recover("docs/a.txt", "carol").await?;
    let record = service.list_active("docs").await?.remove(0);
    // The second delete overwrote the first stamp.
    assert_eq!(record.deleted_by, "dave");
    Ok(())
}

#[tokio::test]
async fn purge_empties_every_listing() -> Result<()> {
    let (service, _) = vault().await;
    let scratch = TempDir::new()?;
    for name in ["a.txt", "b.txt"] {
        let source = write_source(&scratch, name, b"content");
        service.upload(&source, "docs", "alice", "").await?;
        service.upload(&source, "media", "alice", "").await?;
    }
    service.delete("docs/a.txt", "bob").await?;

    service.purge_container_contents().await?;

    for directory in ["docs", "media"] {
        assert!(service.list_active(directory).await?.is_empty());
        assert!(service.list_inactive(directory).await?.is_empty());
    }
    assert!(service.list_versions("docs/a.txt").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn uploads_to_the_container_root() -> Result<()> {
    let (service, _) = vault().await;
    let scratch = TempDir::new()?;
    let source = write_source(&scratch, "top.txt", b"root level");

    let record = service.upload(&source, "", "alice", "").await?;
    assert_eq!(record.blob_name, "top.txt");

    let listed = service.list_active("").await?;
    assert_eq!(listed.len(), 1);
    Ok(())
}

#[tokio::test]
async fn delete_container_breaks_connection_check() -> Result<()> {
    let (service, _) = vault().await;
    assert!(service.connection_check().await);

    service.delete_container().await?;
    assert!(!service.connection_check().await);
    Ok(())
}

/// Delegating store that refuses to purge one poisoned name. Used to pin
/// the fail-fast purge policy.
struct FailingPurgeStore {
    inner: MemoryStore,
    poison: String,
}

#[async_trait]
impl ObjectStore for FailingPurgeStore {
    fn container_name(&self) -> &str {
        self.inner.container_name()
    }

    async fn container_exists(&self) -> StoreResult<bool> {
        self.inner.container_exists().await
    }

    async fn create_container_if_absent(&self) -> StoreResult<()> {
        self.inner.create_container_if_absent().await
    }

    async fn set_container_private(&self) -> StoreResult<()> {
        self.inner.set_container_private().await
    }

    async fn object_exists(&self, name: &str) -> StoreResult<bool> {
        self.inner.object_exists(name).await
    }

    async fn put_object(
        &self,
        name: &str,
        content: Bytes,
        metadata: MetadataMap,
        transfer: &TransferOptions,
    ) -> StoreResult<()> {
        self.inner.put_object(name, content, metadata, transfer).await
    }

    async fn get_object(&self, name: &str, transfer: &TransferOptions) -> StoreResult<Bytes> {
        self.inner.get_object(name, transfer).await
    }

    async fn soft_delete_object(&self, name: &str, include_snapshots: bool) -> StoreResult<()> {
        self.inner.soft_delete_object(name, include_snapshots).await
    }

    async fn undelete_object(&self, name: &str) -> StoreResult<()> {
        self.inner.undelete_object(name).await
    }

    async fn purge_object(&self, name: &str) -> StoreResult<()> {
        if name == self.poison {
            return Err(StoreError::Backend("injected purge failure".into()));
        }
        self.inner.purge_object(name).await
    }

    async fn list_objects(
        &self,
        prefix: &str,
        scope: ListingScope,
    ) -> StoreResult<Vec<ObjectEntry>> {
        self.inner.list_objects(prefix, scope).await
    }

    async fn get_object_metadata(
        &self,
        name: &str,
        snapshot: Option<&str>,
    ) -> StoreResult<MetadataMap> {
        self.inner.get_object_metadata(name, snapshot).await
    }

    async fn set_object_metadata(&self, name: &str, metadata: MetadataMap) -> StoreResult<()> {
        self.inner.set_object_metadata(name, metadata).await
    }

    async fn create_snapshot(&self, name: &str) -> StoreResult<String> {
        self.inner.create_snapshot(name).await
    }

    async fn delete_container(&self) -> StoreResult<()> {
        self.inner.delete_container().await
    }
}

#[tokio::test]
async fn purge_fails_fast_when_the_store_errors() -> Result<()> {
    let store = Arc::new(FailingPurgeStore {
        inner: MemoryStore::new("purge policy").unwrap(),
        poison: "docs/poison.txt".to_string(),
    });
    let service = VaultService::connect(store, TransferOptions::default()).await?;

    let scratch = TempDir::new()?;
    for name in ["poison.txt", "bystander.txt"] {
        let source = write_source(&scratch, name, b"content");
        service.upload(&source, "docs", "alice", "").await?;
    }

    let err = service.purge_container_contents().await.unwrap_err();
    assert!(matches!(err, VaultError::Store(StoreError::Backend(_))));
    Ok(())
}

#[tokio::test]
async fn disk_store_runs_the_full_lifecycle() -> Result<()> {
    let scratch = TempDir::new()?;
    let config = DiskStoreConfig::new(
        scratch.path().join("objects"),
        format!("sqlite://{}", scratch.path().join("meta.db").display()),
    );
    let store = Arc::new(DiskStore::open(&config, "Disk Lifecycle").await?);
    let service = VaultService::connect(store, TransferOptions::default()).await?;
    assert!(service.connection_check().await);

    let source = write_source(&scratch, "a.txt", b"Test file");
    let record = service.upload(&source, "docs", "alice", "disk pass").await?;
    assert_eq!(record.file_size, "9");

    std::fs::write(&source, b"Test file v2")?;
    service.upload(&source, "docs", "alice", "disk pass 2").await?;
    assert_eq!(service.list_versions("docs/a.txt").await?.len(), 2);

    service.delete("docs/a.txt", "bob").await?;
    assert!(service.list_active("docs").await?.is_empty());
    assert_eq!(service.list_inactive("docs").await?, vec!["docs/a.txt"]);

    service.recover("docs/a.txt", "carol").await?;
    let restored = scratch.path().join("restored.txt");
    service.download("docs/a.txt", &restored).await?;
    assert_eq!(std::fs::read(&restored)?, b"Test file v2");

    let record = service.list_active("docs").await?.remove(0);
    assert_eq!(record.deleted_by, "bob");
    assert_eq!(record.recovered_by, "carol");

    service.purge_container_contents().await?;
    assert!(service.list_active("docs").await?.is_empty());
    assert!(service.list_inactive("docs").await?.is_empty());
    assert!(service.list_versions("docs/a.txt").await?.is_empty());
    Ok(())
}
