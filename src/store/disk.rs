//! src/store/disk.rs
//!
//! DiskStore — durable local backend: object payloads on disk beneath
//! `root/{container}/{shard}/{shard}/{name}`, snapshot payload copies under
//! `root/{container}/.snapshots/{id}`, and SQLite for container, object,
//! metadata, and snapshot rows. Useful as a development stand-in for a
//! cloud container; it honors the full trait contract including
//! soft-delete, undelete, and frozen snapshots.

use crate::config::{DiskStoreConfig, TransferOptions, normalize_container_name};
use crate::errors::{VaultError, VaultResult};
use crate::models::file_record::timestamp_now;
use crate::store::{ListingScope, MetadataMap, ObjectEntry, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

const SNAPSHOT_DIR: &str = ".snapshots";

/// Disk + SQLite implementation of [`ObjectStore`].
#[derive(Clone)]
pub struct DiskStore {
    db: Arc<SqlitePool>,
    root: PathBuf,
    container: String,
}

impl DiskStore {
    /// Open (or initialize) the backing database and bind to a container
    /// name. The schema is applied idempotently on every open; the
    /// container itself is created by `create_container_if_absent`.
    pub async fn open(config: &DiskStoreConfig, container: &str) -> VaultResult<Self> {
        let container = normalize_container_name(container)?;

        fs::create_dir_all(&config.root_dir)
            .await
            .map_err(|err| {
                VaultError::Configuration(format!(
                    "cannot create storage directory `{}`: {}",
                    config.root_dir.display(),
                    err
                ))
            })?;

        // SQLx needs the parent directory of a file-backed database to
        // exist before it will create the file.
        let db_path = config
            .database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("file:");
        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await.map_err(|err| {
                        VaultError::Configuration(format!(
                            "cannot create database directory `{}`: {}",
                            parent.display(),
                            err
                        ))
                    })?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|err| {
                VaultError::Configuration(format!(
                    "invalid database URL `{}`: {}",
                    config.database_url, err
                ))
            })?
            .create_if_missing(true);

        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|err| {
                VaultError::Configuration(format!(
                    "cannot open database `{}`: {}",
                    config.database_url, err
                ))
            })?;

        run_migrations(&db)
            .await
            .map_err(|err| VaultError::Configuration(format!("schema setup failed: {}", err)))?;

        Ok(Self {
            db: Arc::new(db),
            root: config.root_dir.clone(),
            container,
        })
    }

    fn container_root(&self) -> PathBuf {
        self.root.join(&self.container)
    }

    /// Two-level shard identifiers for an object name: the first two bytes
    /// of MD5(container/name) as lowercase hex. Keeps per-directory file
    /// counts bounded.
    fn object_shards(&self, name: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", self.container, name));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, name: &str) -> PathBuf {
        let (shard_a, shard_b) = self.object_shards(name);
        let mut path = self.container_root();
        path.push(shard_a);
        path.push(shard_b);
        path.push(name);
        path
    }

    fn snapshot_path(&self, snapshot_id: &str) -> PathBuf {
        let mut path = self.container_root();
        path.push(SNAPSHOT_DIR);
        path.push(snapshot_id);
        path
    }

    /// Soft-delete flag of an object row in any state.
    /// Returns ObjectNotFound if the row is missing entirely.
    async fn fetch_is_deleted(&self, name: &str) -> StoreResult<bool> {
        let row: Option<bool> =
            sqlx::query_scalar("SELECT is_deleted FROM objects WHERE container = ? AND name = ?")
                .bind(&self.container)
                .bind(name)
                .fetch_optional(&*self.db)
                .await?;
        row.ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))
    }

    async fn write_object_rows(
        &self,
        name: &str,
        metadata: &MetadataMap,
        size_bytes: i64,
        etag: &str,
    ) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO objects (container, name, size_bytes, etag, is_deleted, last_modified)
             VALUES (?, ?, ?, ?, 0, ?)
             ON CONFLICT(container, name) DO UPDATE SET
                 size_bytes = excluded.size_bytes,
                 etag = excluded.etag,
                 is_deleted = 0,
                 last_modified = excluded.last_modified",
        )
        .bind(&self.container)
        .bind(name)
        .bind(size_bytes)
        .bind(etag)
        .bind(timestamp_now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM object_metadata WHERE container = ? AND object_name = ?")
            .bind(&self.container)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        for (key, value) in metadata {
            sqlx::query(
                "INSERT INTO object_metadata (container, object_name, key, value)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&self.container)
            .bind(name)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Recursively remove empty directories up to the container root.
    /// Stops at the first non-empty or missing directory.
    async fn prune_empty_dirs(&self, start: &Path) {
        let stop = self.container_root();
        let mut current = start.to_path_buf();
        while current.starts_with(&stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }

    async fn remove_payload_file(&self, path: &Path) -> StoreResult<()> {
        match fs::remove_file(path).await {
            Ok(_) => debug!("removed payload file {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("payload file {} already missing", path.display());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for DiskStore {
    fn container_name(&self) -> &str {
        &self.container
    }

    async fn container_exists(&self) -> StoreResult<bool> {
        let row: Option<i64> = sqlx::query_scalar("SELECT 1 FROM containers WHERE name = ?")
            .bind(&self.container)
            .fetch_optional(&*self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn create_container_if_absent(&self) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO containers (name, public_access, created_at) VALUES (?, 0, ?)",
        )
        .bind(&self.container)
        .bind(timestamp_now())
        .execute(&*self.db)
        .await?;
        fs::create_dir_all(self.container_root()).await?;
        Ok(())
    }

    async fn set_container_private(&self) -> StoreResult<()> {
        let result = sqlx::query("UPDATE containers SET public_access = 0 WHERE name = ?")
            .bind(&self.container)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ContainerNotFound(self.container.clone()));
        }
        Ok(())
    }

    async fn object_exists(&self, name: &str) -> StoreResult<bool> {
        let row: Option<bool> =
            sqlx::query_scalar("SELECT is_deleted FROM objects WHERE container = ? AND name = ?")
                .bind(&self.container)
                .bind(name)
                .fetch_optional(&*self.db)
                .await?;
        Ok(row == Some(false))
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

        let file_path = self.object_path(name);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                StoreError::Backend(format!("object path for `{}` has no parent directory", name))
            })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(&content).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }

        let etag = format!("{:x}", md5::compute(&content));
        if let Err(err) = self
            .write_object_rows(name, &metadata, content.len() as i64, &etag)
            .await
        {
            let _ = fs::remove_file(&file_path).await;
            return Err(err);
        }
        Ok(())
    }

    async fn get_object(&self, name: &str, _transfer: &TransferOptions) -> StoreResult<Bytes> {
        if self.fetch_is_deleted(name).await? {
            return Err(StoreError::ObjectNotFound(name.to_string()));
        }
        match fs::read(self.object_path(name)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::ObjectNotFound(name.to_string()))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn soft_delete_object(&self, name: &str, include_snapshots: bool) -> StoreResult<()> {
        self.fetch_is_deleted(name).await?;
        let mut tx = self.db.begin().await?;
        sqlx::query("UPDATE objects SET is_deleted = 1 WHERE container = ? AND name = ?")
            .bind(&self.container)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        if include_snapshots {
            sqlx::query(
                "UPDATE snapshots SET is_deleted = 1 WHERE container = ? AND object_name = ?",
            )
            .bind(&self.container)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(name, include_snapshots, "soft-deleted object");
        Ok(())
    }

    async fn undelete_object(&self, name: &str) -> StoreResult<()> {
        if !self.fetch_is_deleted(name).await? {
            return Err(StoreError::NotSoftDeleted(name.to_string()));
        }
        let mut tx = self.db.begin().await?;
        sqlx::query("UPDATE objects SET is_deleted = 0 WHERE container = ? AND name = ?")
            .bind(&self.container)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE snapshots SET is_deleted = 0 WHERE container = ? AND object_name = ?")
            .bind(&self.container)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(name, "undeleted object");
        Ok(())
    }

    async fn purge_object(&self, name: &str) -> StoreResult<()> {
        self.fetch_is_deleted(name).await?;
        let snapshot_ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM snapshots WHERE container = ? AND object_name = ?")
                .bind(&self.container)
                .bind(name)
                .fetch_all(&*self.db)
                .await?;

        let mut tx = self.db.begin().await?;
        for id in &snapshot_ids {
            sqlx::query("DELETE FROM snapshot_metadata WHERE snapshot_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM snapshots WHERE container = ? AND object_name = ?")
            .bind(&self.container)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM object_metadata WHERE container = ? AND object_name = ?")
            .bind(&self.container)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM objects WHERE container = ? AND name = ?")
            .bind(&self.container)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        for id in &snapshot_ids {
            self.remove_payload_file(&self.snapshot_path(id)).await?;
        }
        let file_path = self.object_path(name);
        self.remove_payload_file(&file_path).await?;
        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        debug!(name, "purged object");
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        scope: ListingScope,
    ) -> StoreResult<Vec<ObjectEntry>> {
        let like = format!("{}%", prefix);
        let mut entries = Vec::new();

        let rows: Vec<(String, bool)> = sqlx::query_as(
            "SELECT name, is_deleted FROM objects
             WHERE container = ? AND name LIKE ?
             ORDER BY name ASC",
        )
        .bind(&self.container)
        .bind(&like)
        .fetch_all(&*self.db)
        .await?;
        for (name, deleted) in rows {
            if deleted && !scope.include_deleted {
                continue;
            }
            entries.push(ObjectEntry {
                name,
                deleted,
                snapshot: None,
            });
        }

        if scope.include_snapshots {
            let rows: Vec<(String, String, bool)> = sqlx::query_as(
                "SELECT id, object_name, is_deleted FROM snapshots
                 WHERE container = ? AND object_name LIKE ?
                 ORDER BY rowid ASC",
            )
            .bind(&self.container)
            .bind(&like)
            .fetch_all(&*self.db)
            .await?;
            for (id, name, deleted) in rows {
                if deleted && !scope.include_deleted {
                    continue;
                }
                entries.push(ObjectEntry {
                    name,
                    deleted,
                    snapshot: Some(id),
                });
            }
        }

        Ok(entries)
    }

    async fn get_object_metadata(
        &self,
        name: &str,
        snapshot: Option<&str>,
    ) -> StoreResult<MetadataMap> {
        match snapshot {
            None => {
                self.fetch_is_deleted(name).await?;
                let rows: Vec<(String, String)> = sqlx::query_as(
                    "SELECT key, value FROM object_metadata
                     WHERE container = ? AND object_name = ?",
                )
                .bind(&self.container)
                .bind(name)
                .fetch_all(&*self.db)
                .await?;
                Ok(rows.into_iter().collect())
            }
            Some(id) => {
                let row: Option<i64> = sqlx::query_scalar(
                    "SELECT 1 FROM snapshots WHERE id = ? AND container = ? AND object_name = ?",
                )
                .bind(id)
                .bind(&self.container)
                .bind(name)
                .fetch_optional(&*self.db)
                .await?;
                if row.is_none() {
                    return Err(StoreError::SnapshotNotFound {
                        name: name.to_string(),
                        snapshot: id.to_string(),
                    });
                }
                let rows: Vec<(String, String)> = sqlx::query_as(
                    "SELECT key, value FROM snapshot_metadata WHERE snapshot_id = ?",
                )
                .bind(id)
                .fetch_all(&*self.db)
                .await?;
                Ok(rows.into_iter().collect())
            }
        }
    }

    async fn set_object_metadata(&self, name: &str, metadata: MetadataMap) -> StoreResult<()> {
        self.fetch_is_deleted(name).await?;
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM object_metadata WHERE container = ? AND object_name = ?")
            .bind(&self.container)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        for (key, value) in &metadata {
            sqlx::query(
                "INSERT INTO object_metadata (container, object_name, key, value)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&self.container)
            .bind(name)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn create_snapshot(&self, name: &str) -> StoreResult<String> {
        if self.fetch_is_deleted(name).await? {
            return Err(StoreError::ObjectNotFound(name.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let snapshot_path = self.snapshot_path(&id);
        if let Some(parent) = snapshot_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(self.object_path(name), &snapshot_path).await?;

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO snapshots (id, container, object_name, is_deleted, taken_at)
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(&id)
        .bind(&self.container)
        .bind(name)
        .bind(timestamp_now())
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO snapshot_metadata (snapshot_id, key, value)
             SELECT ?, key, value FROM object_metadata
             WHERE container = ? AND object_name = ?",
        )
        .bind(&id)
        .bind(&self.container)
        .bind(name)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(name, snapshot = %id, "created snapshot");
        Ok(id)
    }

    async fn delete_container(&self) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        let result = sqlx::query("DELETE FROM containers WHERE name = ?")
            .bind(&self.container)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ContainerNotFound(self.container.clone()));
        }
        sqlx::query(
            "DELETE FROM snapshot_metadata WHERE snapshot_id IN
                 (SELECT id FROM snapshots WHERE container = ?)",
        )
        .bind(&self.container)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM snapshots WHERE container = ?")
            .bind(&self.container)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM object_metadata WHERE container = ?")
            .bind(&self.container)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM objects WHERE container = ?")
            .bind(&self.container)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if let Err(err) = fs::remove_dir_all(self.container_root()).await {
            if err.kind() != ErrorKind::NotFound {
                debug!(
                    "failed to remove container directory {} after delete: {}",
                    self.container_root().display(),
                    err
                );
            }
        }
        debug!(container = %self.container, "deleted container");
        Ok(())
    }
}

/// Apply the embedded schema, statement by statement.
async fn run_migrations(db: &SqlitePool) -> Result<(), sqlx::Error> {
    let sql = include_str!("../../migrations/0001_init.sql");
    for stmt in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}
