//! Lifecycle management for files in a blob container: upload, download,
//! soft-delete, recovery, and versioned-snapshot retrieval, with a
//! per-file audit record (who uploaded/deleted/recovered, when, and
//! commentary) carried as metadata on every stored object.
//!
//! The storage backend is pluggable through the [`store::ObjectStore`]
//! trait. Two implementations ship with the crate: [`MemoryStore`] for
//! tests and prototyping, and [`DiskStore`] (payloads on disk, metadata in
//! SQLite) as a durable local stand-in for a cloud container.
//!
//! # Example
//!
//! ```no_run
//! use blob_vault::{MemoryStore, TransferOptions, VaultService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), blob_vault::VaultError> {
//!     let store = Arc::new(MemoryStore::new("Project Files")?);
//!     let vault = VaultService::connect(store, TransferOptions::default()).await?;
//!
//!     let record = vault.upload("./report.pdf", "docs", "alice", "Q3 report").await?;
//!     println!("stored {} ({} bytes)", record.blob_name, record.file_size);
//!
//!     vault.delete("docs/report.pdf", "bob").await?;
//!     vault.recover("docs/report.pdf", "alice").await?;
//!     vault.download("docs/report.pdf", "./restored.pdf").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod store;

pub use config::{DiskStoreConfig, TransferOptions};
pub use errors::{VaultError, VaultResult};
pub use models::file_record::{BlobStatus, FileRecord, NOT_APPLICABLE};
pub use services::vault_service::VaultService;
pub use store::disk::DiskStore;
pub use store::memory::MemoryStore;
pub use store::{ListingScope, ObjectEntry, ObjectStore, StoreError};
