//! Caller-facing error taxonomy for vault operations.
//!
//! Storage backends report [`StoreError`](crate::store::StoreError); the
//! service layer wraps those into `VaultError` so callers see one taxonomy:
//! configuration failures, missing objects, local file I/O, and opaque
//! backend failures. No retries happen anywhere in this crate — every
//! failure is surfaced synchronously with a readable message.

use crate::store::StoreError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// The store endpoint or container could not be prepared at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The operation targeted a logical name absent in the expected state
    /// (live vs. soft-deleted).
    #[error("blob `{0}` not found")]
    NotFound(String),

    /// A local file could not be read (upload source) or written
    /// (download destination).
    #[error("local I/O failure on `{}`: {}", path.display(), source)]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A fetched object is missing one of the required metadata fields.
    /// Only objects written outside this crate can be in that state.
    #[error("object `{blob}` is missing metadata field `{key}`")]
    MetadataIncomplete { blob: String, key: &'static str },

    /// Opaque passthrough of a storage backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VaultError {
    pub(crate) fn local_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }
}
