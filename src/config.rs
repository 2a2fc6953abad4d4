//! Container naming rules, transfer options, and disk-backend configuration.

use crate::errors::{VaultError, VaultResult};
use std::env;
use std::path::PathBuf;

const CONTAINER_NAME_MIN_LEN: usize = 3;
const CONTAINER_NAME_MAX_LEN: usize = 63;

/// Default number of parallel transfer operations hinted to the store.
pub const DEFAULT_PARALLEL_OPERATIONS: usize = 10;

/// Transfer tuning passed through to the storage backend on upload and
/// download. The service layer never interprets it; backends that do their
/// own chunking may use it to size their internal parallelism.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub parallel_operations: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            parallel_operations: DEFAULT_PARALLEL_OPERATIONS,
        }
    }
}

/// Normalize a raw container name and validate the result.
///
/// Lowercases the input and strips all whitespace, then enforces
/// container naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, hyphens only
/// - cannot start or end with a hyphen
/// - cannot contain consecutive hyphens
///
/// Returns a `Configuration` error describing the first violated rule.
pub fn normalize_container_name(raw: &str) -> VaultResult<String> {
    let name: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let invalid = |reason: &str| {
        VaultError::Configuration(format!("container name `{}` invalid: {}", raw, reason))
    };

    let len = name.len();
    if len < CONTAINER_NAME_MIN_LEN || len > CONTAINER_NAME_MAX_LEN {
        return Err(invalid("must be between 3 and 63 characters"));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, and hyphens",
        ));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must start and end with a letter or digit"));
    }

    if name.contains("--") {
        return Err(invalid("cannot contain consecutive hyphens"));
    }

    Ok(name)
}

/// Configuration for [`DiskStore`](crate::store::disk::DiskStore).
/// Values come from the environment with local defaults.
#[derive(Debug, Clone)]
pub struct DiskStoreConfig {
    /// Base directory on disk where object payloads are stored.
    pub root_dir: PathBuf,
    /// SQLite URL for the metadata database.
    pub database_url: String,
}

impl DiskStoreConfig {
    pub fn new(root_dir: impl Into<PathBuf>, database_url: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            database_url: database_url.into(),
        }
    }

    /// Read `BLOB_VAULT_STORAGE_DIR` and `BLOB_VAULT_DATABASE_URL`,
    /// falling back to `./data` paths.
    pub fn from_env() -> Self {
        let root_dir =
            env::var("BLOB_VAULT_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let database_url = env::var("BLOB_VAULT_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/blob_vault.db".into());
        Self::new(root_dir, database_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_lowercases_and_strips_whitespace() {
        assert_eq!(
            normalize_container_name("Project Files").unwrap(),
            "projectfiles"
        );
        assert_eq!(
            normalize_container_name("  archive\t2024 ").unwrap(),
            "archive2024"
        );
    }

    #[test]
    fn normalization_rejects_bad_names() {
        assert!(normalize_container_name("ab").is_err());
        assert!(normalize_container_name(&"x".repeat(64)).is_err());
        assert!(normalize_container_name("under_score").is_err());
        assert!(normalize_container_name("-leading").is_err());
        assert!(normalize_container_name("trailing-").is_err());
        assert!(normalize_container_name("two--hyphens").is_err());
    }

    #[test]
    fn transfer_options_default_to_ten_parallel_operations() {
        assert_eq!(TransferOptions::default().parallel_operations, 10);
    }
}
