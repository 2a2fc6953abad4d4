//! The per-file audit record attached to every stored blob.
//!
//! A `FileRecord` is never persisted on its own — it is materialized from
//! the metadata map carried by the underlying object, and written back to
//! that map whenever a lifecycle event mutates the audit trail.

use crate::errors::{VaultError, VaultResult};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Sentinel for audit fields whose event has not occurred yet.
pub const NOT_APPLICABLE: &str = "N/A";

/// Fixed metadata key names. These are wire constants: containers written
/// by older tooling use exactly these strings, so they must never change.
pub mod keys {
    pub const BLOB_NAME: &str = "BlobName";
    pub const FILE_NAME: &str = "FileName";
    pub const BLOB_STATUS: &str = "BlobStatus";
    pub const FILE_COMMENTS: &str = "FileComments";
    pub const UPLOAD_DATE: &str = "UploadDate";
    pub const DELETE_DATE: &str = "DeleteDate";
    pub const RECOVER_DATE: &str = "RecoverDate";
    pub const FILE_SIZE: &str = "FileSize";
    pub const UPLOADED_BY: &str = "UploadedBy";
    pub const DELETED_BY: &str = "DeletedBy";
    pub const RECOVERED_BY: &str = "RecoveredBy";

    pub const ALL: [&str; 11] = [
        BLOB_NAME,
        FILE_NAME,
        BLOB_STATUS,
        FILE_COMMENTS,
        UPLOAD_DATE,
        DELETE_DATE,
        RECOVER_DATE,
        FILE_SIZE,
        UPLOADED_BY,
        DELETED_BY,
        RECOVERED_BY,
    ];
}

/// Display status of a blob.
///
/// Derived, not authoritative: whether a blob is live or soft-deleted is
/// decided by which listing it appears in. The metadata value is written
/// `Active` at upload time and left alone afterwards.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobStatus {
    Active,
    Deleted,
}

impl BlobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobStatus::Active => "Active",
            BlobStatus::Deleted => "Deleted",
        }
    }

    /// Lenient parse: anything other than the exact `Deleted` marker reads
    /// as `Active`.
    pub fn parse(value: &str) -> Self {
        if value == "Deleted" {
            BlobStatus::Deleted
        } else {
            BlobStatus::Active
        }
    }
}

impl fmt::Display for BlobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit metadata for a single stored file.
///
/// All values are strings because the record mirrors the wire metadata map
/// one-to-one: timestamps are pre-formatted, `file_size` is the decimal
/// byte count at upload time, and unset audit fields hold
/// [`NOT_APPLICABLE`]. Identity fields are caller-supplied and unverified.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// Full logical path (directory + `/` + filename) — the unique key
    /// within the container.
    pub blob_name: String,

    /// Base filename, for display.
    pub file_name: String,

    /// Display status, see [`BlobStatus`].
    pub status: BlobStatus,

    /// Free-text commentary set at upload time, immutable thereafter.
    pub comments: String,

    /// When the file was uploaded.
    pub upload_date: String,

    /// When the file was most recently soft-deleted, or `N/A`.
    pub delete_date: String,

    /// When the file was most recently recovered, or `N/A`.
    pub recover_date: String,

    /// Byte length at upload time, fixed for the life of the version.
    pub file_size: String,

    /// Who uploaded the file.
    pub uploaded_by: String,

    /// Who most recently soft-deleted the file, or `N/A`.
    pub deleted_by: String,

    /// Who most recently recovered the file, or `N/A`.
    pub recovered_by: String,
}

impl FileRecord {
    /// Build the record for a freshly uploaded file: status `Active`,
    /// upload timestamp = now, every delete/recover field at the sentinel.
    pub fn new_active(
        blob_name: &str,
        file_name: &str,
        size_bytes: u64,
        uploaded_by: &str,
        comments: &str,
    ) -> Self {
        Self {
            blob_name: blob_name.to_string(),
            file_name: file_name.to_string(),
            status: BlobStatus::Active,
            comments: comments.to_string(),
            upload_date: timestamp_now(),
            delete_date: NOT_APPLICABLE.to_string(),
            recover_date: NOT_APPLICABLE.to_string(),
            file_size: size_bytes.to_string(),
            uploaded_by: uploaded_by.to_string(),
            deleted_by: NOT_APPLICABLE.to_string(),
            recovered_by: NOT_APPLICABLE.to_string(),
        }
    }

    /// Render the record as the eleven-entry wire metadata map.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            (keys::BLOB_NAME.to_string(), self.blob_name.clone()),
            (keys::FILE_NAME.to_string(), self.file_name.clone()),
            (keys::BLOB_STATUS.to_string(), self.status.to_string()),
            (keys::FILE_COMMENTS.to_string(), self.comments.clone()),
            (keys::UPLOAD_DATE.to_string(), self.upload_date.clone()),
            (keys::DELETE_DATE.to_string(), self.delete_date.clone()),
            (keys::RECOVER_DATE.to_string(), self.recover_date.clone()),
            (keys::FILE_SIZE.to_string(), self.file_size.clone()),
            (keys::UPLOADED_BY.to_string(), self.uploaded_by.clone()),
            (keys::DELETED_BY.to_string(), self.deleted_by.clone()),
            (keys::RECOVERED_BY.to_string(), self.recovered_by.clone()),
        ])
    }

    /// Reconstruct a record from a fetched metadata map.
    ///
    /// Every object written by this crate carries all eleven fields, so a
    /// missing key means the fetch hit a non-conforming object and is
    /// reported as [`VaultError::MetadataIncomplete`]. `blob_name` is only
    /// used for error context; the field values all come from the map.
    pub fn from_metadata(
        blob_name: &str,
        metadata: &HashMap<String, String>,
    ) -> VaultResult<Self> {
        let field = |key: &'static str| -> VaultResult<String> {
            metadata
                .get(key)
                .cloned()
                .ok_or_else(|| VaultError::MetadataIncomplete {
                    blob: blob_name.to_string(),
                    key,
                })
        };

        Ok(Self {
            blob_name: field(keys::BLOB_NAME)?,
            file_name: field(keys::FILE_NAME)?,
            status: BlobStatus::parse(&field(keys::BLOB_STATUS)?),
            comments: field(keys::FILE_COMMENTS)?,
            upload_date: field(keys::UPLOAD_DATE)?,
            delete_date: field(keys::DELETE_DATE)?,
            recover_date: field(keys::RECOVER_DATE)?,
            file_size: field(keys::FILE_SIZE)?,
            uploaded_by: field(keys::UPLOADED_BY)?,
            deleted_by: field(keys::DELETED_BY)?,
            recovered_by: field(keys::RECOVERED_BY)?,
        })
    }
}

/// Current UTC time in the format used for every audit timestamp.
pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Join a logical directory and a base filename into a blob name.
/// An empty directory places the file at the container root.
pub fn blob_name_for(directory: &str, file_name: &str) -> String {
    let dir = directory.trim_matches('/');
    if dir.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", dir, file_name)
    }
}

/// Listing prefix for a logical directory. The trailing separator keeps
/// `docs` from matching `docs2/...`.
pub fn directory_prefix(directory: &str) -> String {
    let dir = directory.trim_matches('/');
    if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_active_populates_all_eleven_fields() {
        let record = FileRecord::new_active("docs/a.txt", "a.txt", 9, "alice", "first draft");
        let metadata = record.to_metadata();

        assert_eq!(metadata.len(), 11);
        for key in keys::ALL {
            assert!(metadata.contains_key(key), "missing {}", key);
        }
        assert_eq!(metadata[keys::BLOB_STATUS], "Active");
        assert_eq!(metadata[keys::FILE_SIZE], "9");
        assert_eq!(metadata[keys::DELETE_DATE], NOT_APPLICABLE);
        assert_eq!(metadata[keys::DELETED_BY], NOT_APPLICABLE);
        assert_eq!(metadata[keys::RECOVER_DATE], NOT_APPLICABLE);
        assert_eq!(metadata[keys::RECOVERED_BY], NOT_APPLICABLE);
        assert_ne!(metadata[keys::UPLOAD_DATE], NOT_APPLICABLE);
    }

    #[test]
    fn metadata_round_trips() {
        let record = FileRecord::new_active("docs/a.txt", "a.txt", 9, "alice", "first draft");
        let rebuilt = FileRecord::from_metadata("docs/a.txt", &record.to_metadata()).unwrap();
        assert_eq!(rebuilt, record);
    }

    #[test]
    fn missing_key_is_reported_with_context() {
        let record = FileRecord::new_active("docs/a.txt", "a.txt", 9, "alice", "");
        let mut metadata = record.to_metadata();
        metadata.remove(keys::DELETED_BY);

        let err = FileRecord::from_metadata("docs/a.txt", &metadata).unwrap_err();
        match err {
            VaultError::MetadataIncomplete { blob, key } => {
                assert_eq!(blob, "docs/a.txt");
                assert_eq!(key, keys::DELETED_BY);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn status_parses_leniently() {
        assert_eq!(BlobStatus::parse("Deleted"), BlobStatus::Deleted);
        assert_eq!(BlobStatus::parse("Active"), BlobStatus::Active);
        assert_eq!(BlobStatus::parse("garbage"), BlobStatus::Active);
    }

    #[test]
    fn blob_names_join_with_forward_slash() {
        assert_eq!(blob_name_for("docs", "a.txt"), "docs/a.txt");
        assert_eq!(blob_name_for("/docs/", "a.txt"), "docs/a.txt");
        assert_eq!(blob_name_for("", "a.txt"), "a.txt");
        assert_eq!(directory_prefix("docs"), "docs/");
        assert_eq!(directory_prefix(""), "");
    }
}
