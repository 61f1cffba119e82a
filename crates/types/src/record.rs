//! Ledger-resident record types and their account-blob codec.
//!
//! Every account blob is `discriminator(8 bytes) || bincode(body)`. The
//! discriminator is derived from the record type name so a reader can
//! attempt a typed decode and treat a mismatch as "this account holds a
//! different entity type", not as corruption. Record bodies keep the owner
//! identity as their first field, which pins it to bytes 8..40 of the blob
//! and lets the catalog scan pre-filter accounts by a raw byte comparison.

use crate::address::FILE_NAME_MAX_BYTES;
use crate::error::ProgramError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum byte length of a content-store identifier accepted by the program.
pub const STORAGE_LOCATION_MAX_BYTES: usize = 100;

/// Length of the type discriminator prefixed to every account blob.
pub const DISCRIMINATOR_BYTES: usize = 8;

/// Byte offset of the owner field inside a `FileRecord` blob.
pub const OWNER_FIELD_OFFSET: usize = DISCRIMINATOR_BYTES;

/// Errors produced when decoding an account blob into a typed record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("account data too short ({len} bytes) to hold a record")]
    TooShort { len: usize },
    #[error("account is not a {expected} record")]
    DiscriminatorMismatch { expected: &'static str },
    #[error("malformed {type_name} record: {reason}")]
    Codec {
        type_name: &'static str,
        reason: String,
    },
}

/// Lifecycle status of a file record.
///
/// Decoding is strict: a tag outside this set is a codec error, never a
/// silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Uploading,
    Processing,
    Active,
    Archived,
    Deleted,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploading => "uploading",
            FileStatus::Processing => "processing",
            FileStatus::Active => "active",
            FileStatus::Archived => "archived",
            FileStatus::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level carried by a shared-access grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Admin => "admin",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Singleton program configuration. Created by the program authority;
/// read-only to this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub authority: [u8; 32],
    pub total_files: u64,
    pub storage_fee_per_gb: u64,
    pub max_file_size: u64,
}

/// Per-user profile, created lazily on first publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub owner: [u8; 32],
    pub files_owned: u64,
    pub storage_used: u64,
    pub storage_paid_until: i64,
    pub reputation_score: u32,
}

/// Metadata record for one published file. One live record per
/// `(owner, file_name)` pair; the name participates in address derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub owner: [u8; 32],
    pub file_name: String,
    pub file_size: u64,
    pub file_hash: [u8; 32],
    pub chunk_count: u32,
    pub merkle_root: [u8; 32],
    /// Content-store identifier. Empty until register-storage confirms.
    pub primary_storage: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub status: FileStatus,
    pub is_public: bool,
}

impl FileRecord {
    /// Field-level validation mirroring the program's own checks.
    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.file_name.is_empty() || self.file_name.len() > FILE_NAME_MAX_BYTES {
            return Err(ProgramError::FileNameTooLong);
        }
        if self.file_size == 0 {
            return Err(ProgramError::InvalidFileSize);
        }
        if self.chunk_count == 0 {
            return Err(ProgramError::InvalidChunkCount);
        }
        if self.primary_storage.len() > STORAGE_LOCATION_MAX_BYTES {
            return Err(ProgramError::StorageLocationTooLong);
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == FileStatus::Active
    }

    pub fn has_storage(&self) -> bool {
        !self.primary_storage.is_empty()
    }
}

/// Capability grant for one `(file record, grantee)` pair. Owned by the
/// file owner; the grantee holds only the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedAccess {
    /// Back-reference to the file record. A lookup key, not ownership.
    pub file_record: [u8; 32],
    pub owner: [u8; 32],
    pub shared_with: [u8; 32],
    pub access_level: AccessLevel,
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub is_active: bool,
}

impl SharedAccess {
    /// Whether the grant confers access at `now`. Revoked grants stay on
    /// the ledger with `is_active == false`; expired grants are unusable
    /// even while the account still exists.
    pub fn is_usable_at(&self, now: i64) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| now < exp)
    }
}

/// Typed account-blob codec shared by the four record types.
pub trait LedgerRecord: Serialize + DeserializeOwned {
    const TYPE_NAME: &'static str;

    /// First 8 bytes of SHA-256 over `"account:<TypeName>"`.
    fn discriminator() -> [u8; DISCRIMINATOR_BYTES] {
        let digest = Sha256::digest(format!("account:{}", Self::TYPE_NAME).as_bytes());
        let mut out = [0u8; DISCRIMINATOR_BYTES];
        out.copy_from_slice(&digest[..DISCRIMINATOR_BYTES]);
        out
    }

    fn encode_account(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::from(Self::discriminator());
        bincode::serialize_into(&mut out, self).map_err(|err| RecordError::Codec {
            type_name: Self::TYPE_NAME,
            reason: err.to_string(),
        })?;
        Ok(out)
    }

    fn decode_account(data: &[u8]) -> Result<Self, RecordError> {
        if data.len() < DISCRIMINATOR_BYTES {
            return Err(RecordError::TooShort { len: data.len() });
        }
        let (discriminator, body) = data.split_at(DISCRIMINATOR_BYTES);
        if discriminator != Self::discriminator() {
            return Err(RecordError::DiscriminatorMismatch {
                expected: Self::TYPE_NAME,
            });
        }
        bincode::deserialize(body).map_err(|err| RecordError::Codec {
            type_name: Self::TYPE_NAME,
            reason: err.to_string(),
        })
    }
}

impl LedgerRecord for Config {
    const TYPE_NAME: &'static str = "Config";
}

impl LedgerRecord for UserProfile {
    const TYPE_NAME: &'static str = "UserProfile";
}

impl LedgerRecord for FileRecord {
    const TYPE_NAME: &'static str = "FileRecord";
}

impl LedgerRecord for SharedAccess {
    const TYPE_NAME: &'static str = "SharedAccess";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file_record() -> FileRecord {
        FileRecord {
            owner: [3u8; 32],
            file_name: "report.pdf".to_string(),
            file_size: 5_242_880,
            file_hash: [0x11; 32],
            chunk_count: 5,
            merkle_root: [0x22; 32],
            primary_storage: String::new(),
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
            status: FileStatus::Uploading,
            is_public: false,
        }
    }

    #[test]
    fn file_record_roundtrip() {
        let record = sample_file_record();
        let blob = record.encode_account().unwrap();
        let back = FileRecord::decode_account(&blob).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn owner_sits_at_fixed_offset() {
        let record = sample_file_record();
        let blob = record.encode_account().unwrap();
        assert_eq!(&blob[OWNER_FIELD_OFFSET..OWNER_FIELD_OFFSET + 32], &record.owner);
    }

    #[test]
    fn discriminators_differ_per_type() {
        assert_ne!(FileRecord::discriminator(), SharedAccess::discriminator());
        assert_ne!(FileRecord::discriminator(), UserProfile::discriminator());
        assert_ne!(Config::discriminator(), UserProfile::discriminator());
    }

    #[test]
    fn cross_type_decode_is_a_mismatch() {
        let grant = SharedAccess {
            file_record: [1u8; 32],
            owner: [2u8; 32],
            shared_with: [3u8; 32],
            access_level: AccessLevel::Read,
            expires_at: None,
            created_at: 100,
            is_active: true,
        };
        let blob = grant.encode_account().unwrap();
        let err = FileRecord::decode_account(&blob).unwrap_err();
        assert!(matches!(
            err,
            RecordError::DiscriminatorMismatch {
                expected: "FileRecord"
            }
        ));
    }

    #[test]
    fn truncated_blob_is_too_short() {
        let err = FileRecord::decode_account(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, RecordError::TooShort { len: 3 }));
    }

    #[test]
    fn unknown_status_tag_is_a_decode_error() {
        // Variant tags are encoded as u32; 7 names no FileStatus variant.
        let err = bincode::deserialize::<FileStatus>(&7u32.to_le_bytes());
        assert!(err.is_err());
    }

    #[test]
    fn corrupted_body_is_a_codec_error() {
        let record = sample_file_record();
        let mut blob = record.encode_account().unwrap();
        // Truncate inside the file_name string.
        blob.truncate(DISCRIMINATOR_BYTES + 32 + 8 + 2);
        let err = FileRecord::decode_account(&blob).unwrap_err();
        assert!(matches!(err, RecordError::Codec { .. }));
    }

    #[test]
    fn validation_mirrors_program_checks() {
        let mut record = sample_file_record();
        assert!(record.validate().is_ok());

        record.file_name = "a".repeat(FILE_NAME_MAX_BYTES + 1);
        assert_eq!(record.validate(), Err(ProgramError::FileNameTooLong));

        record = sample_file_record();
        record.file_size = 0;
        assert_eq!(record.validate(), Err(ProgramError::InvalidFileSize));

        record = sample_file_record();
        record.chunk_count = 0;
        assert_eq!(record.validate(), Err(ProgramError::InvalidChunkCount));

        record = sample_file_record();
        record.primary_storage = "x".repeat(STORAGE_LOCATION_MAX_BYTES + 1);
        assert_eq!(record.validate(), Err(ProgramError::StorageLocationTooLong));
    }

    #[test]
    fn shared_access_expiry_semantics() {
        let mut grant = SharedAccess {
            file_record: [1u8; 32],
            owner: [2u8; 32],
            shared_with: [3u8; 32],
            access_level: AccessLevel::Read,
            expires_at: Some(1_000),
            created_at: 500,
            is_active: true,
        };
        assert!(grant.is_usable_at(999));
        assert!(!grant.is_usable_at(1_000));
        assert!(!grant.is_usable_at(2_000));

        grant.expires_at = None;
        assert!(grant.is_usable_at(i64::MAX));

        grant.is_active = false;
        assert!(!grant.is_usable_at(0));
    }
}
