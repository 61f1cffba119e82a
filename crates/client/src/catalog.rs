//! Read-side reconstruction of per-owner file catalogs.
//!
//! The ledger namespace holds every record type the program owns. A scan
//! pre-filters on the reference bytes at the fixed offset, then attempts a
//! typed decode per account; a decode mismatch means the account holds a
//! different entity type and is skipped, never fatal. Ordering newest
//! first is a presentation contract this reader guarantees, not something
//! the ledger provides.

use crate::ledger::LedgerError;
use crate::DriveClient;
use chaindrive_types::record::{FileRecord, LedgerRecord, SharedAccess, OWNER_FIELD_OFFSET};
use chaindrive_types::Address;
use tracing::debug;

/// Catalog scan failure. Per-account decode problems are skips, not errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A decoded file record together with its account address.
#[derive(Debug, Clone)]
pub struct OwnedFile {
    pub address: Address,
    pub record: FileRecord,
}

/// A decoded shared-access grant together with its account address.
#[derive(Debug, Clone)]
pub struct FileGrant {
    pub address: Address,
    pub grant: SharedAccess,
}

impl DriveClient {
    /// All file records owned by `owner`, newest first. A fresh scan per
    /// call; ledger changes after the snapshot are not observed.
    pub async fn list_files_owned_by(
        &self,
        owner: &Address,
    ) -> Result<Vec<OwnedFile>, CatalogError> {
        let accounts = self.ledger.get_program_accounts(&self.program).await?;

        let mut files: Vec<OwnedFile> = accounts
            .into_iter()
            .filter_map(|(address, blob)| {
                if !reference_matches_at_offset(&blob, owner) {
                    return None;
                }
                match FileRecord::decode_account(&blob) {
                    Ok(record) => Some(OwnedFile { address, record }),
                    Err(err) => {
                        debug!(%address, %err, "skipping account of another type");
                        None
                    }
                }
            })
            .collect();

        files.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
        Ok(files)
    }

    /// All grants issued against one file record, newest first.
    pub async fn shared_access_for_file(
        &self,
        file_record: &Address,
    ) -> Result<Vec<FileGrant>, CatalogError> {
        let accounts = self.ledger.get_program_accounts(&self.program).await?;

        let mut grants: Vec<FileGrant> = accounts
            .into_iter()
            .filter_map(|(address, blob)| {
                if !reference_matches_at_offset(&blob, file_record) {
                    return None;
                }
                match SharedAccess::decode_account(&blob) {
                    Ok(grant) => Some(FileGrant { address, grant }),
                    Err(err) => {
                        debug!(%address, %err, "skipping account of another type");
                        None
                    }
                }
            })
            .collect();

        grants.sort_by(|a, b| b.grant.created_at.cmp(&a.grant.created_at));
        Ok(grants)
    }
}

/// Cheap pre-filter: both FileRecord and SharedAccess keep their primary
/// reference as the first body field, directly after the discriminator.
fn reference_matches_at_offset(blob: &[u8], reference: &Address) -> bool {
    blob.len() >= OWNER_FIELD_OFFSET + 32
        && blob[OWNER_FIELD_OFFSET..OWNER_FIELD_OFFSET + 32] == reference.as_bytes()[..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_filter_requires_full_reference() {
        let owner = Address::from_bytes([7u8; 32]);
        let mut blob = vec![0u8; 8];
        blob.extend_from_slice(owner.as_bytes());
        assert!(reference_matches_at_offset(&blob, &owner));

        blob.truncate(39);
        assert!(!reference_matches_at_offset(&blob, &owner));

        let other = Address::from_bytes([8u8; 32]);
        let mut blob = vec![0u8; 8];
        blob.extend_from_slice(other.as_bytes());
        assert!(!reference_matches_at_offset(&blob, &owner));
    }
}
