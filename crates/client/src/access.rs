//! Access grant and visibility orchestration.
//!
//! Grants live in their own derived accounts keyed by (file record,
//! grantee). Expiry and file-status preconditions are checked locally
//! first so an invalid request never reaches the network; the ledger
//! enforces the same rules authoritatively.

use crate::ledger::LedgerError;
use crate::signer::InstructionSigner;
use crate::DriveClient;
use chaindrive_types::address::shared_access_address;
use chaindrive_types::record::{FileRecord, LedgerRecord, RecordError, SharedAccess};
use chaindrive_types::{instruction, AccessLevel, Address, ProgramError};
use tracing::info;

/// Access orchestration failure.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("{0}")]
    Validation(#[from] ProgramError),
    #[error("file record not found")]
    FileNotFound,
    #[error("shared access grant not found")]
    GrantNotFound,
    #[error("account does not hold the expected record: {0}")]
    Malformed(#[from] RecordError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// An expiry is only meaningful strictly in the future.
pub fn validate_expiration(expires_at: Option<i64>, now: i64) -> Result<(), ProgramError> {
    match expires_at {
        Some(expires) if expires <= now => Err(ProgramError::InvalidExpirationTime),
        _ => Ok(()),
    }
}

impl DriveClient {
    /// Grant `grantee` leveled, optionally time-bounded access to an
    /// active file. Returns the derived grant address.
    pub async fn grant_access(
        &self,
        signer: &dyn InstructionSigner,
        file_record: &Address,
        grantee: &Address,
        access_level: AccessLevel,
        expires_at: Option<i64>,
    ) -> Result<Address, AccessError> {
        validate_expiration(expires_at, chrono::Utc::now().timestamp())?;

        let record = self.read_file_record(file_record).await?;
        if !record.is_active() {
            return Err(ProgramError::FileNotActive.into());
        }

        let ix = instruction::grant_access(
            &self.program,
            &signer.address(),
            file_record,
            grantee,
            access_level,
            expires_at,
        );
        self.ledger.submit(&ix, signer).await?;

        let grant = shared_access_address(&self.program, file_record, grantee);
        info!(file = %file_record, grantee = %grantee, level = %access_level, "access granted");
        Ok(grant)
    }

    /// Deactivate a grant. The account stays on the ledger with its
    /// active flag cleared; only the file owner's signature is accepted.
    pub async fn revoke_access(
        &self,
        signer: &dyn InstructionSigner,
        shared_access: &Address,
    ) -> Result<(), AccessError> {
        let grant = self.read_shared_access(shared_access).await?;
        let file_record = Address::from_bytes(grant.file_record);

        let ix = instruction::revoke_access(
            &self.program,
            &signer.address(),
            &file_record,
            shared_access,
        );
        self.ledger.submit(&ix, signer).await?;
        info!(grant = %shared_access, "access revoked");
        Ok(())
    }

    /// Toggle a file between public and private.
    pub async fn set_visibility(
        &self,
        signer: &dyn InstructionSigner,
        file_record: &Address,
        make_public: bool,
    ) -> Result<(), AccessError> {
        let ix =
            instruction::set_visibility(&self.program, &signer.address(), file_record, make_public);
        self.ledger.submit(&ix, signer).await?;
        info!(file = %file_record, public = make_public, "visibility changed");
        Ok(())
    }

    /// Read and decode one file record.
    pub async fn read_file_record(&self, address: &Address) -> Result<FileRecord, AccessError> {
        let blob = self
            .ledger
            .get_account(address)
            .await?
            .ok_or(AccessError::FileNotFound)?;
        Ok(FileRecord::decode_account(&blob)?)
    }

    async fn read_shared_access(&self, address: &Address) -> Result<SharedAccess, AccessError> {
        let blob = self
            .ledger
            .get_account(address)
            .await?
            .ok_or(AccessError::GrantNotFound)?;
        Ok(SharedAccess::decode_account(&blob)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn past_expiry_rejected() {
        let now = 1_000;
        assert_eq!(
            validate_expiration(Some(999), now),
            Err(ProgramError::InvalidExpirationTime)
        );
        assert_eq!(
            validate_expiration(Some(1_000), now),
            Err(ProgramError::InvalidExpirationTime)
        );
    }

    #[test]
    fn future_or_absent_expiry_accepted() {
        let now = 1_000;
        assert_eq!(validate_expiration(Some(1_001), now), Ok(()));
        assert_eq!(validate_expiration(None, now), Ok(()));
    }
}
