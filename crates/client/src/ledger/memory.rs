//! In-memory ledger emulating the program's instruction semantics.
//!
//! Gives the orchestration a substitutable ledger for tests and offline
//! runs: accounts live in a map, instruction handlers enforce the same
//! derived-address, signer, existence, and status rules the on-ledger
//! program does, and the write lock is the serialization point the real
//! ledger provides. Storage accounting (rent, balances) is not modelled.

use crate::ledger::{LedgerError, LedgerRpc, TxId};
use crate::signer::{verify_signature, InstructionSigner};
use async_trait::async_trait;
use chaindrive_types::address::{
    config_address, file_record_address, shared_access_address, user_profile_address,
};
use chaindrive_types::record::{
    Config, FileRecord, FileStatus, LedgerRecord, SharedAccess, UserProfile,
};
use chaindrive_types::{merkle, Address, Instruction, InstructionData, ProgramError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn system_clock() -> i64 {
    chrono::Utc::now().timestamp()
}

/// In-process ledger with the file program's semantics.
#[derive(Clone)]
pub struct MemoryLedger {
    program: Address,
    clock: fn() -> i64,
    accounts: Arc<RwLock<HashMap<Address, Vec<u8>>>>,
    tx_counter: Arc<AtomicU64>,
}

impl MemoryLedger {
    pub fn new(program: Address) -> Self {
        Self::with_clock(program, system_clock)
    }

    /// Use an explicit clock, for deterministic expiry and timestamp tests.
    pub fn with_clock(program: Address, clock: fn() -> i64) -> Self {
        Self {
            program,
            clock,
            accounts: Arc::new(RwLock::new(HashMap::new())),
            tx_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn program(&self) -> &Address {
        &self.program
    }

    /// Install an account blob directly, bypassing instruction handling.
    pub fn seed_account(&self, address: Address, data: Vec<u8>) {
        self.accounts.write().insert(address, data);
    }

    /// Install the singleton config account.
    pub fn seed_config(&self, config: &Config) -> Result<(), LedgerError> {
        let blob = encode(config)?;
        self.seed_account(config_address(&self.program), blob);
        Ok(())
    }

    fn next_tx_id(&self) -> TxId {
        format!("memtx-{}", self.tx_counter.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn apply(
        &self,
        instruction: &Instruction,
        signer_address: Address,
    ) -> Result<(), LedgerError> {
        let now = (self.clock)();
        let mut accounts = self.accounts.write();

        match &instruction.data {
            InstructionData::CreateUserProfile => {
                let expected = user_profile_address(&self.program, &signer_address);
                let target = named_account(instruction, 0)?;
                if *target != expected {
                    return Err(LedgerError::AccountMismatch(
                        "user profile address does not match derivation".into(),
                    ));
                }
                if accounts.contains_key(&expected) {
                    return Err(LedgerError::AccountAlreadyExists);
                }
                let profile = UserProfile {
                    owner: *signer_address.as_bytes(),
                    files_owned: 0,
                    storage_used: 0,
                    storage_paid_until: 0,
                    reputation_score: 0,
                };
                accounts.insert(expected, encode(&profile)?);
                Ok(())
            }

            InstructionData::CreateFile {
                file_name,
                file_size,
                file_hash,
                chunk_count,
                timestamp,
            } => {
                let expected = file_record_address(&self.program, &signer_address, file_name)?;
                let target = named_account(instruction, 0)?;
                if *target != expected {
                    return Err(LedgerError::AccountMismatch(
                        "file record address does not match derivation".into(),
                    ));
                }
                if *chunk_count != merkle::chunk_count(*file_size)? {
                    return Err(ProgramError::InvalidChunkCount.into());
                }

                let config_addr = config_address(&self.program);
                let config = accounts
                    .get(&config_addr)
                    .map(|blob| decode::<Config>(blob))
                    .transpose()?;
                if let Some(config) = &config {
                    if *file_size > config.max_file_size {
                        return Err(ProgramError::InvalidFileSize.into());
                    }
                }

                if accounts.contains_key(&expected) {
                    return Err(LedgerError::AccountAlreadyExists);
                }

                let profile_addr = user_profile_address(&self.program, &signer_address);
                let mut profile: UserProfile = decode(
                    accounts
                        .get(&profile_addr)
                        .ok_or(LedgerError::AccountNotFound)?,
                )?;

                let record = FileRecord {
                    owner: *signer_address.as_bytes(),
                    file_name: file_name.clone(),
                    file_size: *file_size,
                    file_hash: *file_hash,
                    chunk_count: *chunk_count,
                    merkle_root: [0u8; 32],
                    primary_storage: String::new(),
                    created_at: *timestamp,
                    updated_at: *timestamp,
                    status: FileStatus::Uploading,
                    is_public: false,
                };
                record.validate()?;

                profile.files_owned += 1;
                profile.storage_used = profile.storage_used.saturating_add(*file_size);
                accounts.insert(profile_addr, encode(&profile)?);

                if let Some(mut config) = config {
                    config.total_files += 1;
                    accounts.insert(config_addr, encode(&config)?);
                }

                accounts.insert(expected, encode(&record)?);
                Ok(())
            }

            InstructionData::RegisterStorage {
                primary_storage,
                merkle_root,
            } => {
                let target = *named_account(instruction, 0)?;
                let mut record: FileRecord =
                    decode(accounts.get(&target).ok_or(LedgerError::AccountNotFound)?)?;
                if record.owner != *signer_address.as_bytes() {
                    return Err(LedgerError::Unauthorized);
                }
                if primary_storage.is_empty() {
                    return Err(ProgramError::StorageLocationEmpty.into());
                }
                if primary_storage.len() > chaindrive_types::STORAGE_LOCATION_MAX_BYTES {
                    return Err(ProgramError::StorageLocationTooLong.into());
                }
                if !matches!(record.status, FileStatus::Uploading | FileStatus::Processing) {
                    return Err(ProgramError::InvalidFileStatus.into());
                }

                record.primary_storage = primary_storage.clone();
                record.merkle_root = *merkle_root;
                record.status = FileStatus::Processing;
                record.updated_at = now;
                accounts.insert(target, encode(&record)?);
                Ok(())
            }

            InstructionData::FinalizeFile => {
                let target = *named_account(instruction, 0)?;
                let mut record: FileRecord =
                    decode(accounts.get(&target).ok_or(LedgerError::AccountNotFound)?)?;
                if record.owner != *signer_address.as_bytes() {
                    return Err(LedgerError::Unauthorized);
                }
                if record.primary_storage.is_empty() {
                    return Err(ProgramError::NoStorageLocation.into());
                }
                if record.status != FileStatus::Processing {
                    return Err(ProgramError::InvalidFileStatus.into());
                }

                record.status = FileStatus::Active;
                record.updated_at = now;
                accounts.insert(target, encode(&record)?);
                Ok(())
            }

            InstructionData::GrantAccess {
                shared_with,
                access_level,
                expires_at,
            } => {
                let grant_addr = *named_account(instruction, 0)?;
                let record_addr = *named_account(instruction, 1)?;
                let expected = shared_access_address(&self.program, &record_addr, shared_with);
                if grant_addr != expected {
                    return Err(LedgerError::AccountMismatch(
                        "shared access address does not match derivation".into(),
                    ));
                }

                let record: FileRecord = decode(
                    accounts
                        .get(&record_addr)
                        .ok_or(LedgerError::AccountNotFound)?,
                )?;
                if record.owner != *signer_address.as_bytes() {
                    return Err(LedgerError::Unauthorized);
                }
                if !record.is_active() {
                    return Err(ProgramError::FileNotActive.into());
                }
                if let Some(expires) = expires_at {
                    if *expires <= now {
                        return Err(ProgramError::InvalidExpirationTime.into());
                    }
                }
                if accounts.contains_key(&grant_addr) {
                    return Err(LedgerError::AccountAlreadyExists);
                }

                let grant = SharedAccess {
                    file_record: *record_addr.as_bytes(),
                    owner: *signer_address.as_bytes(),
                    shared_with: *shared_with.as_bytes(),
                    access_level: *access_level,
                    expires_at: *expires_at,
                    created_at: now,
                    is_active: true,
                };
                accounts.insert(grant_addr, encode(&grant)?);
                Ok(())
            }

            InstructionData::RevokeAccess => {
                let grant_addr = *named_account(instruction, 0)?;
                let mut grant: SharedAccess = decode(
                    accounts
                        .get(&grant_addr)
                        .ok_or(LedgerError::AccountNotFound)?,
                )?;
                if grant.owner != *signer_address.as_bytes() {
                    return Err(LedgerError::Unauthorized);
                }

                grant.is_active = false;
                accounts.insert(grant_addr, encode(&grant)?);
                Ok(())
            }

            InstructionData::MakePublic | InstructionData::MakePrivate => {
                let target = *named_account(instruction, 0)?;
                let mut record: FileRecord =
                    decode(accounts.get(&target).ok_or(LedgerError::AccountNotFound)?)?;
                if record.owner != *signer_address.as_bytes() {
                    return Err(LedgerError::Unauthorized);
                }

                record.is_public = matches!(instruction.data, InstructionData::MakePublic);
                record.updated_at = now;
                accounts.insert(target, encode(&record)?);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl LedgerRpc for MemoryLedger {
    async fn get_account(&self, address: &Address) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.accounts.read().get(address).cloned())
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
    ) -> Result<Vec<(Address, Vec<u8>)>, LedgerError> {
        if *program != self.program {
            return Ok(Vec::new());
        }
        Ok(self
            .accounts
            .read()
            .iter()
            .map(|(address, data)| (*address, data.clone()))
            .collect())
    }

    async fn submit(
        &self,
        instruction: &Instruction,
        signer: &dyn InstructionSigner,
    ) -> Result<TxId, LedgerError> {
        if instruction.program != self.program {
            return Err(LedgerError::AccountMismatch(
                "instruction targets a different program".into(),
            ));
        }

        let signer_address = signer.address();
        match instruction.signer() {
            Some(expected) if *expected == signer_address => {}
            _ => return Err(LedgerError::Unauthorized),
        }

        let payload = instruction.signing_payload();
        let signature = signer.sign(&payload);
        if !verify_signature(&signer_address, &payload, &signature) {
            return Err(LedgerError::Unauthorized);
        }

        self.apply(instruction, signer_address)?;
        Ok(self.next_tx_id())
    }
}

fn named_account<'a>(
    instruction: &'a Instruction,
    index: usize,
) -> Result<&'a Address, LedgerError> {
    instruction
        .accounts
        .get(index)
        .map(|meta| &meta.address)
        .ok_or_else(|| LedgerError::AccountMismatch(format!("missing account at index {index}")))
}

fn encode<R: LedgerRecord>(record: &R) -> Result<Vec<u8>, LedgerError> {
    record
        .encode_account()
        .map_err(|err| LedgerError::Internal(err.to_string()))
}

fn decode<R: LedgerRecord>(data: &[u8]) -> Result<R, LedgerError> {
    R::decode_account(data).map_err(|err| LedgerError::AccountMismatch(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Keypair;
    use chaindrive_types::instruction;

    fn fixed_clock() -> i64 {
        1_700_000_000
    }

    fn setup() -> (MemoryLedger, Keypair) {
        let program = Address::from_bytes([9u8; 32]);
        (MemoryLedger::with_clock(program, fixed_clock), Keypair::generate())
    }

    #[tokio::test]
    async fn profile_creation_is_exists_checked() {
        let (ledger, keypair) = setup();
        let ix = instruction::create_user_profile(ledger.program(), &keypair.address());

        ledger.submit(&ix, &keypair).await.unwrap();
        let err = ledger.submit(&ix, &keypair).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountAlreadyExists));
    }

    #[tokio::test]
    async fn wrong_signer_is_unauthorized() {
        let (ledger, keypair) = setup();
        let intruder = Keypair::generate();
        let ix = instruction::create_user_profile(ledger.program(), &keypair.address());

        let err = ledger.submit(&ix, &intruder).await.unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized));
    }

    #[tokio::test]
    async fn finalize_requires_registered_storage() {
        let (ledger, keypair) = setup();
        let owner = keypair.address();
        let program = *ledger.program();
        let config = config_address(&program);

        let profile_ix = instruction::create_user_profile(&program, &owner);
        ledger.submit(&profile_ix, &keypair).await.unwrap();

        let create_ix = instruction::create_file(
            &program,
            &owner,
            &config,
            "a.bin",
            100,
            [1u8; 32],
            1,
            fixed_clock(),
        )
        .unwrap();
        ledger.submit(&create_ix, &keypair).await.unwrap();

        let record_addr = file_record_address(&program, &owner, "a.bin").unwrap();
        let finalize_ix = instruction::finalize_file(&program, &owner, &record_addr);
        let err = ledger.submit(&finalize_ix, &keypair).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Program(ProgramError::NoStorageLocation)
        ));
    }
}
