//! The instruction interface consumed from the on-ledger program.
//!
//! Each builder produces the exact ordered account list and signer the
//! program expects for that operation, with derived addresses computed
//! here so callers cannot supply a mismatched account. Local validation
//! mirrors the program's checks and raises the same named conditions
//! before anything is signed or submitted.

use crate::address::{file_record_address, shared_access_address, user_profile_address, Address};
use crate::error::ProgramError;
use crate::merkle;
use crate::record::{AccessLevel, STORAGE_LOCATION_MAX_BYTES};
use serde::{Deserialize, Serialize};

/// One account named by an instruction, with its access flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(address: Address) -> Self {
        Self {
            address,
            is_signer: false,
            is_writable: true,
        }
    }

    pub fn readonly(address: Address) -> Self {
        Self {
            address,
            is_signer: false,
            is_writable: false,
        }
    }

    pub fn signer(address: Address) -> Self {
        Self {
            address,
            is_signer: true,
            is_writable: false,
        }
    }

    pub fn signer_writable(address: Address) -> Self {
        Self {
            address,
            is_signer: true,
            is_writable: true,
        }
    }
}

/// Operation payloads accepted by the program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionData {
    CreateUserProfile,
    CreateFile {
        file_name: String,
        file_size: u64,
        file_hash: [u8; 32],
        chunk_count: u32,
        timestamp: i64,
    },
    RegisterStorage {
        primary_storage: String,
        merkle_root: [u8; 32],
    },
    FinalizeFile,
    GrantAccess {
        shared_with: Address,
        access_level: AccessLevel,
        expires_at: Option<i64>,
    },
    RevokeAccess,
    MakePublic,
    MakePrivate,
}

impl InstructionData {
    /// Operation name, as used in logs and RPC payloads.
    pub fn name(&self) -> &'static str {
        match self {
            InstructionData::CreateUserProfile => "create_user_profile",
            InstructionData::CreateFile { .. } => "create_file",
            InstructionData::RegisterStorage { .. } => "register_storage",
            InstructionData::FinalizeFile => "finalize_file",
            InstructionData::GrantAccess { .. } => "grant_access",
            InstructionData::RevokeAccess => "revoke_access",
            InstructionData::MakePublic => "make_public",
            InstructionData::MakePrivate => "make_private",
        }
    }
}

/// A fully specified, not-yet-signed instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub program: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: InstructionData,
}

impl Instruction {
    /// The account expected to sign this instruction.
    pub fn signer(&self) -> Option<&Address> {
        self.accounts
            .iter()
            .find(|meta| meta.is_signer)
            .map(|meta| &meta.address)
    }

    /// Canonical byte encoding covered by the signature: program address,
    /// every account with its flags in order, then the bincoded payload.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(self.program.as_bytes());
        for meta in &self.accounts {
            payload.extend_from_slice(meta.address.as_bytes());
            payload.push(meta.is_signer as u8);
            payload.push(meta.is_writable as u8);
        }
        payload.extend(bincode::serialize(&self.data).expect("instruction data serializes"));
        payload
    }
}

/// Build the lazy profile-creation instruction.
pub fn create_user_profile(program: &Address, user: &Address) -> Instruction {
    let profile = user_profile_address(program, user);
    Instruction {
        program: *program,
        accounts: vec![AccountMeta::writable(profile), AccountMeta::signer_writable(*user)],
        data: InstructionData::CreateUserProfile,
    }
}

/// Build the file-record creation instruction.
///
/// Rejects locally what the program would reject: an over-length or empty
/// name, a zero size, or a chunk count inconsistent with the size.
#[allow(clippy::too_many_arguments)]
pub fn create_file(
    program: &Address,
    owner: &Address,
    config: &Address,
    file_name: &str,
    file_size: u64,
    file_hash: [u8; 32],
    chunk_count: u32,
    timestamp: i64,
) -> Result<Instruction, ProgramError> {
    let file_record = file_record_address(program, owner, file_name)?;
    if chunk_count != merkle::chunk_count(file_size)? {
        return Err(ProgramError::InvalidChunkCount);
    }

    let profile = user_profile_address(program, owner);
    Ok(Instruction {
        program: *program,
        accounts: vec![
            AccountMeta::writable(file_record),
            AccountMeta::writable(*config),
            AccountMeta::writable(profile),
            AccountMeta::signer_writable(*owner),
        ],
        data: InstructionData::CreateFile {
            file_name: file_name.to_string(),
            file_size,
            file_hash,
            chunk_count,
            timestamp,
        },
    })
}

/// Build the storage-registration instruction.
pub fn register_storage(
    program: &Address,
    owner: &Address,
    file_record: &Address,
    primary_storage: &str,
    merkle_root: [u8; 32],
) -> Result<Instruction, ProgramError> {
    if primary_storage.is_empty() {
        return Err(ProgramError::StorageLocationEmpty);
    }
    if primary_storage.len() > STORAGE_LOCATION_MAX_BYTES {
        return Err(ProgramError::StorageLocationTooLong);
    }

    Ok(Instruction {
        program: *program,
        accounts: vec![
            AccountMeta::writable(*file_record),
            AccountMeta::signer(*owner),
        ],
        data: InstructionData::RegisterStorage {
            primary_storage: primary_storage.to_string(),
            merkle_root,
        },
    })
}

/// Build the finalize instruction, the publish commit point.
pub fn finalize_file(program: &Address, owner: &Address, file_record: &Address) -> Instruction {
    Instruction {
        program: *program,
        accounts: vec![
            AccountMeta::writable(*file_record),
            AccountMeta::signer(*owner),
        ],
        data: InstructionData::FinalizeFile,
    }
}

/// Build the access-grant instruction. The grant account address is
/// derived from the file record and grantee.
pub fn grant_access(
    program: &Address,
    owner: &Address,
    file_record: &Address,
    shared_with: &Address,
    access_level: AccessLevel,
    expires_at: Option<i64>,
) -> Instruction {
    let grant = shared_access_address(program, file_record, shared_with);
    Instruction {
        program: *program,
        accounts: vec![
            AccountMeta::writable(grant),
            AccountMeta::readonly(*file_record),
            AccountMeta::signer_writable(*owner),
        ],
        data: InstructionData::GrantAccess {
            shared_with: *shared_with,
            access_level,
            expires_at,
        },
    }
}

/// Build the revoke instruction. Only the file owner's signature is valid.
pub fn revoke_access(
    program: &Address,
    owner: &Address,
    file_record: &Address,
    shared_access: &Address,
) -> Instruction {
    Instruction {
        program: *program,
        accounts: vec![
            AccountMeta::writable(*shared_access),
            AccountMeta::readonly(*file_record),
            AccountMeta::signer(*owner),
        ],
        data: InstructionData::RevokeAccess,
    }
}

/// Build the visibility-toggle instruction.
pub fn set_visibility(
    program: &Address,
    owner: &Address,
    file_record: &Address,
    make_public: bool,
) -> Instruction {
    Instruction {
        program: *program,
        accounts: vec![
            AccountMeta::writable(*file_record),
            AccountMeta::signer(*owner),
        ],
        data: if make_public {
            InstructionData::MakePublic
        } else {
            InstructionData::MakePrivate
        },
    }
}
