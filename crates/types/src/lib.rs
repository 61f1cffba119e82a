//! Chaindrive core types
//!
//! Data layer shared by the client orchestration and the CLI: ledger
//! addresses and their deterministic derivation, the four ledger record
//! types with their account-blob codec, the instruction set consumed from
//! the on-ledger program, the program's error code table, and content
//! hashing / chunk merkle trees.
//!
//! Everything in this crate is pure: no I/O, no async, no ambient state.

pub mod address;
pub mod error;
pub mod instruction;
pub mod merkle;
pub mod record;

pub use address::{
    config_address, derive_address, file_record_address, shared_access_address,
    user_profile_address, Address, AddressError, FILE_NAME_MAX_BYTES,
};
pub use error::ProgramError;
pub use instruction::{AccountMeta, Instruction, InstructionData};
pub use merkle::{chunk_count, content_hash, ChunkProof, ChunkTree, MerkleError, CHUNK_SIZE};
pub use record::{
    AccessLevel, Config, FileRecord, FileStatus, LedgerRecord, RecordError, SharedAccess,
    UserProfile, STORAGE_LOCATION_MAX_BYTES,
};
