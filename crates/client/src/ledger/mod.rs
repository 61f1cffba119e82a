//! Ledger client seam.
//!
//! The ledger is an external service consumed through a narrow interface:
//! read one account, scan the program's accounts, submit one signed
//! instruction and wait for confirmation. `submit` returning `Ok` means
//! confirmed, not merely accepted; orchestration sequencing relies on that.

mod http;
mod memory;

pub use http::HttpLedgerClient;
pub use memory::MemoryLedger;

use crate::signer::InstructionSigner;
use async_trait::async_trait;
use chaindrive_types::{Address, Instruction, ProgramError};

/// Identifier of a confirmed ledger transaction.
pub type TxId = String;

/// Ledger-side failure, mapped to a named condition.
///
/// `StateConflict` marks a concurrent-mutation race that is safe to retry
/// with freshly read state; the client never resubmits automatically.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("program rejected the instruction: {0}")]
    Program(#[from] ProgramError),
    #[error("account already exists")]
    AccountAlreadyExists,
    #[error("account not found")]
    AccountNotFound,
    #[error("signature does not authorize this mutation")]
    Unauthorized,
    #[error("instruction names an unexpected account: {0}")]
    AccountMismatch(String),
    #[error("concurrent mutation conflict, retry with fresh state")]
    StateConflict,
    #[error("invalid ledger RPC URL: {0}")]
    InvalidBaseUrl(String),
    #[error("ledger rpc failed (status {status}): {message}")]
    Rpc { status: u16, message: String },
    #[error("internal ledger error: {0}")]
    Internal(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client interface to the ledger.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Read one account's raw data, `None` if the account does not exist.
    async fn get_account(&self, address: &Address) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Snapshot of all accounts owned by `program`. A fresh scan is
    /// required to observe later ledger changes.
    async fn get_program_accounts(
        &self,
        program: &Address,
    ) -> Result<Vec<(Address, Vec<u8>)>, LedgerError>;

    /// Sign, submit, and await confirmation of one instruction.
    async fn submit(
        &self,
        instruction: &Instruction,
        signer: &dyn InstructionSigner,
    ) -> Result<TxId, LedgerError>;
}
