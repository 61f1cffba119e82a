//! Chaindrive client orchestration
//!
//! Sequences the independent ledger-account mutations behind "publish a
//! file" into one resumable operation, drives access grants and
//! revocations, and reconstructs per-owner catalogs from raw program
//! accounts. The ledger and the content store are consumed through narrow
//! trait seams so both can be substituted in tests.

pub mod access;
pub mod catalog;
pub mod config;
pub mod ledger;
pub mod publish;
pub mod signer;
pub mod store;

pub use access::{validate_expiration, AccessError};
pub use catalog::{CatalogError, FileGrant, OwnedFile};
pub use config::{ClientConfig, ConfigError};
pub use ledger::{HttpLedgerClient, LedgerError, LedgerRpc, MemoryLedger, TxId};
pub use publish::{PublishError, PublishErrorKind, PublishFlow, PublishReceipt, PublishStep};
pub use signer::{verify_signature, InstructionSigner, Keypair};
pub use store::{ContentStore, HttpContentStore, MemoryContentStore, StoreError};

use chaindrive_types::Address;
use std::sync::Arc;

/// Failure while wiring up the HTTP clients from a configuration.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Client facade over one program deployment.
///
/// Holds the program address and the two external-service seams; every
/// orchestrated operation (publish, grant, revoke, visibility, catalog
/// scans) hangs off this type. Cloning is cheap and shares the clients.
#[derive(Clone)]
pub struct DriveClient {
    pub(crate) program: Address,
    pub(crate) ledger: Arc<dyn LedgerRpc>,
    pub(crate) store: Arc<dyn ContentStore>,
}

impl DriveClient {
    /// Assemble a client from explicit collaborators.
    pub fn new(program: Address, ledger: Arc<dyn LedgerRpc>, store: Arc<dyn ContentStore>) -> Self {
        Self {
            program,
            ledger,
            store,
        }
    }

    /// Wire up HTTP clients from a configuration.
    pub fn connect(config: &ClientConfig) -> Result<Self, SetupError> {
        let ledger = HttpLedgerClient::new(&config.rpc_url)?;
        let store = HttpContentStore::new(
            &config.store_endpoint,
            config.store_api_key.clone(),
            config.gateway_base.clone(),
        )?;
        Ok(Self::new(config.program, Arc::new(ledger), Arc::new(store)))
    }

    pub fn program(&self) -> &Address {
        &self.program
    }

    /// Public gateway URL for a stored content identifier.
    pub fn gateway_url(&self, content_id: &str) -> String {
        self.store.gateway_url(content_id)
    }
}
