//! The multi-step file publish orchestration.
//!
//! Publishing is five independent ledger-visible actions that must read as
//! one logical operation: upload the bytes, ensure the owner's profile,
//! create the file record, register the storage location, finalize. The
//! sequence is modelled as an explicit resumable state machine because the
//! ledger offers no cross-step atomicity: every step is confirmed before
//! the next starts, a failure reports the step it happened at, and a
//! caller can re-run the same flow to continue from that step. Nothing is
//! rolled back on abandonment.

use crate::ledger::LedgerError;
use crate::signer::InstructionSigner;
use crate::store::StoreError;
use crate::DriveClient;
use chaindrive_types::address::{config_address, file_record_address, user_profile_address};
use chaindrive_types::record::{Config, FileRecord, FileStatus, LedgerRecord};
use chaindrive_types::{instruction, merkle, Address, ChunkTree, ProgramError};
use tracing::{debug, info};

/// Steps of the publish sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    /// Local validation and artifact computation. Zero side effects.
    Prepare,
    /// Content store upload. No ledger state has been touched yet.
    UploadContent,
    /// Lazy profile creation, idempotent on existence.
    EnsureProfile,
    /// File record creation; where duplicate names are rejected.
    CreateRecord,
    /// Content identifier and integrity root registration.
    RegisterStorage,
    /// The commit point. The file is published once this confirms.
    Finalize,
}

impl PublishStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStep::Prepare => "prepare",
            PublishStep::UploadContent => "upload_content",
            PublishStep::EnsureProfile => "ensure_profile",
            PublishStep::CreateRecord => "create_record",
            PublishStep::RegisterStorage => "register_storage",
            PublishStep::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for PublishStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong inside a step.
#[derive(Debug, thiserror::Error)]
pub enum PublishErrorKind {
    #[error("{0}")]
    Validation(#[from] ProgramError),
    #[error("a file with this name already exists for this owner")]
    FileAlreadyExists,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(LedgerError),
}

/// Publish failure, carrying the step it occurred at so the caller can
/// resume the same flow.
#[derive(Debug, thiserror::Error)]
#[error("publish failed at step {step}: {kind}")]
pub struct PublishError {
    pub step: PublishStep,
    pub kind: PublishErrorKind,
}

impl PublishError {
    fn at(step: PublishStep, kind: impl Into<PublishErrorKind>) -> Self {
        Self {
            step,
            kind: kind.into(),
        }
    }
}

/// Resumable publish state: the precomputed artifacts plus the next step
/// to execute. Steps only advance after their confirmation, so re-running
/// a failed flow continues exactly where it stopped, without re-uploading
/// content that already has an identifier.
#[derive(Debug)]
pub struct PublishFlow {
    owner: Address,
    file_record: Address,
    file_name: String,
    content: Vec<u8>,
    file_size: u64,
    file_hash: [u8; 32],
    chunk_count: u32,
    merkle_root: [u8; 32],
    created_at: i64,
    content_id: Option<String>,
    next: PublishStep,
}

impl PublishFlow {
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Address the file record will live at.
    pub fn file_record(&self) -> &Address {
        &self.file_record
    }

    pub fn next_step(&self) -> PublishStep {
        self.next
    }

    /// Content identifier, available once the upload step confirmed.
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }
}

/// Successful publish summary.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub file_record: Address,
    pub content_id: String,
    pub file_size: u64,
    pub file_hash: [u8; 32],
    pub chunk_count: u32,
    pub merkle_root: [u8; 32],
    pub gateway_url: String,
}

impl DriveClient {
    /// Validate inputs and compute the publish artifacts. Local-only apart
    /// from an optional read of the program config to enforce the size cap
    /// before any bytes are uploaded.
    pub async fn begin_publish(
        &self,
        owner: &Address,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<PublishFlow, PublishError> {
        let step = PublishStep::Prepare;
        let file_record = file_record_address(&self.program, owner, file_name)
            .map_err(|err| PublishError::at(step, err))?;

        let file_size = content.len() as u64;
        let chunk_count =
            merkle::chunk_count(file_size).map_err(|err| PublishError::at(step, err))?;

        let config = self
            .read_config()
            .await
            .map_err(|err| PublishError::at(step, PublishErrorKind::Ledger(err)))?;
        if let Some(config) = config {
            if file_size > config.max_file_size {
                return Err(PublishError::at(step, ProgramError::InvalidFileSize));
            }
        }

        let file_hash = merkle::content_hash(&content);
        let tree = ChunkTree::from_content(&content)
            .map_err(|_| PublishError::at(step, ProgramError::InvalidFileSize))?;

        Ok(PublishFlow {
            owner: *owner,
            file_record,
            file_name: file_name.to_string(),
            content,
            file_size,
            file_hash,
            chunk_count,
            merkle_root: tree.root(),
            created_at: chrono::Utc::now().timestamp(),
            content_id: None,
            next: PublishStep::UploadContent,
        })
    }

    /// Execute the flow from its next step to completion. Safe to call
    /// again on the same flow after a failure.
    pub async fn run_publish(
        &self,
        flow: &mut PublishFlow,
        signer: &dyn InstructionSigner,
    ) -> Result<PublishReceipt, PublishError> {
        if signer.address() != flow.owner {
            return Err(PublishError::at(
                flow.next,
                PublishErrorKind::Ledger(LedgerError::Unauthorized),
            ));
        }

        loop {
            match flow.next {
                PublishStep::Prepare => {
                    // begin_publish already ran; nothing to redo here.
                    flow.next = PublishStep::UploadContent;
                }

                PublishStep::UploadContent => {
                    let content_id = self
                        .store
                        .upload(&flow.content)
                        .await
                        .map_err(|err| PublishError::at(PublishStep::UploadContent, err))?;
                    debug!(file = %flow.file_name, %content_id, "content stored");
                    flow.content_id = Some(content_id);
                    flow.next = PublishStep::EnsureProfile;
                }

                PublishStep::EnsureProfile => {
                    self.ensure_profile(flow, signer).await?;
                    flow.next = PublishStep::CreateRecord;
                }

                PublishStep::CreateRecord => {
                    self.create_record(flow, signer).await?;
                    flow.next = PublishStep::RegisterStorage;
                }

                PublishStep::RegisterStorage => {
                    let step = PublishStep::RegisterStorage;
                    let content_id = flow
                        .content_id
                        .clone()
                        .ok_or_else(|| PublishError::at(step, ProgramError::NoStorageLocation))?;
                    let ix = instruction::register_storage(
                        &self.program,
                        &flow.owner,
                        &flow.file_record,
                        &content_id,
                        flow.merkle_root,
                    )
                    .map_err(|err| PublishError::at(step, err))?;
                    self.ledger
                        .submit(&ix, signer)
                        .await
                        .map_err(|err| PublishError::at(step, PublishErrorKind::Ledger(err)))?;
                    flow.next = PublishStep::Finalize;
                }

                PublishStep::Finalize => {
                    let step = PublishStep::Finalize;
                    let ix =
                        instruction::finalize_file(&self.program, &flow.owner, &flow.file_record);
                    self.ledger
                        .submit(&ix, signer)
                        .await
                        .map_err(|err| PublishError::at(step, PublishErrorKind::Ledger(err)))?;

                    let content_id = flow.content_id.clone().unwrap_or_default();
                    info!(
                        file = %flow.file_name,
                        record = %flow.file_record,
                        "file published"
                    );
                    return Ok(PublishReceipt {
                        file_record: flow.file_record,
                        content_id: content_id.clone(),
                        file_size: flow.file_size,
                        file_hash: flow.file_hash,
                        chunk_count: flow.chunk_count,
                        merkle_root: flow.merkle_root,
                        gateway_url: self.store.gateway_url(&content_id),
                    });
                }
            }
        }
    }

    /// Run the whole publish sequence for `signer`'s identity.
    pub async fn publish(
        &self,
        signer: &dyn InstructionSigner,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<PublishReceipt, PublishError> {
        let owner = signer.address();
        let mut flow = self.begin_publish(&owner, file_name, content).await?;
        self.run_publish(&mut flow, signer).await
    }

    async fn ensure_profile(
        &self,
        flow: &PublishFlow,
        signer: &dyn InstructionSigner,
    ) -> Result<(), PublishError> {
        let step = PublishStep::EnsureProfile;
        let profile = user_profile_address(&self.program, &flow.owner);
        let existing = self
            .ledger
            .get_account(&profile)
            .await
            .map_err(|err| PublishError::at(step, PublishErrorKind::Ledger(err)))?;
        if existing.is_some() {
            return Ok(());
        }

        let ix = instruction::create_user_profile(&self.program, &flow.owner);
        match self.ledger.submit(&ix, signer).await {
            Ok(_) => {
                info!(owner = %flow.owner, "user profile created");
                Ok(())
            }
            // A concurrent publish by the same owner won the race; that is
            // success, not failure.
            Err(LedgerError::AccountAlreadyExists) => {
                debug!(owner = %flow.owner, "profile created concurrently");
                Ok(())
            }
            Err(err) => Err(PublishError::at(step, PublishErrorKind::Ledger(err))),
        }
    }

    async fn create_record(
        &self,
        flow: &PublishFlow,
        signer: &dyn InstructionSigner,
    ) -> Result<(), PublishError> {
        let step = PublishStep::CreateRecord;
        let ix = instruction::create_file(
            &self.program,
            &flow.owner,
            &config_address(&self.program),
            &flow.file_name,
            flow.file_size,
            flow.file_hash,
            flow.chunk_count,
            flow.created_at,
        )
        .map_err(|err| PublishError::at(step, err))?;

        match self.ledger.submit(&ix, signer).await {
            Ok(_) => Ok(()),
            Err(LedgerError::AccountAlreadyExists) => {
                // Distinguish "this very flow's earlier attempt landed"
                // from "another live file holds this name". Only an
                // unfinalized record carrying our exact content hash is
                // ours to continue.
                match self.read_unfinalized_own_record(flow).await {
                    Some(record) if record.file_hash == flow.file_hash => {
                        debug!(file = %flow.file_name, "record already created, resuming");
                        Ok(())
                    }
                    _ => Err(PublishError::at(step, PublishErrorKind::FileAlreadyExists)),
                }
            }
            Err(err) => Err(PublishError::at(step, PublishErrorKind::Ledger(err))),
        }
    }

    /// Read the program configuration, if its singleton account exists and
    /// decodes. Used to enforce the size cap before uploading anything.
    pub async fn read_config(&self) -> Result<Option<Config>, LedgerError> {
        let blob = self
            .ledger
            .get_account(&config_address(&self.program))
            .await?;
        Ok(blob.and_then(|blob| Config::decode_account(&blob).ok()))
    }

    async fn read_unfinalized_own_record(&self, flow: &PublishFlow) -> Option<FileRecord> {
        let blob = self.ledger.get_account(&flow.file_record).await.ok()??;
        let record = FileRecord::decode_account(&blob).ok()?;
        let owned = record.owner == *flow.owner.as_bytes();
        let unfinalized = matches!(record.status, FileStatus::Uploading | FileStatus::Processing);
        (owned && unfinalized).then_some(record)
    }
}
