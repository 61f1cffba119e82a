//! Access grant/revoke orchestration and catalog reconstruction.

use async_trait::async_trait;
use chaindrive_client::ledger::{LedgerError, LedgerRpc, MemoryLedger, TxId};
use chaindrive_client::signer::{InstructionSigner, Keypair};
use chaindrive_client::store::MemoryContentStore;
use chaindrive_client::{AccessError, DriveClient};
use chaindrive_types::record::{
    AccessLevel, FileRecord, FileStatus, LedgerRecord, SharedAccess,
};
use chaindrive_types::{Address, Instruction, ProgramError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const PROGRAM: [u8; 32] = [9u8; 32];

fn fixed_clock() -> i64 {
    1_700_000_000
}

fn future_expiry() -> i64 {
    chrono::Utc::now().timestamp() + 3_600
}

struct Harness {
    client: DriveClient,
    ledger: MemoryLedger,
    owner: Keypair,
}

fn harness() -> Harness {
    let program = Address::from_bytes(PROGRAM);
    let ledger = MemoryLedger::with_clock(program, fixed_clock);
    let client = DriveClient::new(
        program,
        Arc::new(ledger.clone()),
        Arc::new(MemoryContentStore::new()),
    );
    Harness {
        client,
        ledger,
        owner: Keypair::generate(),
    }
}

async fn publish_active_file(harness: &Harness, name: &str) -> Address {
    harness
        .client
        .publish(&harness.owner, name, vec![0xCDu8; 256])
        .await
        .unwrap()
        .file_record
}

async fn read_grant(harness: &Harness, address: &Address) -> SharedAccess {
    let blob = harness
        .ledger
        .get_account(address)
        .await
        .unwrap()
        .expect("grant exists");
    SharedAccess::decode_account(&blob).unwrap()
}

#[tokio::test]
async fn grant_and_read_back() {
    let harness = harness();
    let grantee = Keypair::generate().address();
    let file = publish_active_file(&harness, "shared.doc").await;

    let grant_address = harness
        .client
        .grant_access(&harness.owner, &file, &grantee, AccessLevel::Read, None)
        .await
        .unwrap();

    let grant = read_grant(&harness, &grant_address).await;
    assert!(grant.is_active);
    assert_eq!(grant.access_level, AccessLevel::Read);
    assert_eq!(grant.owner, *harness.owner.address().as_bytes());
    assert_eq!(grant.shared_with, *grantee.as_bytes());
    assert_eq!(grant.file_record, *file.as_bytes());
    assert_eq!(grant.expires_at, None);

    let grants = harness.client.shared_access_for_file(&file).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].address, grant_address);
}

#[tokio::test]
async fn grant_with_future_expiry_is_bounded() {
    let harness = harness();
    let grantee = Keypair::generate().address();
    let file = publish_active_file(&harness, "bounded.doc").await;
    let expires = future_expiry();

    let grant_address = harness
        .client
        .grant_access(
            &harness.owner,
            &file,
            &grantee,
            AccessLevel::Write,
            Some(expires),
        )
        .await
        .unwrap();

    let grant = read_grant(&harness, &grant_address).await;
    assert_eq!(grant.expires_at, Some(expires));
    assert!(grant.is_usable_at(expires - 1));
    assert!(!grant.is_usable_at(expires));
}

#[tokio::test]
async fn past_expiry_rejected_before_any_network_call() {
    let program = Address::from_bytes(PROGRAM);

    /// Ledger double that counts every call it receives.
    #[derive(Clone)]
    struct RecordingLedger {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LedgerRpc for RecordingLedger {
        async fn get_account(&self, _address: &Address) -> Result<Option<Vec<u8>>, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn get_program_accounts(
            &self,
            _program: &Address,
        ) -> Result<Vec<(Address, Vec<u8>)>, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn submit(
            &self,
            _instruction: &Instruction,
            _signer: &dyn InstructionSigner,
        ) -> Result<TxId, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("tx".to_string())
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let ledger = RecordingLedger {
        calls: calls.clone(),
    };
    let client = DriveClient::new(program, Arc::new(ledger), Arc::new(MemoryContentStore::new()));
    let owner = Keypair::generate();
    let file = Address::from_bytes([4u8; 32]);
    let grantee = Address::from_bytes([5u8; 32]);

    let err = client
        .grant_access(&owner, &file, &grantee, AccessLevel::Read, Some(1_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AccessError::Validation(ProgramError::InvalidExpirationTime)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "zero network calls");
}

#[tokio::test]
async fn grant_on_unfinalized_file_is_file_not_active() {
    let harness = harness();
    let grantee = Keypair::generate().address();

    // Publish, then roll the record back to Processing to model a file
    // whose finalize has not confirmed yet.
    let file = publish_active_file(&harness, "pending.doc").await;
    let blob = harness.ledger.get_account(&file).await.unwrap().unwrap();
    let mut record = FileRecord::decode_account(&blob).unwrap();
    record.status = FileStatus::Processing;
    harness
        .ledger
        .seed_account(file, record.encode_account().unwrap());

    let err = harness
        .client
        .grant_access(&harness.owner, &file, &grantee, AccessLevel::Read, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AccessError::Validation(ProgramError::FileNotActive)
    ));
}

#[tokio::test]
async fn grant_on_missing_file_is_not_found() {
    let harness = harness();
    let grantee = Keypair::generate().address();
    let missing = Address::from_bytes([42u8; 32]);

    let err = harness
        .client
        .grant_access(&harness.owner, &missing, &grantee, AccessLevel::Read, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::FileNotFound));
}

#[tokio::test]
async fn revoke_deactivates_but_keeps_the_account() {
    let harness = harness();
    let grantee = Keypair::generate().address();
    let file = publish_active_file(&harness, "revocable.doc").await;

    let grant_address = harness
        .client
        .grant_access(&harness.owner, &file, &grantee, AccessLevel::Read, None)
        .await
        .unwrap();
    harness
        .client
        .revoke_access(&harness.owner, &grant_address)
        .await
        .unwrap();

    let grant = read_grant(&harness, &grant_address).await;
    assert!(!grant.is_active);
    assert!(!grant.is_usable_at(fixed_clock()));
}

#[tokio::test]
async fn only_the_owner_may_revoke() {
    let harness = harness();
    let grantee = Keypair::generate();
    let file = publish_active_file(&harness, "protected.doc").await;

    let grant_address = harness
        .client
        .grant_access(
            &harness.owner,
            &file,
            &grantee.address(),
            AccessLevel::Read,
            None,
        )
        .await
        .unwrap();

    let err = harness
        .client
        .revoke_access(&grantee, &grant_address)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Ledger(LedgerError::Unauthorized)));

    let grant = read_grant(&harness, &grant_address).await;
    assert!(grant.is_active, "failed revoke must not deactivate");
}

#[tokio::test]
async fn visibility_toggles_round_trip() {
    let harness = harness();
    let file = publish_active_file(&harness, "toggle.doc").await;

    harness
        .client
        .set_visibility(&harness.owner, &file, true)
        .await
        .unwrap();
    let record = harness.client.read_file_record(&file).await.unwrap();
    assert!(record.is_public);

    harness
        .client
        .set_visibility(&harness.owner, &file, false)
        .await
        .unwrap();
    let record = harness.client.read_file_record(&file).await.unwrap();
    assert!(!record.is_public);
}

fn seeded_record(owner: [u8; 32], name: &str, created_at: i64) -> FileRecord {
    FileRecord {
        owner,
        file_name: name.to_string(),
        file_size: 64,
        file_hash: [0xAA; 32],
        chunk_count: 1,
        merkle_root: [0xBB; 32],
        primary_storage: "Qm123".to_string(),
        created_at,
        updated_at: created_at,
        status: FileStatus::Active,
        is_public: false,
    }
}

#[tokio::test]
async fn catalog_sorts_newest_first_and_skips_other_types() {
    let harness = harness();
    let owner_bytes = [7u8; 32];
    let owner = Address::from_bytes(owner_bytes);

    for (index, created_at) in [100i64, 300, 200].into_iter().enumerate() {
        let record = seeded_record(owner_bytes, &format!("file-{index}"), created_at);
        harness.ledger.seed_account(
            Address::from_bytes([10 + index as u8; 32]),
            record.encode_account().unwrap(),
        );
    }

    // A grant whose leading reference equals the owner bytes: passes the
    // offset pre-filter, must be skipped by the typed decode.
    let decoy_grant = SharedAccess {
        file_record: owner_bytes,
        owner: owner_bytes,
        shared_with: [8u8; 32],
        access_level: AccessLevel::Read,
        expires_at: None,
        created_at: 400,
        is_active: true,
    };
    harness.ledger.seed_account(
        Address::from_bytes([20u8; 32]),
        decoy_grant.encode_account().unwrap(),
    );

    // Garbage bytes with a matching owner prefix are skipped, not fatal.
    let mut garbage = vec![0u8; 8];
    garbage.extend_from_slice(&owner_bytes);
    garbage.extend_from_slice(&[0xFF; 4]);
    harness
        .ledger
        .seed_account(Address::from_bytes([21u8; 32]), garbage);

    // Another owner's record is filtered out.
    let other = seeded_record([6u8; 32], "other", 999);
    harness.ledger.seed_account(
        Address::from_bytes([22u8; 32]),
        other.encode_account().unwrap(),
    );

    let files = harness.client.list_files_owned_by(&owner).await.unwrap();
    let timestamps: Vec<i64> = files.iter().map(|f| f.record.created_at).collect();
    assert_eq!(timestamps, vec![300, 200, 100]);
    assert!(files.iter().all(|f| f.record.owner == owner_bytes));
}

#[tokio::test]
async fn grants_listing_skips_file_records_sharing_the_prefix() {
    let harness = harness();
    let file = Address::from_bytes([33u8; 32]);

    let grant = SharedAccess {
        file_record: *file.as_bytes(),
        owner: [1u8; 32],
        shared_with: [2u8; 32],
        access_level: AccessLevel::Admin,
        expires_at: None,
        created_at: 50,
        is_active: true,
    };
    harness.ledger.seed_account(
        Address::from_bytes([34u8; 32]),
        grant.encode_account().unwrap(),
    );

    // A file record owned by "the file's address bytes" passes the
    // pre-filter but is not a grant.
    let decoy = seeded_record(*file.as_bytes(), "decoy", 60);
    harness.ledger.seed_account(
        Address::from_bytes([35u8; 32]),
        decoy.encode_account().unwrap(),
    );

    let grants = harness.client.shared_access_for_file(&file).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].grant.access_level, AccessLevel::Admin);
}
