use crate::error::ProgramError;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a chaindrive address string.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("address is not valid base58")]
    InvalidBase58(#[from] bs58::decode::Error),
    #[error("address payload must be exactly {expected} bytes, got {actual}")]
    InvalidPayloadLength { expected: usize, actual: usize },
}

/// Number of raw bytes contained in an address.
pub const ADDRESS_BYTES: usize = 32;

/// Maximum byte length of a file name accepted by the program. Names are
/// part of the derivation key, so an over-length name must be rejected
/// locally before derivation rather than truncated.
pub const FILE_NAME_MAX_BYTES: usize = 50;

/// Domain separator appended to every derivation so derived addresses can
/// never collide with hashes produced elsewhere in the protocol.
const DERIVE_DOMAIN: &[u8] = b"chaindrive:pda";

/// A 32-byte ledger account address, rendered as base58 in human-readable
/// form and serialised as a string in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; ADDRESS_BYTES]);

impl Address {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    /// Attempt to decode a base58 address string into the raw bytes.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let decoded = bs58::decode(s).into_vec()?;
        let actual = decoded.len();
        let bytes: [u8; ADDRESS_BYTES] = decoded
            .try_into()
            .map_err(|_| AddressError::InvalidPayloadLength {
                expected: ADDRESS_BYTES,
                actual,
            })?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(value: [u8; ADDRESS_BYTES]) -> Self {
        Address(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

/// Derive a program account address from a namespace tag and seed material.
///
/// The derivation is SHA-256 over the length-framed tag and seeds followed
/// by the program address and a fixed domain separator. It is pure and must
/// match the algorithm the ledger program uses to validate the account
/// addresses supplied in each instruction; identical inputs always yield
/// the identical address, and any single-byte change in tag, seeds, or
/// program yields a different address.
pub fn derive_address(program: &Address, tag: &str, seeds: &[&[u8]]) -> Address {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update((tag.len() as u64).to_le_bytes());
    hasher.update(tag.as_bytes());
    for seed in seeds {
        hasher.update((seed.len() as u64).to_le_bytes());
        hasher.update(seed);
    }
    hasher.update(program.as_bytes());
    hasher.update(DERIVE_DOMAIN);
    Address(hasher.finalize().into())
}

/// Address of the singleton program configuration account.
pub fn config_address(program: &Address) -> Address {
    derive_address(program, "config", &[])
}

/// Address of the profile account for `owner`.
pub fn user_profile_address(program: &Address, owner: &Address) -> Address {
    derive_address(program, "user_profile", &[owner.as_bytes()])
}

/// Address of the file record for `(owner, file_name)`.
///
/// The name is validated before derivation: an empty name can never name a
/// record, and an over-length name would either fail program-side
/// validation or silently truncate, so both are rejected locally.
pub fn file_record_address(
    program: &Address,
    owner: &Address,
    file_name: &str,
) -> Result<Address, ProgramError> {
    if file_name.is_empty() || file_name.len() > FILE_NAME_MAX_BYTES {
        return Err(ProgramError::FileNameTooLong);
    }
    Ok(derive_address(
        program,
        "file",
        &[owner.as_bytes(), file_name.as_bytes()],
    ))
}

/// Address of the shared-access grant for `(file_record, grantee)`.
pub fn shared_access_address(
    program: &Address,
    file_record: &Address,
    grantee: &Address,
) -> Address {
    derive_address(
        program,
        "shared_access",
        &[file_record.as_bytes(), grantee.as_bytes()],
    )
}
