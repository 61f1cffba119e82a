//! On-disk key files.
//!
//! A key file is a small JSON document holding one ed25519 secret and its
//! derived address. Secrets are stored unencrypted with restrictive file
//! permissions; wallet-grade encrypted custody is outside this tool.

use chaindrive_client::signer::{InstructionSigner, Keypair};
use chrono::{serde::ts_seconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current on-disk key file schema version.
const KEYFILE_VERSION: u8 = 1;
const PLAINTEXT_WARNING: &str = "Key file stored without password protection";

#[derive(Debug, thiserror::Error)]
pub enum KeyfileError {
    #[error("key file already exists at {0} (use --force to overwrite)")]
    AlreadyExists(String),
    #[error("key file IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("key file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("key file holds an invalid secret key")]
    InvalidSecret,
    #[error("unsupported key file version {0}")]
    UnsupportedVersion(u8),
}

/// Serialized key file written to disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyFile {
    pub version: u8,
    pub address: String,
    pub public_key_hex: String,
    pub private_key_hex: String,
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl KeyFile {
    fn from_keypair(keypair: &Keypair) -> Self {
        Self {
            version: KEYFILE_VERSION,
            address: keypair.address().to_string(),
            public_key_hex: hex::encode(keypair.public_bytes()),
            private_key_hex: hex::encode(keypair.secret_bytes()),
            created_at: Utc::now(),
            warning: Some(PLAINTEXT_WARNING.to_string()),
        }
    }

    fn into_keypair(self) -> Result<Keypair, KeyfileError> {
        if self.version != KEYFILE_VERSION {
            return Err(KeyfileError::UnsupportedVersion(self.version));
        }
        let raw = hex::decode(&self.private_key_hex).map_err(|_| KeyfileError::InvalidSecret)?;
        let secret: [u8; 32] = raw.try_into().map_err(|_| KeyfileError::InvalidSecret)?;
        Ok(Keypair::from_secret_bytes(secret))
    }
}

/// Generate a fresh keypair and write its key file.
pub fn generate(path: &Path, force: bool) -> Result<Keypair, KeyfileError> {
    if path.exists() && !force {
        return Err(KeyfileError::AlreadyExists(path.display().to_string()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let keypair = Keypair::generate();
    let contents = serde_json::to_string_pretty(&KeyFile::from_keypair(&keypair))?;
    fs::write(path, contents)?;
    restrict_permissions(path)?;
    Ok(keypair)
}

/// Load the keypair stored at `path`.
pub fn load(path: &Path) -> Result<Keypair, KeyfileError> {
    let raw = fs::read_to_string(path)?;
    let keyfile: KeyFile = serde_json::from_str(&raw)?;
    keyfile.into_keypair()
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
