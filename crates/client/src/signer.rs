//! Instruction signing.
//!
//! The ledger authorizes every mutating instruction by the signature of the
//! account it names as signer. The orchestration layer only needs the seam:
//! an address and a detached signature over the instruction's canonical
//! bytes. Hardware or remote wallets can implement the same trait.

use chaindrive_types::Address;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

/// Signing seam consumed by the ledger clients.
pub trait InstructionSigner: Send + Sync {
    /// The ledger identity this signer controls.
    fn address(&self) -> Address;

    /// Produce a detached signature over `message`.
    fn sign(&self, message: &[u8]) -> [u8; 64];
}

/// In-process ed25519 keypair.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstruct a keypair from its 32-byte secret.
    pub fn from_secret_bytes(secret: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&secret),
        }
    }

    /// The 32-byte secret, for keyfile storage.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    /// The public verifying key bytes.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl InstructionSigner for Keypair {
    fn address(&self) -> Address {
        Address::from_bytes(self.public_bytes())
    }

    fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

/// Verify a detached signature against the signer's address bytes.
pub fn verify_signature(address: &Address, message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(address.as_bytes()) else {
        return false;
    };
    key.verify_strict(message, &Signature::from_bytes(signature))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let keypair = Keypair::generate();
        let message = b"canonical instruction bytes";
        let signature = keypair.sign(message);
        assert!(verify_signature(&keypair.address(), message, &signature));
        assert!(!verify_signature(&keypair.address(), b"other bytes", &signature));
    }

    #[test]
    fn rejects_wrong_signer() {
        let keypair = Keypair::generate();
        let other = Keypair::generate();
        let signature = keypair.sign(b"payload");
        assert!(!verify_signature(&other.address(), b"payload", &signature));
    }

    #[test]
    fn secret_roundtrip_preserves_address() {
        let keypair = Keypair::generate();
        let restored = Keypair::from_secret_bytes(keypair.secret_bytes());
        assert_eq!(keypair.address(), restored.address());
    }
}
