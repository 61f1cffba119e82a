//! Content hashing and chunk integrity trees.
//!
//! A published file is identified by the SHA-256 hash of its full content
//! and by the root of a merkle tree built over the SHA-256 hashes of its
//! fixed-size chunks. The chunk layout (1 MiB) matches what the program
//! records as `chunk_count`, so the root registered on the ledger is a
//! genuine commitment to the stored bytes, not a placeholder.

use crate::error::ProgramError;
use sha2::{Digest, Sha256};

/// Fixed chunk size used for chunk counting and tree construction.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Merkle tree error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MerkleError {
    #[error("cannot build a tree over empty content")]
    EmptyContent,
    #[error("leaf index out of range")]
    InvalidIndex,
}

/// SHA-256 hash of the full file content.
pub fn content_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Number of fixed-size chunks the content occupies.
///
/// Zero-byte files are rejected with the program's own condition, and a
/// size whose chunk count overflows `u32` can never be registered.
pub fn chunk_count(file_size: u64) -> Result<u32, ProgramError> {
    if file_size == 0 {
        return Err(ProgramError::InvalidFileSize);
    }
    let chunks = file_size.div_ceil(CHUNK_SIZE as u64);
    u32::try_from(chunks).map_err(|_| ProgramError::InvalidChunkCount)
}

/// Inclusion proof for a single chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkProof {
    pub leaf_index: usize,
    pub leaf_hash: [u8; 32],
    pub path: Vec<[u8; 32]>,
}

/// Merkle tree over chunk hashes.
///
/// Levels are stored leaf-first; an odd node at any level is paired with
/// itself. A single-chunk file's root is its chunk hash.
#[derive(Debug, Clone)]
pub struct ChunkTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl ChunkTree {
    /// Chunk the content and build the tree over the chunk hashes.
    pub fn from_content(bytes: &[u8]) -> Result<Self, MerkleError> {
        if bytes.is_empty() {
            return Err(MerkleError::EmptyContent);
        }
        let leaves = bytes
            .chunks(CHUNK_SIZE)
            .map(|chunk| Sha256::digest(chunk).into())
            .collect();
        Self::from_leaves(leaves)
    }

    /// Build the tree from precomputed chunk hashes.
    pub fn from_leaves(leaves: Vec<[u8; 32]>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyContent);
        }

        let mut levels = vec![leaves];
        while levels.last().expect("nonempty").len() > 1 {
            let current = levels.last().expect("nonempty");
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                next.push(hash_pair(left, right));
            }
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// The tree root.
    pub fn root(&self) -> [u8; 32] {
        self.levels.last().expect("nonempty")[0]
    }

    /// Number of chunk leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Generate an inclusion proof for the chunk at `leaf_index`.
    pub fn proof(&self, leaf_index: usize) -> Result<ChunkProof, MerkleError> {
        if leaf_index >= self.leaf_count() {
            return Err(MerkleError::InvalidIndex);
        }

        let mut path = Vec::new();
        let mut index = leaf_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = index ^ 1;
            // An odd trailing node is paired with itself.
            let sibling = level.get(sibling_index).unwrap_or(&level[index]);
            path.push(*sibling);
            index /= 2;
        }

        Ok(ChunkProof {
            leaf_index,
            leaf_hash: self.levels[0][leaf_index],
            path,
        })
    }

    /// Verify an inclusion proof against a tree root.
    pub fn verify_proof(root: &[u8; 32], proof: &ChunkProof) -> bool {
        let mut hash = proof.leaf_hash;
        let mut index = proof.leaf_index;
        for sibling in &proof.path {
            hash = if index % 2 == 0 {
                hash_pair(&hash, sibling)
            } else {
                hash_pair(sibling, &hash)
            };
            index /= 2;
        }
        hash == *root
    }
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_matches_known_vector() {
        let hash = content_hash(b"abc");
        assert_eq!(
            hex::encode(hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn chunk_count_is_ceiling_division() {
        assert_eq!(chunk_count(1).unwrap(), 1);
        assert_eq!(chunk_count(CHUNK_SIZE as u64).unwrap(), 1);
        assert_eq!(chunk_count(CHUNK_SIZE as u64 + 1).unwrap(), 2);
        assert_eq!(chunk_count(5 * 1024 * 1024).unwrap(), 5);
    }

    #[test]
    fn zero_size_is_invalid() {
        assert_eq!(chunk_count(0), Err(ProgramError::InvalidFileSize));
    }

    #[test]
    fn single_chunk_root_is_the_chunk_hash() {
        let content = vec![0xAAu8; 1000];
        let tree = ChunkTree::from_content(&content).unwrap();
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.root(), <[u8; 32]>::from(Sha256::digest(&content)));
    }

    #[test]
    fn root_is_deterministic_and_content_sensitive() {
        let mut content = vec![0u8; 3 * CHUNK_SIZE + 17];
        let tree_a = ChunkTree::from_content(&content).unwrap();
        let tree_b = ChunkTree::from_content(&content).unwrap();
        assert_eq!(tree_a.root(), tree_b.root());
        assert_ne!(tree_a.root(), [0u8; 32]);

        // Flip one byte in the last chunk.
        let last = content.len() - 1;
        content[last] ^= 1;
        let tree_c = ChunkTree::from_content(&content).unwrap();
        assert_ne!(tree_a.root(), tree_c.root());
    }

    #[test]
    fn empty_content_rejected() {
        assert_eq!(
            ChunkTree::from_content(&[]).unwrap_err(),
            MerkleError::EmptyContent
        );
    }

    #[test]
    fn proofs_verify_for_every_leaf() {
        // Odd leaf count exercises the self-paired trailing node.
        let leaves: Vec<[u8; 32]> = (0u8..5).map(|i| [i; 32]).collect();
        let tree = ChunkTree::from_leaves(leaves).unwrap();
        let root = tree.root();

        for index in 0..tree.leaf_count() {
            let proof = tree.proof(index).unwrap();
            assert!(ChunkTree::verify_proof(&root, &proof), "leaf {index}");
        }
    }

    #[test]
    fn tampered_proof_fails() {
        let leaves: Vec<[u8; 32]> = (0u8..4).map(|i| [i; 32]).collect();
        let tree = ChunkTree::from_leaves(leaves).unwrap();
        let root = tree.root();

        let mut proof = tree.proof(2).unwrap();
        proof.leaf_hash[0] ^= 1;
        assert!(!ChunkTree::verify_proof(&root, &proof));

        let mut proof = tree.proof(2).unwrap();
        proof.path[0][0] ^= 1;
        assert!(!ChunkTree::verify_proof(&root, &proof));
    }

    #[test]
    fn out_of_range_proof_rejected() {
        let tree = ChunkTree::from_leaves(vec![[1u8; 32]]).unwrap();
        assert_eq!(tree.proof(1).unwrap_err(), MerkleError::InvalidIndex);
    }
}
