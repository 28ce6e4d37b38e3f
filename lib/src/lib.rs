//! Client-side verification for compressed assets committed to concurrent
//! Merkle trees.
//!
//! An indexing RPC service reports what a leaf looks like and hands out a
//! sibling path for it; nothing forces that service to be honest or fresh.
//! This crate rebuilds the trust chain locally: recompute the leaf's
//! content and creator hashes from its metadata, fold the sibling path back
//! to a root, and accept the proof only if that root is still retained by
//! the on-chain tree's changelog. It also prepares the canopy-truncated
//! path a state-changing instruction needs, which is deliberately a
//! different type from the full path used for local verification.

pub mod crypto;
pub mod error;
pub mod leaf;
pub mod merkle_proof;
pub mod proof_path;
pub mod tree_account;

pub use crypto::{hash_pair, keccak256, keccakv, Hash, ParseHexError, Pubkey};
pub use error::CompressionError;
pub use leaf::{
    hash_creators, hash_metadata, Collection, Creator, LeafSchema, MetadataArgs,
    TokenProgramVersion, TokenStandard, UseMethod, Uses,
};
pub use merkle_proof::{compute_root, verify_proof, MerkleProof};
pub use proof_path::{ProofPath, TruncatedProof};
pub use tree_account::{
    Changelog, ChangelogEntry, ConcurrentTreeAccount, RootStatus, VerificationResult,
};
