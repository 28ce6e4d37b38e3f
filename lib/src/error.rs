//! Error taxonomy for the verification core.

use thiserror::Error;

use crate::crypto::Hash;

/// Errors produced by the verification core.
///
/// None of these variants trigger automatic correction: every one is a
/// terminal report for the operation that raised it. `StaleRoot` is the one
/// variant a caller may reasonably downgrade to a warning, since re-fetching
/// the proof can resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CompressionError {
    /// A metadata field is missing or out of range.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    /// The sibling path length does not match the tree depth.
    #[error("invalid proof length: expected {expected} nodes, got {actual}")]
    InvalidProofLength { expected: usize, actual: usize },

    /// The leaf index does not fit in a tree of the configured depth.
    #[error("leaf index {index} out of range for a depth-{max_depth} tree")]
    IndexOutOfRange { index: u64, max_depth: u32 },

    /// More canopy levels were requested than the proof contains.
    #[error("canopy depth {canopy_depth} exceeds proof length {proof_len}")]
    CanopyDeeperThanProof { canopy_depth: u32, proof_len: usize },

    /// The recomputed root does not match the root claimed by the proof.
    #[error("proof does not reproduce claimed root {claimed}")]
    InvalidProof { claimed: Hash },

    /// The proof is self-consistent but its root is not retained by the
    /// tree's changelog. Re-fetching the proof may produce a current one.
    #[error("root {root} is not present in the tree changelog")]
    StaleRoot { root: Hash },

    /// The tree account bytes are inconsistent with the decoded header.
    #[error("corrupt tree account: {0}")]
    CorruptTreeAccount(String),
}
