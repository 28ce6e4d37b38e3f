//! Sibling paths and canopy truncation.
//!
//! Two proof shapes exist and must never be mixed up. The full [`ProofPath`]
//! carries every sibling from the leaf level to just below the root and is
//! what client-side verification folds over. The [`TruncatedProof`] has the
//! canopy levels removed and is the only shape that may accompany a
//! state-changing instruction: the canopy's nodes are already cached inside
//! the tree account, and resupplying them makes the on-chain recomputation
//! diverge. Keeping the two as separate types makes the mix-up a compile
//! error instead of a rejected transaction.

use serde::{Deserialize, Serialize};

use crate::crypto::Hash;
use crate::error::CompressionError;

/// The complete ordered sibling list for one leaf, leaf level first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProofPath(Vec<Hash>);

impl ProofPath {
    pub fn new(nodes: Vec<Hash>) -> Self {
        ProofPath(nodes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hash> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Hash] {
        &self.0
    }

    /// Drop the `canopy_depth` entries closest to the root.
    ///
    /// With a zero canopy the result carries the full path unchanged.
    pub fn truncate(&self, canopy_depth: u32) -> Result<TruncatedProof, CompressionError> {
        let canopy = canopy_depth as usize;
        if canopy > self.0.len() {
            return Err(CompressionError::CanopyDeeperThanProof {
                canopy_depth,
                proof_len: self.0.len(),
            });
        }
        let keep = self.0.len() - canopy;
        Ok(TruncatedProof(self.0[..keep].to_vec()))
    }
}

impl From<Vec<Hash>> for ProofPath {
    fn from(nodes: Vec<Hash>) -> Self {
        ProofPath(nodes)
    }
}

impl FromIterator<Hash> for ProofPath {
    fn from_iter<I: IntoIterator<Item = Hash>>(iter: I) -> Self {
        ProofPath(iter.into_iter().collect())
    }
}

/// A canopy-trimmed sibling list, ready to become instruction accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncatedProof(Vec<Hash>);

impl TruncatedProof {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hash> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Hash] {
        &self.0
    }
}
