//! Merkle proof verification.
//!
//! Reconstructs a tree root from a leaf hash, the leaf's index, and its
//! ordered sibling path, and compares it against an expected root. At each
//! level the corresponding bit of the leaf index picks the operand order:
//! bit 0 means the running hash is the left operand, bit 1 the right. The
//! whole module is pure computation over its inputs and is safe to call
//! concurrently from any number of callers.

use crate::crypto::{hash_pair, Hash};
use crate::error::CompressionError;
use crate::proof_path::ProofPath;

/// A fetched proof bundle: the claimed root, the leaf hash, the leaf's
/// index, and the full sibling path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub root: Hash,
    pub leaf: Hash,
    pub leaf_index: u64,
    pub path: ProofPath,
}

/// Fold a leaf hash up its sibling path and return the resulting root.
///
/// # Arguments
/// * `leaf` - Hash of the leaf being proven
/// * `leaf_index` - Position of the leaf within the tree
/// * `path` - Ordered sibling list, leaf level first
///
/// # Returns
/// * The root implied by the leaf and path
pub fn compute_root(leaf: Hash, leaf_index: u64, path: &ProofPath) -> Hash {
    let mut node = leaf;
    for (level, sibling) in path.iter().enumerate() {
        node = if (leaf_index >> level) & 1 == 0 {
            hash_pair(&node, sibling)
        } else {
            hash_pair(sibling, &node)
        };
    }
    node
}

/// Verify a sibling path against an expected root.
///
/// The path length must equal the tree depth exactly; a short or long path
/// is rejected rather than truncated or padded. Returns `Ok(true)` only on
/// an exact root match.
pub fn verify_proof(
    leaf: Hash,
    leaf_index: u64,
    path: &ProofPath,
    expected_root: Hash,
    max_depth: u32,
) -> Result<bool, CompressionError> {
    if path.len() != max_depth as usize {
        return Err(CompressionError::InvalidProofLength {
            expected: max_depth as usize,
            actual: path.len(),
        });
    }
    if max_depth < u64::BITS && leaf_index >> max_depth != 0 {
        return Err(CompressionError::IndexOutOfRange {
            index: leaf_index,
            max_depth,
        });
    }

    Ok(compute_root(leaf, leaf_index, path) == expected_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak256;

    /// Build a complete depth-`depth` tree over the given leaves (padded
    /// with default nodes) and return the root plus one full sibling path
    /// per supplied leaf.
    fn build_tree(leaves: &[Hash], depth: u32) -> (Hash, Vec<ProofPath>) {
        let width = 1usize << depth;
        assert!(leaves.len() <= width);

        let mut level: Vec<Hash> = leaves.to_vec();
        level.resize(width, Hash::default());

        let mut levels = vec![level];
        while levels.last().unwrap().len() > 1 {
            let prev = levels.last().unwrap();
            let next: Vec<Hash> = prev
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], &pair[1]))
                .collect();
            levels.push(next);
        }

        let root = levels.last().unwrap()[0];
        let proofs = (0..leaves.len())
            .map(|index| {
                (0..depth as usize)
                    .map(|level| levels[level][(index >> level) ^ 1])
                    .collect()
            })
            .collect();

        (root, proofs)
    }

    fn sample_leaves(count: usize) -> Vec<Hash> {
        (0..count).map(|i| keccak256(format!("leaf-{i}"))).collect()
    }

    #[test]
    fn test_valid_proofs_verify_for_every_leaf() {
        let leaves = sample_leaves(8);
        let (root, proofs) = build_tree(&leaves, 3);

        for (index, proof) in proofs.iter().enumerate() {
            assert!(
                verify_proof(leaves[index], index as u64, proof, root, 3).unwrap(),
                "leaf {index} failed to verify"
            );
        }
    }

    #[test]
    fn test_flipping_any_sibling_breaks_verification() {
        let leaves = sample_leaves(8);
        let (root, proofs) = build_tree(&leaves, 3);

        for level in 0..3 {
            let mut nodes: Vec<Hash> = proofs[5].as_slice().to_vec();
            nodes[level].0[0] ^= 0xff;
            let corrupted = ProofPath::new(nodes);
            assert!(
                !verify_proof(leaves[5], 5, &corrupted, root, 3).unwrap(),
                "corruption at level {level} went undetected"
            );
        }
    }

    #[test]
    fn test_wrong_leaf_index_breaks_verification() {
        let leaves = sample_leaves(8);
        let (root, proofs) = build_tree(&leaves, 3);

        // Indices 4 and 5 differ in bit 0, so the level-0 operand order
        // flips and the recomputed root cannot match.
        assert!(!verify_proof(leaves[5], 4, &proofs[5], root, 3).unwrap());
        assert!(!verify_proof(leaves[5], 6, &proofs[5], root, 3).unwrap());
    }

    #[test]
    fn test_depth_three_index_five_end_to_end() {
        // Index 5 is binary 101: the running hash is the right operand at
        // levels 0 and 2 and the left operand at level 1.
        let leaf = keccak256(b"the leaf");
        let s0 = keccak256(b"s0");
        let s1 = keccak256(b"s1");
        let s2 = keccak256(b"s2");

        let expected = hash_pair(&s2, &hash_pair(&hash_pair(&s0, &leaf), &s1));
        let path = ProofPath::new(vec![s0, s1, s2]);

        assert!(verify_proof(leaf, 5, &path, expected, 3).unwrap());

        let mut corrupted_nodes = vec![s0, s1, s2];
        corrupted_nodes[1].0[0] ^= 0x01;
        let corrupted = ProofPath::new(corrupted_nodes);
        assert!(!verify_proof(leaf, 5, &corrupted, expected, 3).unwrap());
    }

    #[test]
    fn test_wrong_length_proof_is_rejected() {
        let leaves = sample_leaves(4);
        let (root, proofs) = build_tree(&leaves, 2);

        let short = ProofPath::new(proofs[0].as_slice()[..1].to_vec());
        assert_eq!(
            verify_proof(leaves[0], 0, &short, root, 2),
            Err(CompressionError::InvalidProofLength {
                expected: 2,
                actual: 1,
            })
        );

        let mut long_nodes = proofs[0].as_slice().to_vec();
        long_nodes.push(keccak256(b"extra"));
        let long = ProofPath::new(long_nodes);
        assert_eq!(
            verify_proof(leaves[0], 0, &long, root, 2),
            Err(CompressionError::InvalidProofLength {
                expected: 2,
                actual: 3,
            })
        );
    }

    #[test]
    fn test_index_out_of_range_is_rejected() {
        let leaves = sample_leaves(4);
        let (root, proofs) = build_tree(&leaves, 2);

        assert_eq!(
            verify_proof(leaves[0], 4, &proofs[0], root, 2),
            Err(CompressionError::IndexOutOfRange {
                index: 4,
                max_depth: 2,
            })
        );
    }
}
