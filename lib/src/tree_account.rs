//! Concurrent Merkle tree account model.
//!
//! The on-chain tree tolerates near-simultaneous writers by retaining a
//! bounded changelog of recently committed roots instead of a single
//! current root. Any root still present in that buffer is acceptable for
//! verification; only a root that has been evicted (or never existed) is
//! rejected. This module decodes the fixed-layout tree account, models the
//! changelog as a FIFO ring with explicit eviction, and combines changelog
//! membership with the pure path verifier.
//!
//! Account layout, all integers little-endian:
//!
//! ```text
//! [0..4]    max_depth: u32
//! [4..8]    max_buffer_size: u32
//! [8..40]   authority: 32 bytes
//! [40..48]  sequence_number: u64
//! [48..52]  active_index: u32      newest changelog slot
//! [52..56]  buffer_count: u32      populated slots, 1..=max_buffer_size
//! [56..]    changelog: max_buffer_size slots of (root: 32 bytes, seq: u64)
//! [tail]    canopy nodes: (2^(canopy_depth + 1) - 2) * 32 bytes
//! ```
//!
//! The canopy depth is not stored; it is derived from the tail length. The
//! canopy node values themselves are not retained client-side, since local
//! verification always folds a full path; only the depth matters, to know
//! how much of a proof an instruction must omit.

use std::collections::VecDeque;

use crate::crypto::{hash_pair, Hash, Pubkey};
use crate::error::CompressionError;
use crate::merkle_proof::{verify_proof, MerkleProof};

/// Deepest tree this client will decode.
pub const MAX_SUPPORTED_DEPTH: u32 = 30;

/// Largest changelog capacity this client will decode.
pub const MAX_SUPPORTED_BUFFER_SIZE: u32 = 2048;

const HEADER_LEN: usize = 56;
const CHANGELOG_SLOT_LEN: usize = 40;

/// One committed (root, sequence) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub root: Hash,
    pub seq: u64,
}

/// Bounded FIFO of recently valid roots, oldest first.
#[derive(Debug, Clone)]
pub struct Changelog {
    entries: VecDeque<ChangelogEntry>,
    capacity: usize,
}

impl Changelog {
    pub fn with_capacity(capacity: usize) -> Self {
        Changelog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a newly committed root, evicting the oldest entry when full.
    pub fn record(&mut self, root: Hash, seq: u64) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ChangelogEntry { root, seq });
    }

    pub fn newest(&self) -> Option<&ChangelogEntry> {
        self.entries.back()
    }

    /// Find a root anywhere in the buffer, preferring the newest match.
    pub fn find(&self, root: &Hash) -> Option<&ChangelogEntry> {
        self.entries.iter().rev().find(|entry| entry.root == *root)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangelogEntry> {
        self.entries.iter()
    }
}

/// Where a candidate root sits relative to the tree's changelog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootStatus {
    /// The newest committed root.
    Current { seq: u64 },
    /// An older root still retained by the buffer.
    Retained { seq: u64 },
    /// Not present in the changelog.
    Unknown,
}

/// Outcome of a successful proof check: which retained root matched, and
/// whether it is the newest one. A non-current match is not a failure, but
/// callers will usually want to log it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationResult {
    pub root: Hash,
    pub seq: u64,
    pub is_current: bool,
}

/// Read-only snapshot of an on-chain concurrent tree.
#[derive(Debug, Clone)]
pub struct ConcurrentTreeAccount {
    max_depth: u32,
    max_buffer_size: u32,
    authority: Pubkey,
    sequence_number: u64,
    canopy_depth: u32,
    changelog: Changelog,
}

impl ConcurrentTreeAccount {
    /// Build a fresh in-memory tree seeded with the empty root.
    pub fn new(
        max_depth: u32,
        max_buffer_size: u32,
        canopy_depth: u32,
        authority: Pubkey,
    ) -> Result<Self, CompressionError> {
        validate_header(max_depth, max_buffer_size)?;
        if canopy_depth > max_depth {
            return Err(CompressionError::CorruptTreeAccount(format!(
                "canopy depth {canopy_depth} exceeds max depth {max_depth}"
            )));
        }

        let mut changelog = Changelog::with_capacity(max_buffer_size as usize);
        changelog.record(empty_root(max_depth), 0);

        Ok(ConcurrentTreeAccount {
            max_depth,
            max_buffer_size,
            authority,
            sequence_number: 0,
            canopy_depth,
            changelog,
        })
    }

    /// Decode a tree account from its raw bytes.
    ///
    /// Every inconsistency between the header fields and the account length
    /// is fatal: a model with unverifiable bounds must not be used for
    /// verification.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CompressionError> {
        if data.len() < HEADER_LEN {
            return Err(CompressionError::CorruptTreeAccount(format!(
                "{} bytes is too short for the {HEADER_LEN}-byte header",
                data.len()
            )));
        }

        let max_depth = read_u32(data, 0);
        let max_buffer_size = read_u32(data, 4);
        validate_header(max_depth, max_buffer_size)?;

        let mut authority = [0u8; 32];
        authority.copy_from_slice(&data[8..40]);
        let sequence_number = read_u64(data, 40);
        let active_index = read_u32(data, 48);
        let buffer_count = read_u32(data, 52);

        if buffer_count == 0 {
            return Err(CompressionError::CorruptTreeAccount(
                "changelog is empty".to_string(),
            ));
        }
        if buffer_count > max_buffer_size {
            return Err(CompressionError::CorruptTreeAccount(format!(
                "buffer count {buffer_count} exceeds buffer size {max_buffer_size}"
            )));
        }
        if active_index >= max_buffer_size {
            return Err(CompressionError::CorruptTreeAccount(format!(
                "active index {active_index} out of bounds for buffer size {max_buffer_size}"
            )));
        }

        let changelog_len = max_buffer_size as usize * CHANGELOG_SLOT_LEN;
        let changelog_end = HEADER_LEN + changelog_len;
        if data.len() < changelog_end {
            return Err(CompressionError::CorruptTreeAccount(format!(
                "{} bytes cannot hold a {}-slot changelog",
                data.len(),
                max_buffer_size
            )));
        }

        // Walk the ring from the oldest populated slot to the active one.
        let mut changelog = Changelog::with_capacity(max_buffer_size as usize);
        for i in 0..buffer_count {
            let slot = (active_index + 1 + max_buffer_size - buffer_count + i) % max_buffer_size;
            let offset = HEADER_LEN + slot as usize * CHANGELOG_SLOT_LEN;
            let mut root = [0u8; 32];
            root.copy_from_slice(&data[offset..offset + 32]);
            changelog.record(Hash(root), read_u64(data, offset + 32));
        }

        let newest = changelog.newest().expect("buffer_count >= 1");
        if newest.seq != sequence_number {
            return Err(CompressionError::CorruptTreeAccount(format!(
                "newest changelog seq {} does not match header sequence {}",
                newest.seq, sequence_number
            )));
        }

        let canopy_depth = derive_canopy_depth(data.len() - changelog_end, max_depth)?;

        Ok(ConcurrentTreeAccount {
            max_depth,
            max_buffer_size,
            authority: Pubkey(authority),
            sequence_number,
            canopy_depth,
            changelog,
        })
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn max_buffer_size(&self) -> u32 {
        self.max_buffer_size
    }

    pub fn authority(&self) -> Pubkey {
        self.authority
    }

    pub fn canopy_depth(&self) -> u32 {
        self.canopy_depth
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Number of leaves the tree can hold.
    pub fn capacity(&self) -> u64 {
        1u64 << self.max_depth
    }

    pub fn changelog(&self) -> &Changelog {
        &self.changelog
    }

    /// The newest committed root.
    pub fn current_root(&self) -> Hash {
        self.changelog
            .newest()
            .expect("changelog always holds the current root")
            .root
    }

    /// Append a freshly committed root, evicting the oldest retained one
    /// when the buffer is full.
    pub fn record_root(&mut self, root: Hash) {
        self.sequence_number += 1;
        self.changelog.record(root, self.sequence_number);
    }

    /// Whether a candidate root appears anywhere in the changelog.
    ///
    /// This is the concurrent tree's core relaxation: a root that was
    /// current a few writes ago still verifies, because the buffer retains
    /// the last `max_buffer_size` committed roots.
    pub fn is_root_valid(&self, candidate: &Hash) -> bool {
        self.changelog.find(candidate).is_some()
    }

    pub fn root_status(&self, candidate: &Hash) -> RootStatus {
        match self.changelog.find(candidate) {
            None => RootStatus::Unknown,
            Some(entry) if entry.seq == self.sequence_number => {
                RootStatus::Current { seq: entry.seq }
            }
            Some(entry) => RootStatus::Retained { seq: entry.seq },
        }
    }

    /// Check a fetched proof against this tree snapshot.
    ///
    /// The proof must both reproduce its claimed root from the leaf and
    /// sibling path, and claim a root the changelog still retains. A
    /// mathematical mismatch is fatal; a self-consistent proof against an
    /// unknown root is reported as stale so the caller can re-fetch.
    pub fn check_proof(&self, proof: &MerkleProof) -> Result<VerificationResult, CompressionError> {
        let consistent = verify_proof(
            proof.leaf,
            proof.leaf_index,
            &proof.path,
            proof.root,
            self.max_depth,
        )?;
        if !consistent {
            return Err(CompressionError::InvalidProof {
                claimed: proof.root,
            });
        }

        match self.root_status(&proof.root) {
            RootStatus::Current { seq } => Ok(VerificationResult {
                root: proof.root,
                seq,
                is_current: true,
            }),
            RootStatus::Retained { seq } => Ok(VerificationResult {
                root: proof.root,
                seq,
                is_current: false,
            }),
            RootStatus::Unknown => Err(CompressionError::StaleRoot { root: proof.root }),
        }
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

fn validate_header(max_depth: u32, max_buffer_size: u32) -> Result<(), CompressionError> {
    if max_depth == 0 || max_depth > MAX_SUPPORTED_DEPTH {
        return Err(CompressionError::CorruptTreeAccount(format!(
            "max depth {max_depth} is outside 1..={MAX_SUPPORTED_DEPTH}"
        )));
    }
    if max_buffer_size == 0 || max_buffer_size > MAX_SUPPORTED_BUFFER_SIZE {
        return Err(CompressionError::CorruptTreeAccount(format!(
            "max buffer size {max_buffer_size} is outside 1..={MAX_SUPPORTED_BUFFER_SIZE}"
        )));
    }
    Ok(())
}

/// Root of a tree whose leaves are all the zero node.
fn empty_root(depth: u32) -> Hash {
    let mut node = Hash::default();
    for _ in 0..depth {
        node = hash_pair(&node, &node);
    }
    node
}

/// A canopy of depth `c` caches `2^(c+1) - 2` nodes. Map the tail length
/// back to `c`, rejecting any length that no canopy depth produces.
fn derive_canopy_depth(tail_len: usize, max_depth: u32) -> Result<u32, CompressionError> {
    if tail_len % 32 != 0 {
        return Err(CompressionError::CorruptTreeAccount(format!(
            "canopy region of {tail_len} bytes is not node-aligned"
        )));
    }
    let node_count = tail_len / 32;
    for depth in 0..=max_depth {
        if (1usize << (depth + 1)) - 2 == node_count {
            return Ok(depth);
        }
    }
    Err(CompressionError::CorruptTreeAccount(format!(
        "canopy region of {node_count} nodes does not match any depth up to {max_depth}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak256;
    use crate::merkle_proof::compute_root;
    use crate::proof_path::ProofPath;

    fn authority() -> Pubkey {
        Pubkey([0xAA; 32])
    }

    /// Serialize an account image with entries given oldest-first, laid out
    /// starting at slot 0 so the active slot is the last populated one.
    fn encode_account(
        max_depth: u32,
        max_buffer_size: u32,
        entries: &[(Hash, u64)],
        canopy_depth: u32,
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&max_depth.to_le_bytes());
        data.extend_from_slice(&max_buffer_size.to_le_bytes());
        data.extend_from_slice(&authority().0);
        data.extend_from_slice(&entries.last().map(|e| e.1).unwrap_or(0).to_le_bytes());
        data.extend_from_slice(&(entries.len().saturating_sub(1) as u32).to_le_bytes());
        data.extend_from_slice(&(entries.len() as u32).to_le_bytes());

        for slot in 0..max_buffer_size as usize {
            match entries.get(slot) {
                Some((root, seq)) => {
                    data.extend_from_slice(&root.0);
                    data.extend_from_slice(&seq.to_le_bytes());
                }
                None => data.extend_from_slice(&[0u8; CHANGELOG_SLOT_LEN]),
            }
        }

        let canopy_nodes = (1usize << (canopy_depth + 1)) - 2;
        data.extend_from_slice(&vec![0u8; canopy_nodes * 32]);
        data
    }

    #[test]
    fn test_changelog_fifo_eviction() {
        let mut changelog = Changelog::with_capacity(3);
        let roots: Vec<Hash> = (0..5).map(|i| keccak256(format!("root-{i}"))).collect();

        for (i, root) in roots.iter().enumerate() {
            changelog.record(*root, i as u64);
        }

        assert_eq!(changelog.len(), 3);
        assert!(changelog.find(&roots[0]).is_none());
        assert!(changelog.find(&roots[1]).is_none());
        for root in &roots[2..] {
            assert!(changelog.find(root).is_some());
        }
        assert_eq!(changelog.newest().unwrap().root, roots[4]);
    }

    #[test]
    fn test_root_status_current_retained_unknown() {
        let mut tree = ConcurrentTreeAccount::new(10, 4, 0, authority()).unwrap();
        let old = keccak256(b"old root");
        let new = keccak256(b"new root");
        tree.record_root(old);
        tree.record_root(new);

        assert_eq!(tree.current_root(), new);
        assert_eq!(tree.root_status(&new), RootStatus::Current { seq: 2 });
        assert_eq!(tree.root_status(&old), RootStatus::Retained { seq: 1 });
        assert_eq!(
            tree.root_status(&keccak256(b"never seen")),
            RootStatus::Unknown
        );
        assert!(tree.is_root_valid(&old));
        assert!(!tree.is_root_valid(&keccak256(b"never seen")));
    }

    #[test]
    fn test_record_root_evicts_past_capacity() {
        let mut tree = ConcurrentTreeAccount::new(10, 3, 0, authority()).unwrap();
        let roots: Vec<Hash> = (0..4).map(|i| keccak256(format!("r{i}"))).collect();
        for root in &roots {
            tree.record_root(*root);
        }

        // Capacity 3: the seed root and roots[0] have been evicted.
        assert!(!tree.is_root_valid(&roots[0]));
        assert!(tree.is_root_valid(&roots[1]));
        assert!(tree.is_root_valid(&roots[2]));
        assert!(tree.is_root_valid(&roots[3]));
    }

    #[test]
    fn test_new_tree_seeded_with_empty_root() {
        let tree = ConcurrentTreeAccount::new(3, 8, 0, authority()).unwrap();
        let zero = Hash::default();
        let level1 = hash_pair(&zero, &zero);
        let level2 = hash_pair(&level1, &level1);
        let expected = hash_pair(&level2, &level2);
        assert_eq!(tree.current_root(), expected);
    }

    #[test]
    fn test_decode_round_trip() {
        let entries: Vec<(Hash, u64)> = (1..=3)
            .map(|i| (keccak256(format!("root-{i}")), i as u64))
            .collect();
        let data = encode_account(14, 8, &entries, 2);

        let tree = ConcurrentTreeAccount::from_bytes(&data).unwrap();
        assert_eq!(tree.max_depth(), 14);
        assert_eq!(tree.max_buffer_size(), 8);
        assert_eq!(tree.authority(), authority());
        assert_eq!(tree.canopy_depth(), 2);
        assert_eq!(tree.sequence_number(), 3);
        assert_eq!(tree.capacity(), 1 << 14);
        assert_eq!(tree.changelog().len(), 3);
        assert_eq!(tree.current_root(), entries[2].0);
        for (root, _) in &entries {
            assert!(tree.is_root_valid(root));
        }
    }

    #[test]
    fn test_decode_wrapped_ring() {
        // Four entries in a 4-slot ring whose active slot wrapped to 1:
        // slots hold seqs [5, 6, 3, 4], so oldest-first order is 3,4,5,6.
        let roots: Vec<Hash> = (3..=6).map(|i| (keccak256(format!("seq-{i}")))).collect();
        let mut data = Vec::new();
        data.extend_from_slice(&10u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&authority().0);
        data.extend_from_slice(&6u64.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());
        for (slot_seq, root_index) in [(5u64, 2usize), (6, 3), (3, 0), (4, 1)] {
            data.extend_from_slice(&roots[root_index].0);
            data.extend_from_slice(&slot_seq.to_le_bytes());
        }

        let tree = ConcurrentTreeAccount::from_bytes(&data).unwrap();
        let seqs: Vec<u64> = tree.changelog().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5, 6]);
        assert_eq!(tree.current_root(), roots[3]);
    }

    #[test]
    fn test_decode_rejects_truncated_header() {
        let err = ConcurrentTreeAccount::from_bytes(&[0u8; 20]).unwrap_err();
        assert!(matches!(err, CompressionError::CorruptTreeAccount(_)));
    }

    #[test]
    fn test_decode_rejects_short_changelog_region() {
        let entries = vec![(keccak256(b"only"), 1u64)];
        let mut data = encode_account(14, 8, &entries, 0);
        data.truncate(HEADER_LEN + 2 * CHANGELOG_SLOT_LEN);
        assert!(matches!(
            ConcurrentTreeAccount::from_bytes(&data),
            Err(CompressionError::CorruptTreeAccount(_))
        ));
    }

    #[test]
    fn test_decode_rejects_empty_changelog() {
        let data = encode_account(14, 8, &[], 0);
        assert!(matches!(
            ConcurrentTreeAccount::from_bytes(&data),
            Err(CompressionError::CorruptTreeAccount(_))
        ));
    }

    #[test]
    fn test_decode_rejects_sequence_mismatch() {
        let entries = vec![(keccak256(b"r1"), 1u64), (keccak256(b"r2"), 2u64)];
        let mut data = encode_account(14, 8, &entries, 0);
        // Header sequence says 9 while the newest slot says 2.
        data[40..48].copy_from_slice(&9u64.to_le_bytes());
        assert!(matches!(
            ConcurrentTreeAccount::from_bytes(&data),
            Err(CompressionError::CorruptTreeAccount(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unaligned_canopy() {
        let entries = vec![(keccak256(b"r1"), 1u64)];
        let mut data = encode_account(14, 8, &entries, 0);
        data.extend_from_slice(&[0u8; 31]);
        assert!(matches!(
            ConcurrentTreeAccount::from_bytes(&data),
            Err(CompressionError::CorruptTreeAccount(_))
        ));
    }

    #[test]
    fn test_decode_rejects_impossible_canopy_size() {
        let entries = vec![(keccak256(b"r1"), 1u64)];
        let mut data = encode_account(14, 8, &entries, 0);
        // 3 nodes: no canopy depth produces an odd node count.
        data.extend_from_slice(&[0u8; 96]);
        assert!(matches!(
            ConcurrentTreeAccount::from_bytes(&data),
            Err(CompressionError::CorruptTreeAccount(_))
        ));
    }

    #[test]
    fn test_decode_rejects_absurd_header_bounds() {
        let entries = vec![(keccak256(b"r1"), 1u64)];
        let mut data = encode_account(14, 8, &entries, 0);
        data[0..4].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            ConcurrentTreeAccount::from_bytes(&data),
            Err(CompressionError::CorruptTreeAccount(_))
        ));
    }

    fn proof_for(tree_depth: u32, leaf: Hash, leaf_index: u64) -> MerkleProof {
        let path: ProofPath = (0..tree_depth)
            .map(|i| keccak256(format!("sibling-{i}")))
            .collect();
        let root = compute_root(leaf, leaf_index, &path);
        MerkleProof {
            root,
            leaf,
            leaf_index,
            path,
        }
    }

    #[test]
    fn test_check_proof_accepts_current_root() {
        let mut tree = ConcurrentTreeAccount::new(5, 8, 0, authority()).unwrap();
        let proof = proof_for(5, keccak256(b"leaf"), 11);
        tree.record_root(proof.root);

        let result = tree.check_proof(&proof).unwrap();
        assert_eq!(result.root, proof.root);
        assert!(result.is_current);
    }

    #[test]
    fn test_check_proof_accepts_retained_root() {
        let mut tree = ConcurrentTreeAccount::new(5, 8, 0, authority()).unwrap();
        let proof = proof_for(5, keccak256(b"leaf"), 11);
        tree.record_root(proof.root);
        tree.record_root(keccak256(b"a newer root"));

        let result = tree.check_proof(&proof).unwrap();
        assert_eq!(result.root, proof.root);
        assert!(!result.is_current);
    }

    #[test]
    fn test_check_proof_rejects_unknown_root_as_stale() {
        let tree = ConcurrentTreeAccount::new(5, 8, 0, authority()).unwrap();
        let proof = proof_for(5, keccak256(b"leaf"), 11);

        assert_eq!(
            tree.check_proof(&proof),
            Err(CompressionError::StaleRoot { root: proof.root })
        );
    }

    #[test]
    fn test_check_proof_rejects_inconsistent_proof() {
        let mut tree = ConcurrentTreeAccount::new(5, 8, 0, authority()).unwrap();
        let mut proof = proof_for(5, keccak256(b"leaf"), 11);
        tree.record_root(proof.root);
        proof.leaf = keccak256(b"some other leaf");

        assert_eq!(
            tree.check_proof(&proof),
            Err(CompressionError::InvalidProof {
                claimed: proof.root
            })
        );
    }

    #[test]
    fn test_check_proof_rejects_evicted_root() {
        let mut tree = ConcurrentTreeAccount::new(5, 2, 0, authority()).unwrap();
        let proof = proof_for(5, keccak256(b"leaf"), 11);
        tree.record_root(proof.root);
        tree.record_root(keccak256(b"newer 1"));
        tree.record_root(keccak256(b"newer 2"));

        assert_eq!(
            tree.check_proof(&proof),
            Err(CompressionError::StaleRoot { root: proof.root })
        );
    }
}
