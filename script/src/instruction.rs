//! State-changing instruction payloads.
//!
//! The verification core's responsibility ends at producing verified values;
//! these builders pack them into the account list and argument block a
//! transfer or creator-verification instruction expects, serialized as JSON
//! for an external signer. The proof accounts must come from a
//! [`TruncatedProof`]: the canopy levels are cached on-chain, and an
//! instruction that resupplies them is rejected as over-length.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use canopy_lib::{Hash, Pubkey, TruncatedProof};

/// Program that owns compressed-asset leaves and their instructions.
pub const ASSET_PROGRAM_ID: Pubkey = Pubkey(*b"CanopyAssetProgram11111111111111");

/// Program that owns the concurrent tree accounts.
pub const TREE_PROGRAM_ID: Pubkey = Pubkey(*b"CanopyTreeProgram111111111111111");

/// No-op program used as the changelog wrapper.
pub const NOOP_PROGRAM_ID: Pubkey = Pubkey(*b"CanopyNoopProgram111111111111111");

/// One account reference inside an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn readonly(pubkey: Pubkey) -> Self {
        AccountMeta {
            pubkey,
            is_signer: false,
            is_writable: false,
        }
    }

    pub fn signer(pubkey: Pubkey) -> Self {
        AccountMeta {
            pubkey,
            is_signer: true,
            is_writable: false,
        }
    }

    pub fn writable(pubkey: Pubkey) -> Self {
        AccountMeta {
            pubkey,
            is_signer: false,
            is_writable: true,
        }
    }
}

/// A fully assembled instruction, ready to be signed and submitted by an
/// external wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// The argument block shared by leaf instructions: the root being proven
/// against, both leaf digests, and the leaf's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafArgs {
    pub root: Hash,
    pub data_hash: Hash,
    pub creator_hash: Hash,
    pub nonce: u64,
    pub index: u32,
}

/// Accounts involved in an ownership transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferParams {
    pub tree_id: Pubkey,
    pub tree_authority: Pubkey,
    pub leaf_owner: Pubkey,
    pub leaf_delegate: Pubkey,
    pub new_leaf_owner: Pubkey,
    pub args: LeafArgs,
}

/// Accounts involved in a creator attribution-verification.
#[derive(Debug, Clone, Copy)]
pub struct VerifyCreatorParams {
    pub tree_id: Pubkey,
    pub tree_authority: Pubkey,
    pub leaf_owner: Pubkey,
    pub leaf_delegate: Pubkey,
    pub creator: Pubkey,
    pub args: LeafArgs,
}

/// First 8 bytes of sha256("global:<method>"), the anchor-style method tag.
fn discriminator(method: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{method}").as_bytes());
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&digest[..8]);
    tag
}

fn encode_args(method: &str, args: &LeafArgs) -> Vec<u8> {
    let mut data = Vec::with_capacity(116);
    data.extend_from_slice(&discriminator(method));
    data.extend_from_slice(&args.root.0);
    data.extend_from_slice(&args.data_hash.0);
    data.extend_from_slice(&args.creator_hash.0);
    data.extend_from_slice(&args.nonce.to_le_bytes());
    data.extend_from_slice(&args.index.to_le_bytes());
    data
}

fn proof_metas(proof: &TruncatedProof) -> impl Iterator<Item = AccountMeta> + '_ {
    proof.iter().map(|node| AccountMeta::readonly(Pubkey(node.0)))
}

/// Build the instruction that moves a leaf to a new owner.
///
/// The current owner signs; the delegate slot is cleared by the transfer,
/// so callers wanting a delegate on the new leaf issue a separate
/// delegation afterwards.
pub fn build_transfer(params: &TransferParams, proof: &TruncatedProof) -> Instruction {
    let mut accounts = vec![
        AccountMeta::readonly(params.tree_authority),
        AccountMeta::signer(params.leaf_owner),
        AccountMeta::readonly(params.leaf_delegate),
        AccountMeta::readonly(params.new_leaf_owner),
        AccountMeta::writable(params.tree_id),
        AccountMeta::readonly(NOOP_PROGRAM_ID),
        AccountMeta::readonly(TREE_PROGRAM_ID),
    ];
    accounts.extend(proof_metas(proof));

    Instruction {
        program_id: ASSET_PROGRAM_ID,
        accounts,
        data: encode_args("transfer", &params.args),
    }
}

/// Build the instruction that marks a creator as verified on a leaf.
///
/// The creator being verified signs.
pub fn build_verify_creator(params: &VerifyCreatorParams, proof: &TruncatedProof) -> Instruction {
    let mut accounts = vec![
        AccountMeta::readonly(params.tree_authority),
        AccountMeta::readonly(params.leaf_owner),
        AccountMeta::readonly(params.leaf_delegate),
        AccountMeta::signer(params.creator),
        AccountMeta::writable(params.tree_id),
        AccountMeta::readonly(NOOP_PROGRAM_ID),
        AccountMeta::readonly(TREE_PROGRAM_ID),
    ];
    accounts.extend(proof_metas(proof));

    Instruction {
        program_id: ASSET_PROGRAM_ID,
        accounts,
        data: encode_args("verify_creator", &params.args),
    }
}

mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_lib::{keccak256, ProofPath};

    fn sample_proof(full_depth: usize, canopy_depth: u32) -> TruncatedProof {
        let path: ProofPath = (0..full_depth)
            .map(|i| keccak256(format!("node-{i}")))
            .collect();
        path.truncate(canopy_depth).unwrap()
    }

    fn sample_args() -> LeafArgs {
        LeafArgs {
            root: keccak256(b"root"),
            data_hash: keccak256(b"data"),
            creator_hash: keccak256(b"creators"),
            nonce: 5,
            index: 5,
        }
    }

    fn sample_transfer() -> TransferParams {
        TransferParams {
            tree_id: Pubkey([1u8; 32]),
            tree_authority: Pubkey([2u8; 32]),
            leaf_owner: Pubkey([3u8; 32]),
            leaf_delegate: Pubkey([3u8; 32]),
            new_leaf_owner: Pubkey([4u8; 32]),
            args: sample_args(),
        }
    }

    #[test]
    fn test_transfer_data_layout() {
        let proof = sample_proof(5, 2);
        let ix = build_transfer(&sample_transfer(), &proof);

        assert_eq!(ix.data.len(), 116);
        assert_eq!(&ix.data[8..40], keccak256(b"root").as_ref());
        assert_eq!(&ix.data[40..72], keccak256(b"data").as_ref());
        assert_eq!(&ix.data[72..104], keccak256(b"creators").as_ref());
        assert_eq!(ix.data[104..112], 5u64.to_le_bytes());
        assert_eq!(ix.data[112..116], 5u32.to_le_bytes());
    }

    #[test]
    fn test_transfer_account_list() {
        let proof = sample_proof(5, 2);
        let params = sample_transfer();
        let ix = build_transfer(&params, &proof);

        assert_eq!(ix.program_id, ASSET_PROGRAM_ID);
        assert_eq!(ix.accounts.len(), 7 + proof.len());

        assert!(ix.accounts[1].is_signer, "leaf owner must sign");
        assert!(ix.accounts[4].is_writable, "tree account is written");
        assert_eq!(ix.accounts[3].pubkey, params.new_leaf_owner);

        for meta in &ix.accounts[7..] {
            assert!(!meta.is_signer);
            assert!(!meta.is_writable);
        }
    }

    #[test]
    fn test_proof_accounts_preserve_order() {
        let full: ProofPath = (0..4).map(|i| keccak256(format!("p{i}"))).collect();
        let truncated = full.truncate(1).unwrap();
        let ix = build_transfer(&sample_transfer(), &truncated);

        let proof_keys: Vec<[u8; 32]> = ix.accounts[7..].iter().map(|m| m.pubkey.0).collect();
        let expected: Vec<[u8; 32]> = truncated.iter().map(|h| h.0).collect();
        assert_eq!(proof_keys, expected);
    }

    #[test]
    fn test_verify_creator_marks_creator_as_signer() {
        let proof = sample_proof(5, 0);
        let creator = Pubkey([9u8; 32]);
        let params = VerifyCreatorParams {
            tree_id: Pubkey([1u8; 32]),
            tree_authority: Pubkey([2u8; 32]),
            leaf_owner: Pubkey([3u8; 32]),
            leaf_delegate: Pubkey([3u8; 32]),
            creator,
            args: sample_args(),
        };
        let ix = build_verify_creator(&params, &proof);

        assert_eq!(ix.accounts[3].pubkey, creator);
        assert!(ix.accounts[3].is_signer);
        assert!(!ix.accounts[1].is_signer, "owner does not sign verification");
    }

    #[test]
    fn test_discriminators_differ_per_method() {
        let proof = sample_proof(3, 0);
        let transfer = build_transfer(&sample_transfer(), &proof);
        let verify = build_verify_creator(
            &VerifyCreatorParams {
                tree_id: Pubkey([1u8; 32]),
                tree_authority: Pubkey([2u8; 32]),
                leaf_owner: Pubkey([3u8; 32]),
                leaf_delegate: Pubkey([3u8; 32]),
                creator: Pubkey([9u8; 32]),
                args: sample_args(),
            },
            &proof,
        );

        assert_ne!(transfer.data[..8], verify.data[..8]);
        assert_eq!(transfer.data[8..], verify.data[8..]);
    }

    #[test]
    fn test_instruction_json_round_trip() {
        let proof = sample_proof(4, 1);
        let ix = build_transfer(&sample_transfer(), &proof);

        let json = serde_json::to_string_pretty(&ix).unwrap();
        let back: Instruction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ix);
    }
}
