//! Leaf metadata hashing.
//!
//! A leaf commits to its metadata through two digests: a content hash over
//! the canonical metadata fields and a creator hash over the ordered creator
//! list. Both must be byte-stable: the same logical input always serializes
//! to the same bytes regardless of how the host assembled it, so the fields
//! are written in a fixed order with explicit length prefixes and option
//! tags before hashing.

use serde::{Deserialize, Serialize};

use crate::crypto::{keccak256, keccakv, Hash, Pubkey};
use crate::error::CompressionError;

/// Maximum metadata name length in bytes.
pub const MAX_NAME_LENGTH: usize = 32;

/// Maximum metadata symbol length in bytes.
pub const MAX_SYMBOL_LENGTH: usize = 10;

/// Maximum metadata URI length in bytes.
pub const MAX_URI_LENGTH: usize = 200;

/// Maximum number of creators a leaf may carry.
pub const MAX_CREATOR_COUNT: usize = 5;

/// Seller fee ceiling, in basis points.
pub const MAX_SELLER_FEE_BASIS_POINTS: u16 = 10_000;

/// Leaf schema version tag committed into the leaf hash.
const LEAF_SCHEMA_V1: u8 = 1;

/// A party entitled to royalty/attribution on a leaf.
///
/// Creator order is part of committed leaf state: reordering an identical
/// creator set changes the creator hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub address: Pubkey,
    pub verified: bool,
    /// Royalty share in percent, 0 to 100.
    pub share: u8,
}

/// Reference to the collection a leaf belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub verified: bool,
    pub key: Pubkey,
}

/// How a limited-use asset may be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UseMethod {
    Burn,
    Multiple,
    Single,
}

impl UseMethod {
    fn tag(self) -> u8 {
        match self {
            UseMethod::Burn => 0,
            UseMethod::Multiple => 1,
            UseMethod::Single => 2,
        }
    }
}

/// Remaining-use counters for a limited-use asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uses {
    pub use_method: UseMethod,
    pub remaining: u64,
    pub total: u64,
}

/// Token standard tag carried by the metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStandard {
    NonFungible,
    FungibleAsset,
    Fungible,
    NonFungibleEdition,
}

impl TokenStandard {
    fn tag(self) -> u8 {
        match self {
            TokenStandard::NonFungible => 0,
            TokenStandard::FungibleAsset => 1,
            TokenStandard::Fungible => 2,
            TokenStandard::NonFungibleEdition => 3,
        }
    }
}

/// Token program generation the leaf was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenProgramVersion {
    Original,
    Token2022,
}

impl TokenProgramVersion {
    fn tag(self) -> u8 {
        match self {
            TokenProgramVersion::Original => 0,
            TokenProgramVersion::Token2022 => 1,
        }
    }
}

/// Canonical metadata fields committed into a leaf's content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataArgs {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub primary_sale_happened: bool,
    pub is_mutable: bool,
    pub edition_nonce: Option<u8>,
    pub token_standard: Option<TokenStandard>,
    pub collection: Option<Collection>,
    pub uses: Option<Uses>,
    pub token_program_version: TokenProgramVersion,
    pub creators: Vec<Creator>,
}

impl MetadataArgs {
    /// Check every bounded field against its limit.
    pub fn validate(&self) -> Result<(), CompressionError> {
        if self.name.len() > MAX_NAME_LENGTH {
            return Err(CompressionError::MalformedMetadata(format!(
                "name is {} bytes, limit is {}",
                self.name.len(),
                MAX_NAME_LENGTH
            )));
        }
        if self.symbol.len() > MAX_SYMBOL_LENGTH {
            return Err(CompressionError::MalformedMetadata(format!(
                "symbol is {} bytes, limit is {}",
                self.symbol.len(),
                MAX_SYMBOL_LENGTH
            )));
        }
        if self.uri.len() > MAX_URI_LENGTH {
            return Err(CompressionError::MalformedMetadata(format!(
                "uri is {} bytes, limit is {}",
                self.uri.len(),
                MAX_URI_LENGTH
            )));
        }
        if self.seller_fee_basis_points > MAX_SELLER_FEE_BASIS_POINTS {
            return Err(CompressionError::MalformedMetadata(format!(
                "seller fee {} exceeds {} basis points",
                self.seller_fee_basis_points, MAX_SELLER_FEE_BASIS_POINTS
            )));
        }
        validate_creators(&self.creators)
    }

    /// Serialize the metadata in canonical field order.
    ///
    /// Strings are length-prefixed (u32 little-endian), options carry a 0/1
    /// tag byte, integers are little-endian. The order must never change:
    /// it is what the on-chain program hashed when the leaf was appended.
    fn serialize_canonical(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);

        write_str(&mut out, &self.name);
        write_str(&mut out, &self.symbol);
        write_str(&mut out, &self.uri);
        out.extend_from_slice(&self.seller_fee_basis_points.to_le_bytes());
        out.push(self.primary_sale_happened as u8);
        out.push(self.is_mutable as u8);
        write_option(&mut out, self.edition_nonce, |out, nonce| out.push(nonce));
        write_option(&mut out, self.token_standard, |out, standard| {
            out.push(standard.tag())
        });
        write_option(&mut out, self.collection, |out, collection| {
            out.push(collection.verified as u8);
            out.extend_from_slice(&collection.key.0);
        });
        write_option(&mut out, self.uses, |out, uses| {
            out.push(uses.use_method.tag());
            out.extend_from_slice(&uses.remaining.to_le_bytes());
            out.extend_from_slice(&uses.total.to_le_bytes());
        });
        out.push(self.token_program_version.tag());
        out.extend_from_slice(&(self.creators.len() as u32).to_le_bytes());
        for creator in &self.creators {
            out.extend_from_slice(&creator.address.0);
            out.push(creator.verified as u8);
            out.push(creator.share);
        }

        out
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn write_option<T>(out: &mut Vec<u8>, value: Option<T>, write: impl FnOnce(&mut Vec<u8>, T)) {
    match value {
        None => out.push(0),
        Some(inner) => {
            out.push(1);
            write(out, inner);
        }
    }
}

fn validate_creators(creators: &[Creator]) -> Result<(), CompressionError> {
    if creators.len() > MAX_CREATOR_COUNT {
        return Err(CompressionError::MalformedMetadata(format!(
            "{} creators, limit is {}",
            creators.len(),
            MAX_CREATOR_COUNT
        )));
    }
    for creator in creators {
        if creator.share > 100 {
            return Err(CompressionError::MalformedMetadata(format!(
                "creator {} share {} is outside 0..=100",
                creator.address, creator.share
            )));
        }
    }
    Ok(())
}

/// Compute the content hash of a leaf's metadata.
///
/// The serialized args are hashed first, then combined with the seller-fee
/// value, so the fee is committed independently of the blob layout.
pub fn hash_metadata(metadata: &MetadataArgs) -> Result<Hash, CompressionError> {
    metadata.validate()?;

    let args_hash = keccak256(metadata.serialize_canonical());
    Ok(keccakv(&[
        &args_hash.0,
        &metadata.seller_fee_basis_points.to_le_bytes(),
    ]))
}

/// Compute the creator-attribution hash over an ordered creator list.
///
/// Each creator contributes (address, verified, share) in list order, so a
/// reordered but otherwise identical list hashes differently.
pub fn hash_creators(creators: &[Creator]) -> Result<Hash, CompressionError> {
    validate_creators(creators)?;

    let mut bytes = Vec::with_capacity(creators.len() * 34);
    for creator in creators {
        bytes.extend_from_slice(&creator.address.0);
        bytes.push(creator.verified as u8);
        bytes.push(creator.share);
    }
    Ok(keccak256(bytes))
}

/// Committed state of a single leaf.
///
/// The nonce is the leaf's index within the tree; it is stable once assigned
/// and survives transfers, which only rewrite owner and delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafSchema {
    pub id: Pubkey,
    pub owner: Pubkey,
    pub delegate: Pubkey,
    pub nonce: u64,
    pub data_hash: Hash,
    pub creator_hash: Hash,
}

impl LeafSchema {
    /// Build a leaf schema. A missing delegate defaults to the owner.
    pub fn new(
        id: Pubkey,
        owner: Pubkey,
        delegate: Option<Pubkey>,
        nonce: u64,
        data_hash: Hash,
        creator_hash: Hash,
    ) -> Self {
        Self {
            id,
            owner,
            delegate: delegate.unwrap_or(owner),
            nonce,
            data_hash,
            creator_hash,
        }
    }

    /// Hash the leaf's committed state into its tree node value.
    pub fn hash(&self) -> Hash {
        keccakv(&[
            &[LEAF_SCHEMA_V1],
            &self.id.0,
            &self.owner.0,
            &self.delegate.0,
            &self.nonce.to_le_bytes(),
            &self.data_hash.0,
            &self.creator_hash.0,
        ])
    }
}
