//! CLI subcommands.

mod fetch;
mod transfer;
mod verify;
mod verify_creator;

pub use fetch::FetchCommand;
pub use transfer::TransferCommand;
pub use verify::VerifyCommand;
pub use verify_creator::VerifyCreatorCommand;

use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use indicatif::{ProgressBar, ProgressStyle};

use canopy_lib::{ConcurrentTreeAccount, MerkleProof, Pubkey};

use crate::read_api::{check_indexer_hashes, Asset, AssetProof, ReadApiClient};
use crate::{derive_asset_id, KeyStore, DEFAULT_ASSET_KEY};

pub(crate) fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Resolve an asset id argument, falling back to the saved key store entry.
pub(crate) fn resolve_asset_id(arg: Option<&str>, store: &KeyStore) -> anyhow::Result<Pubkey> {
    match arg {
        Some(raw) => raw
            .parse()
            .context("asset id must be a 32-byte hex string"),
        None => store.get(DEFAULT_ASSET_KEY).ok_or_else(|| {
            anyhow!(
                "no asset id given and none saved; pass --asset-id or run `canopy fetch --save` first"
            )
        }),
    }
}

/// One leaf's fetched state: the asset record, its proof, and the tree
/// snapshot, already cross-checked for internal consistency.
pub(crate) struct FetchedLeaf {
    pub asset: Asset,
    pub proof: AssetProof,
    pub tree: ConcurrentTreeAccount,
}

impl FetchedLeaf {
    pub fn merkle_proof(&self) -> MerkleProof {
        MerkleProof {
            root: self.proof.root,
            leaf: self.proof.leaf,
            leaf_index: self.asset.leaf_index,
            path: self.proof.proof.clone(),
        }
    }
}

/// Fetch an asset, its proof, and its tree account, and run every local
/// consistency check that does not involve the changelog yet.
///
/// The proof and the tree account are fetched back to back on purpose: the
/// two snapshots are reconciled through changelog membership afterwards,
/// never by demanding exact root equality across calls.
pub(crate) async fn fetch_leaf(
    client: &ReadApiClient,
    asset_id: Pubkey,
) -> anyhow::Result<FetchedLeaf> {
    let pb = spinner("Fetching asset from the Read API...");
    let asset = client.get_asset(&asset_id).await?;
    pb.finish_with_message(format!("Fetched asset {}", crate::short_hex(asset.id)));

    if !asset.compressed {
        bail!("asset {} is not a compressed asset", asset.id);
    }
    if asset.id != derive_asset_id(&asset.tree, asset.leaf_index) {
        bail!(
            "asset id {} does not match its reported tree position",
            asset.id
        );
    }

    // Catches a stale or corrupt indexer before any proof work happens.
    check_indexer_hashes(&asset)?;

    let pb = spinner("Fetching proof and tree account...");
    let proof = client.get_asset_proof(&asset_id).await?;
    let tree_bytes = client.get_account(&asset.tree).await?;
    pb.finish_with_message("Fetched proof and tree account");

    if proof.tree_id != asset.tree {
        bail!(
            "proof is for tree {} but the asset lives in tree {}",
            proof.tree_id,
            asset.tree
        );
    }

    let tree = ConcurrentTreeAccount::from_bytes(&tree_bytes)?;

    let expected_leaf = asset.leaf_schema().hash();
    if proof.leaf != expected_leaf {
        bail!(
            "proof leaf {} does not match the asset state (expected {}); the indexer is serving inconsistent data",
            proof.leaf,
            expected_leaf
        );
    }

    Ok(FetchedLeaf { asset, proof, tree })
}
