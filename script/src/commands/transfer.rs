//! Build a transfer instruction for a verified leaf.
//!
//! Runs the full verification pipeline first and refuses to build anything
//! from a proof that fails it. The payload that lands on disk carries the
//! canopy-truncated proof; signing and submission happen elsewhere.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;

use canopy_lib::Pubkey;

use crate::commands::{fetch_leaf, resolve_asset_id};
use crate::instruction::{build_transfer, LeafArgs, TransferParams};
use crate::read_api::ReadApiClient;
use crate::{load_or_generate_wallet, print_separator, short_hex, KeyStore};

/// Build and save a transfer instruction for a compressed asset
#[derive(Args, Debug)]
pub struct TransferCommand {
    /// Asset id to transfer (falls back to the saved `asset` key)
    #[arg(long, short = 'a')]
    pub asset_id: Option<String>,

    /// New owner address (defaults to the locally generated demo wallet)
    #[arg(long, short = 'n')]
    pub new_owner: Option<String>,

    /// Output file for the instruction payload
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl TransferCommand {
    pub async fn execute(&self, rpc_url: &str) -> anyhow::Result<()> {
        let mut store = KeyStore::open_or_create()?;
        let asset_id = resolve_asset_id(self.asset_id.as_deref(), &store)?;
        let new_owner: Pubkey = match &self.new_owner {
            Some(raw) => raw
                .parse()
                .context("new owner must be a 32-byte hex string")?,
            None => load_or_generate_wallet(&mut store)?,
        };
        let client = ReadApiClient::new(rpc_url);

        print_separator("Fetch and verify the leaf");
        let leaf = fetch_leaf(&client, asset_id).await?;

        // A transfer must not be built from anything the changelog no
        // longer accepts; stale proofs abort here.
        let result = leaf
            .tree
            .check_proof(&leaf.merkle_proof())
            .context("refusing to build a transfer from an unverified proof")?;
        if !result.is_current {
            println!(
                "{} verified against a retained (non-current) root; the tree accepts it",
                "NOTE".bright_yellow()
            );
        }

        let truncated = leaf.proof.proof.truncate(leaf.tree.canopy_depth())?;
        let index =
            u32::try_from(leaf.asset.leaf_index).context("leaf index does not fit in u32")?;

        let params = TransferParams {
            tree_id: leaf.asset.tree,
            tree_authority: leaf.tree.authority(),
            leaf_owner: leaf.asset.owner,
            leaf_delegate: leaf.asset.delegate.unwrap_or(leaf.asset.owner),
            new_leaf_owner: new_owner,
            args: LeafArgs {
                root: result.root,
                data_hash: leaf.asset.data_hash,
                creator_hash: leaf.asset.creator_hash,
                nonce: leaf.asset.leaf_index,
                index,
            },
        };
        let instruction = build_transfer(&params, &truncated);

        print_separator("Transfer instruction");
        println!(
            "{} {} -> {}",
            "Ownership:".bright_white(),
            short_hex(params.leaf_owner),
            short_hex(new_owner).bright_cyan()
        );
        println!(
            "{} {} of {} proof nodes (canopy depth {} omitted)",
            "Proof accounts:".bright_white(),
            truncated.len(),
            leaf.proof.proof.len(),
            leaf.tree.canopy_depth()
        );

        if !self.yes {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Write the transfer instruction for {}?",
                    short_hex(leaf.asset.id)
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", "Cancelled, nothing written.".bright_red());
                return Ok(());
            }
        }

        let id_hex = leaf.asset.id.to_string();
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("transfer-{}.json", &id_hex[..12])));
        fs::write(&output, serde_json::to_string_pretty(&instruction)?)
            .with_context(|| format!("writing {}", output.display()))?;

        println!(
            "{} instruction written to {}",
            "OK".bright_green().bold(),
            output.display().to_string().bright_cyan()
        );
        println!(
            "{}",
            "Sign and submit it with an external wallet; the current owner must sign.".dimmed()
        );
        Ok(())
    }
}
