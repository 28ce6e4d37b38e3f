//! Build a creator attribution-verification instruction.
//!
//! Same verification pipeline as a transfer; the resulting payload marks
//! one of the leaf's listed creators as verified. The creator named in the
//! instruction is the one who must sign it.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;

use canopy_lib::Pubkey;

use crate::commands::{fetch_leaf, resolve_asset_id};
use crate::instruction::{build_verify_creator, LeafArgs, VerifyCreatorParams};
use crate::read_api::ReadApiClient;
use crate::{print_separator, short_hex, KeyStore};

/// Build and save a creator-verification instruction
#[derive(Args, Debug)]
pub struct VerifyCreatorCommand {
    /// Asset id (falls back to the saved `asset` key)
    #[arg(long, short = 'a')]
    pub asset_id: Option<String>,

    /// Creator address to mark as verified
    #[arg(long, short = 'c')]
    pub creator: String,

    /// Output file for the instruction payload
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl VerifyCreatorCommand {
    pub async fn execute(&self, rpc_url: &str) -> anyhow::Result<()> {
        let store = KeyStore::open_or_create()?;
        let asset_id = resolve_asset_id(self.asset_id.as_deref(), &store)?;
        let creator: Pubkey = self
            .creator
            .parse()
            .context("creator must be a 32-byte hex string")?;
        let client = ReadApiClient::new(rpc_url);

        print_separator("Fetch and verify the leaf");
        let leaf = fetch_leaf(&client, asset_id).await?;

        let listed = leaf
            .asset
            .metadata
            .creators
            .iter()
            .find(|c| c.address == creator);
        match listed {
            None => bail!(
                "creator {} is not in the asset's creator list",
                short_hex(creator)
            ),
            Some(entry) if entry.verified => {
                bail!("creator {} is already verified", short_hex(creator))
            }
            Some(_) => {}
        }

        let result = leaf
            .tree
            .check_proof(&leaf.merkle_proof())
            .context("refusing to build a verification from an unverified proof")?;
        if !result.is_current {
            println!(
                "{} verified against a retained (non-current) root; the tree accepts it",
                "NOTE".bright_yellow()
            );
        }

        let truncated = leaf.proof.proof.truncate(leaf.tree.canopy_depth())?;
        let index =
            u32::try_from(leaf.asset.leaf_index).context("leaf index does not fit in u32")?;

        let params = VerifyCreatorParams {
            tree_id: leaf.asset.tree,
            tree_authority: leaf.tree.authority(),
            leaf_owner: leaf.asset.owner,
            leaf_delegate: leaf.asset.delegate.unwrap_or(leaf.asset.owner),
            creator,
            args: LeafArgs {
                root: result.root,
                data_hash: leaf.asset.data_hash,
                creator_hash: leaf.asset.creator_hash,
                nonce: leaf.asset.leaf_index,
                index,
            },
        };
        let instruction = build_verify_creator(&params, &truncated);

        print_separator("Creator-verification instruction");
        println!(
            "{} {} on asset {}",
            "Creator:".bright_white(),
            short_hex(creator).bright_cyan(),
            short_hex(leaf.asset.id)
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
                    "Write the creator-verification instruction for {}?",
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
            .unwrap_or_else(|| PathBuf::from(format!("verify-creator-{}.json", &id_hex[..12])));
        fs::write(&output, serde_json::to_string_pretty(&instruction)?)
            .with_context(|| format!("writing {}", output.display()))?;

        println!(
            "{} instruction written to {}",
            "OK".bright_green().bold(),
            output.display().to_string().bright_cyan()
        );
        println!(
            "{}",
            "Sign and submit it with an external wallet; the creator must sign.".dimmed()
        );
        Ok(())
    }
}
