//! Client-side proof verification for a single asset.
//!
//! Replays the whole trust chain without sending anything: recompute the
//! leaf hashes from metadata, fold the sibling path back to a root, and
//! check that root against the tree's changelog. Staleness is reported as a
//! warning here, not a failure: a root that fell out of the buffer just
//! means the proof should be re-fetched.

use anyhow::Context;
use clap::Args;
use colored::Colorize;

use canopy_lib::CompressionError;

use crate::commands::{fetch_leaf, resolve_asset_id};
use crate::read_api::ReadApiClient;
use crate::{print_separator, short_hex, KeyStore};

/// Verify an asset's proof against the live on-chain tree
#[derive(Args, Debug)]
pub struct VerifyCommand {
    /// Asset id to verify (falls back to the saved `asset` key)
    #[arg(long, short = 'a')]
    pub asset_id: Option<String>,
}

impl VerifyCommand {
    pub async fn execute(&self, rpc_url: &str) -> anyhow::Result<()> {
        let store = KeyStore::open_or_create()?;
        let asset_id = resolve_asset_id(self.asset_id.as_deref(), &store)?;
        let client = ReadApiClient::new(rpc_url);

        print_separator("Fetch and cross-check the asset");
        let leaf = fetch_leaf(&client, asset_id).await?;

        println!(
            "{} {} ({})",
            "Asset:".bright_white(),
            leaf.asset.metadata.name.bright_cyan(),
            short_hex(leaf.asset.id)
        );
        println!("{} {}", "Owner:".bright_white(), leaf.asset.owner);
        match leaf.asset.delegate {
            Some(delegate) => println!("{} {}", "Delegate:".bright_white(), delegate),
            None => println!(
                "{} {}",
                "Delegate:".bright_white(),
                "none (owner acts)".dimmed()
            ),
        }
        println!(
            "{} {} (leaf {})",
            "Tree:".bright_white(),
            short_hex(leaf.asset.tree),
            leaf.asset.leaf_index
        );
        println!("{} {}", "Content hash:".bright_white(), leaf.asset.data_hash);
        println!(
            "{} {}",
            "Creator hash:".bright_white(),
            leaf.asset.creator_hash
        );
        println!(
            "{} recomputed hashes match the indexer",
            "OK".bright_green()
        );

        print_separator("Verify the proof against the tree changelog");
        let tree = &leaf.tree;
        println!("{} {}", "Tree authority:".bright_white(), tree.authority());
        println!(
            "{} depth {}, canopy {}, changelog {}/{}",
            "Tree shape:".bright_white(),
            tree.max_depth(),
            tree.canopy_depth(),
            tree.changelog().len(),
            tree.changelog().capacity()
        );

        match tree.check_proof(&leaf.merkle_proof()) {
            Ok(result) if result.is_current => {
                println!(
                    "{} proof verifies against the current root {}",
                    "OK".bright_green().bold(),
                    short_hex(result.root)
                );
            }
            Ok(result) => {
                let behind = tree.sequence_number() - result.seq;
                println!(
                    "{} proof verifies against a retained root {} ({} update{} behind the current one)",
                    "OK".bright_green().bold(),
                    short_hex(result.root),
                    behind,
                    if behind == 1 { "" } else { "s" }
                );
                println!(
                    "{}",
                    "The on-chain changelog still accepts this root; no action needed.".dimmed()
                );
            }
            Err(CompressionError::StaleRoot { root }) => {
                // Not fatal for a read-only check: the proof is internally
                // consistent, the buffer has just moved past its root.
                println!(
                    "{} proof root {} is no longer in the changelog",
                    "WARN".bright_yellow().bold(),
                    short_hex(root)
                );
                println!(
                    "{}",
                    "Re-run this command to fetch a fresh proof before building any instruction."
                        .bright_yellow()
                );
            }
            Err(err) => {
                return Err(err).context("client-side proof verification failed");
            }
        }

        Ok(())
    }
}
