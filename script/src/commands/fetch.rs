//! List the compressed assets owned by an address.

use anyhow::Context;
use clap::Args;
use colored::Colorize;

use canopy_lib::Pubkey;

use crate::commands::spinner;
use crate::read_api::{ReadApiClient, SortBy, SortDirection};
use crate::{load_or_generate_wallet, print_separator, short_hex, KeyStore, DEFAULT_ASSET_KEY};

/// List compressed assets owned by an address
#[derive(Args, Debug)]
pub struct FetchCommand {
    /// Owner to list (defaults to the local demo wallet)
    #[arg(long, short = 'o')]
    pub owner: Option<String>,

    /// Sort field
    #[arg(long, value_enum, default_value = "created")]
    pub sort_by: SortBy,

    /// Sort direction
    #[arg(long, value_enum, default_value = "asc")]
    pub sort_direction: SortDirection,

    /// Page to fetch (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Assets per page
    #[arg(long, default_value_t = 25)]
    pub limit: u32,

    /// Keep fetching pages until the listing is exhausted
    #[arg(long)]
    pub all: bool,

    /// Save the first listed asset id under the `asset` key
    #[arg(long)]
    pub save: bool,
}

impl FetchCommand {
    pub async fn execute(&self, rpc_url: &str) -> anyhow::Result<()> {
        let mut store = KeyStore::open_or_create()?;
        let owner: Pubkey = match &self.owner {
            Some(raw) => raw.parse().context("owner must be a 32-byte hex string")?,
            None => load_or_generate_wallet(&mut store)?,
        };
        let client = ReadApiClient::new(rpc_url);

        print_separator(&format!("Compressed assets owned by {}", short_hex(owner)));

        let mut page = self.page;
        let mut shown = 0u64;
        let mut first_asset: Option<Pubkey> = None;
        loop {
            let pb = spinner(&format!("Fetching page {page}..."));
            let listing = client
                .get_assets_by_owner(&owner, self.sort_by, self.sort_direction, page, self.limit)
                .await?;
            pb.finish_and_clear();

            if listing.items.is_empty() {
                if shown == 0 {
                    println!("{}", "No compressed assets found for this owner.".dimmed());
                }
                break;
            }

            for asset in &listing.items {
                shown += 1;
                first_asset.get_or_insert(asset.id);
                let marker = if asset.compressed {
                    "compressed".bright_green()
                } else {
                    "uncompressed".bright_red()
                };
                println!(
                    "{:>4}. {} {} [{}]",
                    shown,
                    short_hex(asset.id).bright_cyan(),
                    asset.metadata.name,
                    marker
                );
                println!(
                    "      tree {} leaf {}",
                    short_hex(asset.tree).dimmed(),
                    asset.leaf_index
                );
            }

            println!(
                "{}",
                format!("Page {page}: {} of {} total", shown, listing.total).dimmed()
            );

            if !self.all || shown >= listing.total {
                break;
            }
            page += 1;
        }

        if self.save {
            match first_asset {
                Some(id) => {
                    store.set(DEFAULT_ASSET_KEY, id)?;
                    println!(
                        "{} saved {} as the default asset",
                        "OK".bright_green(),
                        short_hex(id)
                    );
                }
                None => println!("{}", "Nothing to save.".dimmed()),
            }
        }

        Ok(())
    }
}
