//! canopy CLI - client-side proof verification for compressed assets.
//!
//! Usage:
//! ```shell
//! # List assets owned by an address and remember the first one
//! cargo run --bin canopy -- fetch --owner <hex> --save
//!
//! # Verify the saved asset's proof against the on-chain tree
//! cargo run --bin canopy -- verify
//!
//! # Build a transfer instruction for external signing
//! cargo run --bin canopy -- transfer --new-owner <hex>
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use canopy_script::commands::{FetchCommand, TransferCommand, VerifyCommand, VerifyCreatorCommand};

#[derive(Parser)]
#[command(
    name = "canopy",
    about = "Verify compressed-asset proofs against concurrent Merkle trees",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read API endpoint
    #[arg(
        long,
        global = true,
        env = "RPC_URL",
        default_value = "http://localhost:8899"
    )]
    rpc_url: String,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List compressed assets owned by an address
    Fetch(FetchCommand),
    /// Verify an asset's proof against the live on-chain tree
    Verify(VerifyCommand),
    /// Build a transfer instruction for a verified leaf
    Transfer(TransferCommand),
    /// Build a creator-verification instruction for a verified leaf
    VerifyCreator(VerifyCreatorCommand),
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    println!(
        "{} {}",
        "canopy".bright_green().bold(),
        "- compressed-asset proof verification".bright_black()
    );

    let result = match &cli.command {
        Commands::Fetch(cmd) => cmd.execute(&cli.rpc_url).await,
        Commands::Verify(cmd) => cmd.execute(&cli.rpc_url).await,
        Commands::Transfer(cmd) => cmd.execute(&cli.rpc_url).await,
        Commands::VerifyCreator(cmd) => cmd.execute(&cli.rpc_url).await,
    };

    if let Err(err) = result {
        println!();
        eprintln!("{} {:#}", "Error:".bright_red().bold(), err);
        eprintln!();
        eprintln!("{}", "Tips:".bright_blue().bold());
        eprintln!("   - Check that the Read API endpoint is reachable (--rpc-url or RPC_URL)");
        eprintln!("   - Addresses and hashes are 32-byte hex strings");
        eprintln!("   - A stale proof usually just needs a re-fetch; run `canopy verify` again");
        eprintln!("   - Run with --verbose for request-level logs");
        process::exit(1);
    }
}
