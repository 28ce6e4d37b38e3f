//! Shared helpers for the canopy CLI.
//!
//! Holds the pieces the demo commands have in common: a small file-backed
//! store for addresses worth remembering between runs, a throwaway wallet
//! generator for demo transfers, and console formatting helpers.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use console::Term;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use canopy_lib::Pubkey;

pub mod commands;
pub mod instruction;
pub mod read_api;

/// Key store file name, created next to wherever the CLI runs.
pub const KEYS_FILENAME: &str = "keys.json";

/// Key store entry name the commands use for a default asset id.
pub const DEFAULT_ASSET_KEY: &str = "asset";

/// Key store entry name for the locally generated demo wallet.
pub const LOCAL_WALLET_KEY: &str = "wallet";

/// Named addresses persisted between demo runs.
///
/// The fetch command saves interesting asset ids here so the verify and
/// transfer commands can be run without retyping them.
#[derive(Debug)]
pub struct KeyStore {
    path: PathBuf,
    keys: BTreeMap<String, Pubkey>,
}

impl KeyStore {
    /// Open the store in the working directory, creating it when missing.
    pub fn open_or_create() -> anyhow::Result<Self> {
        Self::open_or_create_at(Path::new(KEYS_FILENAME))
    }

    pub fn open_or_create_at(path: &Path) -> anyhow::Result<Self> {
        let keys = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(KeyStore {
            path: path.to_path_buf(),
            keys,
        })
    }

    pub fn get(&self, name: &str) -> Option<Pubkey> {
        self.keys.get(name).copied()
    }

    /// Insert or replace an entry and persist the store.
    pub fn set(&mut self, name: &str, key: Pubkey) -> anyhow::Result<()> {
        self.keys.insert(name.to_string(), key);
        self.save()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.keys)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

/// Generate a fresh throwaway wallet address from OS entropy.
pub fn generate_wallet_address() -> Pubkey {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Pubkey(bytes)
}

/// Fetch the locally persisted demo wallet, generating one on first use.
pub fn load_or_generate_wallet(store: &mut KeyStore) -> anyhow::Result<Pubkey> {
    match store.get(LOCAL_WALLET_KEY) {
        Some(wallet) => Ok(wallet),
        None => {
            let wallet = generate_wallet_address();
            store.set(LOCAL_WALLET_KEY, wallet)?;
            Ok(wallet)
        }
    }
}

/// Derive the deterministic asset id for a leaf position within a tree.
pub fn derive_asset_id(tree: &Pubkey, leaf_index: u64) -> Pubkey {
    let mut hasher = Sha256::new();
    hasher.update(b"asset");
    hasher.update(tree.0);
    hasher.update(leaf_index.to_le_bytes());
    let digest = hasher.finalize();

    let mut id = [0u8; 32];
    id.copy_from_slice(&digest);
    Pubkey(id)
}

/// Print a full-width separator with an optional heading.
pub fn print_separator(message: &str) {
    let width = Term::stdout().size().1 as usize;
    println!();
    println!("{}", "=".repeat(width.clamp(20, 80)).bright_black());
    if !message.is_empty() {
        println!("{}", message.bold());
        println!();
    }
}

/// Shorten a hex-displayed value for output: first and last six chars.
pub fn short_hex(value: impl std::fmt::Display) -> String {
    let full = value.to_string();
    if full.len() <= 12 {
        return full;
    }
    format!("{}..{}", &full[..6], &full[full.len() - 6..])
}
