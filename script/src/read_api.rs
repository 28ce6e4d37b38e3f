//! Read API boundary.
//!
//! Asynchronous JSON-RPC client for the indexing service that reports leaf
//! state (`getAsset`), sibling paths (`getAssetProof`), owner listings
//! (`getAssetsByOwner`), and raw account bytes (`getAccountInfo`). The
//! indexer is the one shared resource in the system and is accessed
//! read-only; every response is treated as potentially stale, malformed, or
//! slow. Schemas are validated right here at the boundary so the verifier
//! never sees partial data, and only transport-level failures are retried.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use canopy_lib::{
    hash_creators, hash_metadata, Collection, Creator, Hash, LeafSchema, MetadataArgs, ProofPath,
    Pubkey, TokenProgramVersion, TokenStandard, UseMethod, Uses,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Errors surfaced at the Read API boundary.
#[derive(Debug, Error)]
pub enum ReadApiError {
    /// The requested asset or account does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response violated the documented schema, or its contents
    /// contradict themselves. Indicates an indexer bug; not retryable.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The service answered with a structured RPC error.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Transport-level failure; retried with backoff inside the client.
    #[error("transient rpc failure: {0}")]
    Transient(String),
}

/// Sort field accepted by `getAssetsByOwner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortBy {
    Created,
    Updated,
    RecentAction,
}

impl SortBy {
    fn as_str(self) -> &'static str {
        match self {
            SortBy::Created => "created",
            SortBy::Updated => "updated",
            SortBy::RecentAction => "recent_action",
        }
    }
}

/// Sort direction accepted by `getAssetsByOwner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A leaf-shaped record as reported by the indexer, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: Pubkey,
    pub owner: Pubkey,
    pub delegate: Option<Pubkey>,
    pub compressed: bool,
    pub tree: Pubkey,
    pub leaf_index: u64,
    pub seq: u64,
    pub data_hash: Hash,
    pub creator_hash: Hash,
    pub metadata: MetadataArgs,
}

impl Asset {
    /// Rebuild the leaf's committed schema from the fetched fields.
    pub fn leaf_schema(&self) -> LeafSchema {
        LeafSchema::new(
            self.id,
            self.owner,
            self.delegate,
            self.leaf_index,
            self.data_hash,
            self.creator_hash,
        )
    }
}

/// A proof response: claimed root, leaf hash, and the full sibling path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetProof {
    pub root: Hash,
    pub leaf: Hash,
    pub tree_id: Pubkey,
    pub proof: ProofPath,
}

/// One page of an owner listing.
#[derive(Debug, Clone)]
pub struct AssetList {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub items: Vec<Asset>,
}

/// Recompute the content and creator hashes from the fetched metadata and
/// compare them against the indexer-reported values.
///
/// A mismatch means the indexer served stale or corrupt data for this leaf
/// and nothing downstream should trust it.
pub fn check_indexer_hashes(asset: &Asset) -> Result<(), ReadApiError> {
    let data_hash =
        hash_metadata(&asset.metadata).map_err(|e| ReadApiError::MalformedResponse(e.to_string()))?;
    if data_hash != asset.data_hash {
        return Err(ReadApiError::MalformedResponse(format!(
            "content hash mismatch: computed {data_hash}, indexer reported {}",
            asset.data_hash
        )));
    }

    let creator_hash = hash_creators(&asset.metadata.creators)
        .map_err(|e| ReadApiError::MalformedResponse(e.to_string()))?;
    if creator_hash != asset.creator_hash {
        return Err(ReadApiError::MalformedResponse(format!(
            "creator hash mismatch: computed {creator_hash}, indexer reported {}",
            asset.creator_hash
        )));
    }

    Ok(())
}

/// JSON-RPC client for the Read API.
#[derive(Debug, Clone)]
pub struct ReadApiClient {
    http: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl ReadApiClient {
    pub fn new(url: impl Into<String>) -> Self {
        ReadApiClient {
            http: reqwest::Client::new(),
            url: url.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Fetch a compressed asset by id.
    pub async fn get_asset(&self, id: &Pubkey) -> Result<Asset, ReadApiError> {
        let result = self.request("getAsset", json!({ "id": id.to_string() })).await?;
        if result.is_null() {
            return Err(ReadApiError::NotFound(format!("asset {id}")));
        }
        parse_asset(result)
    }

    /// Fetch the current proof for an asset.
    pub async fn get_asset_proof(&self, id: &Pubkey) -> Result<AssetProof, ReadApiError> {
        let result = self
            .request("getAssetProof", json!({ "id": id.to_string() }))
            .await?;
        if result.is_null() {
            return Err(ReadApiError::NotFound(format!("proof for asset {id}")));
        }
        parse_asset_proof(result)
    }

    /// Fetch one page of the assets owned by an address.
    pub async fn get_assets_by_owner(
        &self,
        owner: &Pubkey,
        sort_by: SortBy,
        sort_direction: SortDirection,
        page: u32,
        limit: u32,
    ) -> Result<AssetList, ReadApiError> {
        let params = json!({
            "ownerAddress": owner.to_string(),
            "sortBy": {
                "sortBy": sort_by.as_str(),
                "sortDirection": sort_direction.as_str(),
            },
            "page": page,
            "limit": limit,
        });
        let result = self.request("getAssetsByOwner", params).await?;
        parse_asset_list(result)
    }

    /// Fetch an account's raw bytes (hex-encoded on the wire).
    pub async fn get_account(&self, address: &Pubkey) -> Result<Vec<u8>, ReadApiError> {
        let params = json!([address.to_string(), { "encoding": "hex" }]);
        let result = self.request("getAccountInfo", params).await?;
        parse_account_data(result, address)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ReadApiError> {
        let mut attempt = 0u32;
        loop {
            match self.request_once(method, &params).await {
                Err(ReadApiError::Transient(reason)) if attempt < self.max_retries => {
                    let backoff = INITIAL_BACKOFF * 2u32.pow(attempt);
                    warn!(
                        method,
                        attempt,
                        %reason,
                        "transient rpc failure, retrying after {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn request_once(&self, method: &str, params: &Value) -> Result<Value, ReadApiError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        debug!(method, "sending read api request");

        let response = self
            .http
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReadApiError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ReadApiError::Transient(format!("http status {status}")));
        }
        if !status.is_success() {
            return Err(ReadApiError::Rpc {
                code: i64::from(status.as_u16()),
                message: format!("http status {status}"),
            });
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| ReadApiError::MalformedResponse(format!("invalid json-rpc envelope: {e}")))?;

        if let Some(error) = envelope.error {
            return Err(ReadApiError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcAsset {
    id: String,
    content: RpcContent,
    ownership: RpcOwnership,
    compression: RpcCompression,
    royalty: RpcRoyalty,
    #[serde(default)]
    creators: Vec<RpcCreator>,
    #[serde(default)]
    grouping: Vec<RpcGrouping>,
    mutable: bool,
    #[serde(default)]
    supply: RpcSupply,
    #[serde(default)]
    uses: Option<RpcUses>,
}

#[derive(Debug, Deserialize)]
struct RpcContent {
    json_uri: String,
    metadata: RpcMetadata,
}

#[derive(Debug, Deserialize)]
struct RpcMetadata {
    name: String,
    symbol: String,
    #[serde(default)]
    token_standard: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcOwnership {
    owner: String,
    #[serde(default)]
    delegate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcCompression {
    compressed: bool,
    tree: String,
    leaf_id: u64,
    seq: u64,
    data_hash: String,
    creator_hash: String,
    #[serde(default)]
    token_program_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcRoyalty {
    basis_points: u16,
    primary_sale_happened: bool,
}

#[derive(Debug, Deserialize)]
struct RpcCreator {
    address: String,
    verified: bool,
    share: u8,
}

#[derive(Debug, Deserialize)]
struct RpcGrouping {
    group_key: String,
    group_value: String,
    #[serde(default = "default_true")]
    verified: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct RpcSupply {
    #[serde(default)]
    edition_nonce: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct RpcUses {
    use_method: String,
    remaining: u64,
    total: u64,
}

#[derive(Debug, Deserialize)]
struct RpcAssetProof {
    root: String,
    leaf: String,
    tree_id: String,
    proof: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RpcAssetList {
    total: u64,
    page: u32,
    limit: u32,
    items: Vec<RpcAsset>,
}

#[derive(Debug, Deserialize)]
struct RpcAccountInfo {
    value: Option<RpcAccount>,
}

#[derive(Debug, Deserialize)]
struct RpcAccount {
    data: String,
}

fn malformed<E: std::fmt::Display>(field: &str) -> impl Fn(E) -> ReadApiError + '_ {
    move |e| ReadApiError::MalformedResponse(format!("{field}: {e}"))
}

fn parse_pubkey(s: &str, field: &str) -> Result<Pubkey, ReadApiError> {
    s.parse().map_err(malformed(field))
}

fn parse_hash(s: &str, field: &str) -> Result<Hash, ReadApiError> {
    s.parse().map_err(malformed(field))
}

fn parse_token_standard(s: &str) -> Result<TokenStandard, ReadApiError> {
    match s {
        "NonFungible" => Ok(TokenStandard::NonFungible),
        "FungibleAsset" => Ok(TokenStandard::FungibleAsset),
        "Fungible" => Ok(TokenStandard::Fungible),
        "NonFungibleEdition" => Ok(TokenStandard::NonFungibleEdition),
        other => Err(ReadApiError::MalformedResponse(format!(
            "unknown token standard {other:?}"
        ))),
    }
}

fn parse_use_method(s: &str) -> Result<UseMethod, ReadApiError> {
    match s {
        "Burn" => Ok(UseMethod::Burn),
        "Multiple" => Ok(UseMethod::Multiple),
        "Single" => Ok(UseMethod::Single),
        other => Err(ReadApiError::MalformedResponse(format!(
            "unknown use method {other:?}"
        ))),
    }
}

fn parse_token_program_version(s: &str) -> Result<TokenProgramVersion, ReadApiError> {
    match s {
        "Original" => Ok(TokenProgramVersion::Original),
        "Token2022" => Ok(TokenProgramVersion::Token2022),
        other => Err(ReadApiError::MalformedResponse(format!(
            "unknown token program version {other:?}"
        ))),
    }
}

fn parse_asset(result: Value) -> Result<Asset, ReadApiError> {
    let raw: RpcAsset = serde_json::from_value(result).map_err(malformed("getAsset"))?;
    convert_asset(raw)
}

fn convert_asset(raw: RpcAsset) -> Result<Asset, ReadApiError> {
    let collection = raw
        .grouping
        .iter()
        .find(|group| group.group_key == "collection")
        .map(|group| {
            Ok::<_, ReadApiError>(Collection {
                verified: group.verified,
                key: parse_pubkey(&group.group_value, "grouping.group_value")?,
            })
        })
        .transpose()?;

    let uses = raw
        .uses
        .map(|uses| {
            Ok::<_, ReadApiError>(Uses {
                use_method: parse_use_method(&uses.use_method)?,
                remaining: uses.remaining,
                total: uses.total,
            })
        })
        .transpose()?;

    let token_standard = raw
        .content
        .metadata
        .token_standard
        .as_deref()
        .map(parse_token_standard)
        .transpose()?;

    let token_program_version = raw
        .compression
        .token_program_version
        .as_deref()
        .map(parse_token_program_version)
        .transpose()?
        .unwrap_or(TokenProgramVersion::Original);

    let creators = raw
        .creators
        .iter()
        .map(|creator| {
            Ok::<_, ReadApiError>(Creator {
                address: parse_pubkey(&creator.address, "creators.address")?,
                verified: creator.verified,
                share: creator.share,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let metadata = MetadataArgs {
        name: raw.content.metadata.name,
        symbol: raw.content.metadata.symbol,
        uri: raw.content.json_uri,
        seller_fee_basis_points: raw.royalty.basis_points,
        primary_sale_happened: raw.royalty.primary_sale_happened,
        is_mutable: raw.mutable,
        edition_nonce: raw.supply.edition_nonce,
        token_standard,
        collection,
        uses,
        token_program_version,
        creators,
    };
    metadata
        .validate()
        .map_err(|e| ReadApiError::MalformedResponse(e.to_string()))?;

    let delegate = raw
        .ownership
        .delegate
        .as_deref()
        .map(|delegate| parse_pubkey(delegate, "ownership.delegate"))
        .transpose()?;

    Ok(Asset {
        id: parse_pubkey(&raw.id, "id")?,
        owner: parse_pubkey(&raw.ownership.owner, "ownership.owner")?,
        delegate,
        compressed: raw.compression.compressed,
        tree: parse_pubkey(&raw.compression.tree, "compression.tree")?,
        leaf_index: raw.compression.leaf_id,
        seq: raw.compression.seq,
        data_hash: parse_hash(&raw.compression.data_hash, "compression.data_hash")?,
        creator_hash: parse_hash(&raw.compression.creator_hash, "compression.creator_hash")?,
        metadata,
    })
}

fn parse_asset_proof(result: Value) -> Result<AssetProof, ReadApiError> {
    let raw: RpcAssetProof = serde_json::from_value(result).map_err(malformed("getAssetProof"))?;

    let proof = raw
        .proof
        .iter()
        .map(|node| parse_hash(node, "proof node"))
        .collect::<Result<ProofPath, _>>()?;

    Ok(AssetProof {
        root: parse_hash(&raw.root, "root")?,
        leaf: parse_hash(&raw.leaf, "leaf")?,
        tree_id: parse_pubkey(&raw.tree_id, "tree_id")?,
        proof,
    })
}

fn parse_asset_list(result: Value) -> Result<AssetList, ReadApiError> {
    let raw: RpcAssetList = serde_json::from_value(result).map_err(malformed("getAssetsByOwner"))?;
    let items = raw
        .items
        .into_iter()
        .map(convert_asset)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AssetList {
        total: raw.total,
        page: raw.page,
        limit: raw.limit,
        items,
    })
}

fn parse_account_data(result: Value, address: &Pubkey) -> Result<Vec<u8>, ReadApiError> {
    let raw: RpcAccountInfo = serde_json::from_value(result).map_err(malformed("getAccountInfo"))?;
    let account = raw
        .value
        .ok_or_else(|| ReadApiError::NotFound(format!("account {address}")))?;
    hex::decode(&account.data).map_err(malformed("account data"))
}
