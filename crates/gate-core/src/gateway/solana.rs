//! ============================================================================
//! Solana Gateway - NFT Queries via Metaplex DAS
//! ============================================================================
//! Reads owned assets through the Digital Asset Standard read API:
//! - getAssetsByOwner for enumeration (1-based page pagination)
//! - getAsset for full trait/display resolution
//! Collection membership comes from the asset's `grouping` entries.
//! ============================================================================

use futures_util::stream;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

use super::{AssetRefStream, ChainGateway};
use crate::error::GateError;
use crate::rpc::{JsonRpcClient, RetryConfig};
use crate::types::{AssetRecord, AssetRef, Chain, DisplayMetadata};

/// Page size for getAssetsByOwner. DAS caps at 1000.
const DAS_PAGE_LIMIT: usize = 1000;

/// Gateway over a DAS-capable Solana RPC endpoint
pub struct SolanaGateway {
    rpc: JsonRpcClient,
}

impl SolanaGateway {
    pub fn new(rpc_url: &str, retry: RetryConfig) -> Result<Self, GateError> {
        Ok(Self {
            rpc: JsonRpcClient::new(rpc_url, retry)?,
        })
    }

    async fn fetch_owner_page(&self, address: &str, page: u64) -> Result<Vec<AssetRef>, GateError> {
        debug!("getAssetsByOwner {} page {}", address, page);
        let result = self
            .rpc
            .call(
                "getAssetsByOwner",
                json!({
                    "ownerAddress": address,
                    "page": page,
                    "limit": DAS_PAGE_LIMIT,
                }),
            )
            .await?;
        parse_owner_page(&result)
    }
}

#[async_trait::async_trait]
impl ChainGateway for SolanaGateway {
    fn chain(&self) -> Chain {
        Chain::Solana
    }

    fn list_owned_assets(&self, address: &str) -> AssetRefStream<'_> {
        if let Err(e) = validate_solana_address(address) {
            return Box::pin(stream::once(async move { Err(e) }));
        }

        let address = address.to_string();
        let state = (self, address, 1u64, VecDeque::new(), false);
        Box::pin(stream::try_unfold(
            state,
            |(gw, address, mut page, mut buffered, mut done)| async move {
                loop {
                    if let Some(item) = buffered.pop_front() {
                        return Ok(Some((item, (gw, address, page, buffered, done))));
                    }
                    if done {
                        return Ok(None);
                    }
                    let refs = gw.fetch_owner_page(&address, page).await?;
                    // A short or empty page ends the cursor chain
                    if refs.len() < DAS_PAGE_LIMIT {
                        done = true;
                    }
                    page += 1;
                    if refs.is_empty() {
                        return Ok(None);
                    }
                    buffered.extend(refs);
                }
            },
        ))
    }

    async fn fetch_asset(&self, asset: &AssetRef) -> Result<AssetRecord, GateError> {
        let result = self
            .rpc
            .call("getAsset", json!({ "id": asset.asset_id }))
            .await;

        match result {
            Ok(Value::Null) => Err(GateError::AssetNotFound(asset.asset_id.clone())),
            Ok(value) => parse_asset(&value),
            // DAS reports burned/unknown ids as an RPC-level error
            Err(GateError::ChainUnavailable(msg))
                if msg.to_lowercase().contains("not found") =>
            {
                Err(GateError::AssetNotFound(asset.asset_id.clone()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Solana addresses are base58-encoded 32-byte public keys.
fn validate_solana_address(address: &str) -> Result<(), GateError> {
    let invalid = || GateError::InvalidAddress {
        chain: Chain::Solana,
        address: address.to_string(),
    };
    let bytes = bs58::decode(address).into_vec().map_err(|_| invalid())?;
    if bytes.len() != 32 {
        return Err(invalid());
    }
    Ok(())
}

/// Extract lightweight references from one getAssetsByOwner result page.
fn parse_owner_page(result: &Value) -> Result<Vec<AssetRef>, GateError> {
    let items = result
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| GateError::MalformedResponse("getAssetsByOwner: no items".into()))?;

    items
        .iter()
        .map(|item| {
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| GateError::MalformedResponse("asset item without id".into()))?;
            Ok(AssetRef {
                asset_id: id.to_string(),
                chain: Chain::Solana,
            })
        })
        .collect()
}

/// Canonicalize one DAS asset payload into an AssetRecord. Raw JSON never
/// leaves this function.
fn parse_asset(value: &Value) -> Result<AssetRecord, GateError> {
    let asset_id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| GateError::MalformedResponse("getAsset: no id".into()))?
        .to_string();

    let collection_id = value
        .get("grouping")
        .and_then(Value::as_array)
        .and_then(|groups| {
            groups.iter().find_map(|g| {
                if g.get("group_key").and_then(Value::as_str) == Some("collection") {
                    g.get("group_value").and_then(Value::as_str).map(String::from)
                } else {
                    None
                }
            })
        });

    let metadata = value.get("content").and_then(|c| c.get("metadata"));

    let mut traits = BTreeMap::new();
    if let Some(attrs) = metadata
        .and_then(|m| m.get("attributes"))
        .and_then(Value::as_array)
    {
        for attr in attrs {
            let key = attr.get("trait_type").and_then(Value::as_str);
            let val = attr.get("value").map(stringify);
            if let (Some(key), Some(val)) = (key, val) {
                traits.insert(key.to_string(), val);
            }
        }
    }

    let display = DisplayMetadata {
        name: metadata
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .map(String::from),
        description: metadata
            .and_then(|m| m.get("description"))
            .and_then(Value::as_str)
            .map(String::from),
        image_uri: value
            .get("content")
            .and_then(|c| c.get("links"))
            .and_then(|l| l.get("image"))
            .and_then(Value::as_str)
            .map(String::from),
    };

    Ok(AssetRecord {
        asset_id,
        collection_id,
        // DAS has no type-tag notion of collections; grouping is the only form
        type_tag: None,
        traits,
        display,
    })
}

/// Trait values arrive as strings, numbers or booleans; traits are compared
/// as strings, so scalars are rendered without JSON quoting.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
