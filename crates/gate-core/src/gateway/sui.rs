//! ============================================================================
//! Sui Gateway - NFT Queries via Fullnode JSON-RPC
//! ============================================================================
//! Reads owned objects through the Sui fullnode read API:
//! - suix_getOwnedObjects for enumeration (cursor pagination)
//! - sui_getObject for full trait/display resolution
//! Collection membership on Sui is split across standards: Move-type tags
//! for type-per-collection NFTs, content fields for shared-type NFTs.
//! ============================================================================

use futures_util::stream;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

use super::{AssetRefStream, ChainGateway};
use crate::error::GateError;
use crate::rpc::{JsonRpcClient, RetryConfig};
use crate::types::{AssetRecord, AssetRef, Chain, DisplayMetadata};

/// Page size for suix_getOwnedObjects. Fullnodes cap at 50.
const SUI_PAGE_LIMIT: usize = 50;

/// Gateway over a Sui fullnode endpoint
pub struct SuiGateway {
    rpc: JsonRpcClient,
}

/// One decoded enumeration page
struct OwnedPage {
    refs: Vec<AssetRef>,
    next_cursor: Option<Value>,
    has_next_page: bool,
}

impl SuiGateway {
    pub fn new(rpc_url: &str, retry: RetryConfig) -> Result<Self, GateError> {
        Ok(Self {
            rpc: JsonRpcClient::new(rpc_url, retry)?,
        })
    }

    async fn fetch_owner_page(
        &self,
        address: &str,
        cursor: Option<Value>,
    ) -> Result<OwnedPage, GateError> {
        debug!("suix_getOwnedObjects {} cursor {:?}", address, cursor);
        let result = self
            .rpc
            .call(
                "suix_getOwnedObjects",
                json!([
                    address,
                    { "options": { "showType": true } },
                    cursor,
                    SUI_PAGE_LIMIT,
                ]),
            )
            .await?;
        parse_owner_page(&result)
    }
}

#[async_trait::async_trait]
impl ChainGateway for SuiGateway {
    fn chain(&self) -> Chain {
        Chain::Sui
    }

    fn list_owned_assets(&self, address: &str) -> AssetRefStream<'_> {
        if let Err(e) = validate_sui_address(address) {
            return Box::pin(stream::once(async move { Err(e) }));
        }

        let address = address.to_string();
        let state = (self, address, None::<Value>, VecDeque::new(), false);
        Box::pin(stream::try_unfold(
            state,
            |(gw, address, mut cursor, mut buffered, mut done)| async move {
                loop {
                    if let Some(item) = buffered.pop_front() {
                        return Ok(Some((item, (gw, address, cursor, buffered, done))));
                    }
                    if done {
                        return Ok(None);
                    }
                    let page = gw.fetch_owner_page(&address, cursor.take()).await?;
                    if page.has_next_page {
                        cursor = page.next_cursor;
                    } else {
                        done = true;
                    }
                    if page.refs.is_empty() && done {
                        return Ok(None);
                    }
                    buffered.extend(page.refs);
                }
            },
        ))
    }

    async fn fetch_asset(&self, asset: &AssetRef) -> Result<AssetRecord, GateError> {
        let result = self
            .rpc
            .call(
                "sui_getObject",
                json!([
                    asset.asset_id,
                    { "showType": true, "showContent": true, "showDisplay": true },
                ]),
            )
            .await?;
        parse_object(&result)
    }
}

/// Sui addresses are 0x-prefixed hex, at most 32 bytes. Short forms like
/// `0x2` are accepted the way fullnodes accept them, by left-padding to a
/// whole byte before decoding.
fn validate_sui_address(address: &str) -> Result<(), GateError> {
    let invalid = || GateError::InvalidAddress {
        chain: Chain::Sui,
        address: address.to_string(),
    };
    let hex_part = address.strip_prefix("0x").ok_or_else(invalid)?;
    if hex_part.is_empty() || hex_part.len() > 64 {
        return Err(invalid());
    }
    let padded;
    let normalized = if hex_part.len() % 2 == 1 {
        padded = format!("0{}", hex_part);
        &padded
    } else {
        hex_part
    };
    hex::decode(normalized).map_err(|_| invalid())?;
    Ok(())
}

/// Decode one suix_getOwnedObjects page into references plus cursor state.
fn parse_owner_page(result: &Value) -> Result<OwnedPage, GateError> {
    let data = result
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| GateError::MalformedResponse("suix_getOwnedObjects: no data".into()))?;

    let refs = data
        .iter()
        .map(|entry| {
            let id = entry
                .get("data")
                .and_then(|d| d.get("objectId"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    GateError::MalformedResponse("owned object without objectId".into())
                })?;
            Ok(AssetRef {
                asset_id: id.to_string(),
                chain: Chain::Sui,
            })
        })
        .collect::<Result<Vec<_>, GateError>>()?;

    let next_cursor = result.get("nextCursor").filter(|c| !c.is_null()).cloned();
    let has_next_page = result
        .get("hasNextPage")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    // A next page with no cursor would send enumeration back to page one
    // and loop forever; refuse the page instead.
    if has_next_page && next_cursor.is_none() {
        return Err(GateError::MalformedResponse(
            "suix_getOwnedObjects: hasNextPage without nextCursor".into(),
        ));
    }

    Ok(OwnedPage {
        refs,
        next_cursor,
        has_next_page,
    })
}

/// Canonicalize one sui_getObject payload. Deleted and unknown objects come
/// back as an in-band status, not a transport error.
fn parse_object(result: &Value) -> Result<AssetRecord, GateError> {
    if let Some(err) = result.get("error") {
        let code = err.get("code").and_then(Value::as_str).unwrap_or("");
        let id = err
            .get("object_id")
            .or_else(|| err.get("objectId"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return match code {
            "notExist" | "deleted" | "notExists" => {
                Err(GateError::AssetNotFound(id.to_string()))
            }
            other => Err(GateError::MalformedResponse(format!(
                "sui_getObject error status: {}",
                other
            ))),
        };
    }

    let data = result
        .get("data")
        .ok_or_else(|| GateError::MalformedResponse("sui_getObject: no data".into()))?;

    let asset_id = data
        .get("objectId")
        .and_then(Value::as_str)
        .ok_or_else(|| GateError::MalformedResponse("sui_getObject: no objectId".into()))?
        .to_string();

    let type_tag = data.get("type").and_then(Value::as_str).map(String::from);

    let fields = data
        .get("content")
        .and_then(|c| c.get("fields"))
        .cloned()
        .unwrap_or(Value::Null);

    let collection_id = extract_collection_field(&fields);
    let traits = extract_traits(&fields);

    let display_data = data.get("display").and_then(|d| d.get("data"));
    let display = DisplayMetadata {
        name: display_str(display_data, "name")
            .or_else(|| fields.get("name").and_then(Value::as_str).map(String::from)),
        description: display_str(display_data, "description").or_else(|| {
            fields
                .get("description")
                .and_then(Value::as_str)
                .map(String::from)
        }),
        image_uri: display_str(display_data, "image_url").or_else(|| {
            fields
                .get("url")
                .and_then(Value::as_str)
                .map(String::from)
        }),
    };

    Ok(AssetRecord {
        asset_id,
        collection_id,
        type_tag,
        traits,
        display,
    })
}

fn display_str(display: Option<&Value>, key: &str) -> Option<String> {
    display?
        .get(key)
        .and_then(Value::as_str)
        .map(String::from)
}

/// Collection membership stored as a content field. Accepts a plain string
/// or an ID wrapper struct, under either common field name.
fn extract_collection_field(fields: &Value) -> Option<String> {
    for key in ["collection_id", "collection"] {
        let value = match fields.get(key) {
            Some(v) => v,
            None => continue,
        };
        if let Some(s) = value.as_str() {
            return Some(s.to_string());
        }
        // ID wrapper: { "fields": { "id": "0x..." } } or { "id": "0x..." }
        if let Some(s) = value
            .get("fields")
            .and_then(|f| f.get("id"))
            .and_then(Value::as_str)
        {
            return Some(s.to_string());
        }
        if let Some(s) = value.get("id").and_then(Value::as_str) {
            return Some(s.to_string());
        }
    }
    None
}

/// Trait attributes live either in a plain `attributes` object or in a Move
/// VecMap rendered as `{ fields: { contents: [ { fields: { key, value } } ] } }`.
fn extract_traits(fields: &Value) -> BTreeMap<String, String> {
    let mut traits = BTreeMap::new();
    let attributes = match fields.get("attributes") {
        Some(a) => a,
        None => return traits,
    };

    if let Some(map) = attributes.as_object() {
        if let Some(contents) = map
            .get("fields")
            .and_then(|f| f.get("contents"))
            .and_then(Value::as_array)
        {
            for entry in contents {
                let pair = entry.get("fields").unwrap_or(entry);
                let key = pair.get("key").and_then(Value::as_str);
                let value = pair.get("value").and_then(Value::as_str);
                if let (Some(k), Some(v)) = (key, value) {
                    traits.insert(k.to_string(), v.to_string());
                }
            }
        } else {
            for (k, v) in map {
                if let Some(s) = v.as_str() {
                    traits.insert(k.clone(), s.to_string());
                }
            }
        }
    }
    traits
}
