//! ============================================================================
//! Gateway Module - Chain-Specific Read-Only Query Backends
//! ============================================================================
//! One gateway per supported chain, each wrapping that chain's public
//! JSON-RPC query API behind a common interface:
//! - SolanaGateway: Metaplex DAS (getAssetsByOwner / getAsset)
//! - SuiGateway: Sui fullnode (suix_getOwnedObjects / sui_getObject)
//! ============================================================================

mod solana;
mod sui;

pub use solana::SolanaGateway;
pub use sui::SuiGateway;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::types::{AssetRecord, AssetRef, Chain};

/// Lazy, finite, non-restartable sequence of owned-asset references.
/// A failed page terminates the sequence with an error so a truncated scan
/// can never be mistaken for "wallet owns nothing further".
pub type AssetRefStream<'a> = BoxStream<'a, Result<AssetRef, GateError>>;

/// Read-only query capability for one chain. Constructed with an explicit
/// RPC client dependency so tests can substitute doubles.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// The chain this gateway serves.
    fn chain(&self) -> Chain;

    /// Enumerate every asset reference owned by `address`, transparently
    /// following the provider's cursor/page chain until it reports no
    /// further pages. Order is the chain-reported order.
    fn list_owned_assets(&self, address: &str) -> AssetRefStream<'_>;

    /// Resolve full trait and display data for one reference.
    /// `AssetNotFound` when the id no longer resolves.
    async fn fetch_asset(&self, asset: &AssetRef) -> Result<AssetRecord, GateError>;

    /// Collection membership test. NFT standards are heterogeneous even on
    /// one chain: membership may live in the object's type tag or in a
    /// content field, so both forms are checked.
    fn asset_in_collection(&self, record: &AssetRecord, collection_id: &str) -> bool {
        record.type_tag.as_deref() == Some(collection_id)
            || record.collection_id.as_deref() == Some(collection_id)
    }
}

/// Owns one gateway per chain. The single point where a chain value is
/// dispatched to an implementation.
pub struct GatewayRegistry {
    gateways: HashMap<Chain, Arc<dyn ChainGateway>>,
}

impl GatewayRegistry {
    /// Empty registry; gateways are added with [`register`](Self::register).
    pub fn new() -> Self {
        Self {
            gateways: HashMap::new(),
        }
    }

    /// Build gateways for every supported chain from configuration.
    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        let mut registry = Self::new();
        for chain in [Chain::Solana, Chain::Sui] {
            let gateway: Arc<dyn ChainGateway> = match chain {
                Chain::Solana => Arc::new(SolanaGateway::new(
                    &config.solana_rpc_url,
                    config.retry.clone(),
                )?),
                Chain::Sui => Arc::new(SuiGateway::new(
                    &config.sui_rpc_url,
                    config.retry.clone(),
                )?),
            };
            registry = registry.register(gateway);
        }
        Ok(registry)
    }

    /// Register a gateway under the chain it reports. Replaces any previous
    /// gateway for that chain.
    pub fn register(mut self, gateway: Arc<dyn ChainGateway>) -> Self {
        self.gateways.insert(gateway.chain(), gateway);
        self
    }

    /// Look up the gateway for a chain. `UnsupportedChain` is a
    /// configuration error: a policy named a chain nobody registered.
    pub fn get(&self, chain: Chain) -> Result<Arc<dyn ChainGateway>, GateError> {
        self.gateways
            .get(&chain)
            .cloned()
            .ok_or(GateError::UnsupportedChain(chain))
    }
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}
