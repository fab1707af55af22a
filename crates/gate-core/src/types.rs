//! ============================================================================
//! Core Types for NFT-Gated Access
//! ============================================================================
//! Defines wallet, asset, policy and decision types shared across the engine.
//! These types are serialized to JSON for the CLI and any frontend consumer.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Supported chains. Closed set: adding a chain means adding a gateway
/// implementation and a match arm in the registry, nothing stringly-typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    Solana,
    Sui,
}

impl Chain {
    /// Parse the lowercase wire/CLI name for a chain
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "solana" => Some(Chain::Solana),
            "sui" => Some(Chain::Sui),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Sui => "sui",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one active wallet session. Exactly one of these exists per session;
/// switching chains replaces the whole value, never mutates half of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConnection {
    pub address: String,
    pub chain: Chain,
    pub is_connected: bool,
}

impl WalletConnection {
    pub fn new(address: impl Into<String>, chain: Chain) -> Self {
        Self {
            address: address.into(),
            chain,
            is_connected: true,
        }
    }
}

/// Lightweight reference to an owned on-chain object, as returned by the
/// enumeration pass. Only the id is guaranteed; full data requires a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub asset_id: String,
    pub chain: Chain,
}

/// Display metadata attached to an asset (name/description/image).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_uri: Option<String>,
}

/// Fully resolved asset: id, collection membership markers, traits and
/// display data. Ephemeral: fetched on demand, never persisted beyond the
/// verification call that needed it.
///
/// Collection membership is heterogeneous across NFT standards even on a
/// single chain: some assets carry it as a type tag, others as a field in
/// the object content. Both are kept so the gateway can apply its OR-rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_id: String,
    /// Collection membership stored as a field/grouping on the object.
    pub collection_id: Option<String>,
    /// Collection membership implied by the object's on-chain type tag.
    pub type_tag: Option<String>,
    /// Trait key/value attributes. Keys unique, insertion order irrelevant.
    pub traits: BTreeMap<String, String>,
    pub display: DisplayMetadata,
}

/// Access policy attached to a content item by the gallery collaborator.
/// Immutable for the lifetime of a verification call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredPolicy {
    pub collection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_traits: Option<BTreeMap<String, String>>,
}

impl RequiredPolicy {
    pub fn collection(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            required_traits: None,
        }
    }

    pub fn with_traits(
        collection_id: impl Into<String>,
        traits: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            collection_id: collection_id.into(),
            required_traits: Some(traits.into_iter().collect()),
        }
    }

    /// Canonical signature of the required traits, used in cache keys.
    /// Sorted so `{a:1,b:2}` and `{b:2,a:1}` key identically; empty and
    /// absent trait sets are equivalent (both mean "no constraint").
    pub fn traits_signature(&self) -> String {
        match &self.required_traits {
            None => String::new(),
            Some(traits) => {
                // BTreeMap iterates sorted by key already
                let mut parts = Vec::with_capacity(traits.len());
                for (k, v) in traits {
                    parts.push(format!("{}={}", k, v));
                }
                parts.join("\u{1f}")
            }
        }
    }
}

/// Outcome of one verification scan. Cached per
/// (address, chain, collection, traits-signature); never merged, always
/// overwritten wholesale on re-verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub owns_qualifying_asset: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_asset: Option<AssetRecord>,
}

impl VerificationResult {
    pub fn qualified(asset: AssetRecord) -> Self {
        Self {
            owns_qualifying_asset: true,
            matched_asset: Some(asset),
        }
    }

    pub fn unqualified() -> Self {
        Self {
            owns_qualifying_asset: false,
            matched_asset: None,
        }
    }

    /// Traits of the matched asset, if any.
    pub fn traits(&self) -> Option<&BTreeMap<String, String>> {
        self.matched_asset.as_ref().map(|a| &a.traits)
    }
}

/// Final policy decision for a content item. Derived, never stored:
/// recomputed from wallet + cache state on every evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum AccessDecision {
    /// Caller may read the content body.
    Allowed,
    /// No wallet connected; prompt a connect action.
    RequiresWallet,
    /// Wallet verified but holds no qualifying asset; prompt acquire/mint.
    RequiresAsset,
    /// A verification scan is in flight; show a pending indicator.
    Verifying,
    /// Verification could not complete. Distinct from RequiresAsset so the
    /// user is offered a retry, not told to buy an NFT over an RPC timeout.
    Error(String),
}

/// Gallery listing visibility. Independent axis from per-item NFT gating:
/// a public gallery can still gate the media inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}
