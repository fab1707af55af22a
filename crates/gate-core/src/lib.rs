//! ============================================================================
//! GATE-CORE: Multi-Chain NFT-Gated Access Control
//! ============================================================================
//! Decides whether a wallet may read a piece of gated media content, based on
//! cryptographic proof of NFT ownership:
//! - Chain gateways for Solana (Metaplex DAS) and Sui (fullnode JSON-RPC)
//! - Ownership scan with exact trait matching, first match wins
//! - Coalescing verification cache, evicted on wallet events
//! - Policy resolver producing Allow/Deny/RequiresWallet decisions
//! ============================================================================

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod resolver;
pub mod rpc;
pub mod session;
pub mod traits;
pub mod types;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export the main types for convenience
pub use cache::{CacheKey, CacheStats, KeyState, VerificationCache};
pub use config::GateConfig;
pub use error::GateError;
pub use gateway::{ChainGateway, GatewayRegistry, SolanaGateway, SuiGateway};
pub use resolver::AccessPolicyResolver;
pub use session::WalletSession;
pub use traits::traits_match;
pub use types::{
    AccessDecision, AssetRecord, AssetRef, Chain, DisplayMetadata, RequiredPolicy, Visibility,
    VerificationResult, WalletConnection,
};
pub use verifier::AccessVerifier;
