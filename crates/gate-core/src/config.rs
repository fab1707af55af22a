//! ============================================================================
//! Configuration
//! ============================================================================
//! RPC endpoints and retry budget, overridable through NFTGATE_* environment
//! variables. `.env` loading is the binary's job (dotenvy), not the library's.
//! ============================================================================

use std::env;
use std::time::Duration;

use crate::rpc::RetryConfig;

/// Default Solana RPC endpoint. Asset enumeration needs a DAS-capable
/// provider (Helius, Triton, QuickNode, ...); the public endpoint works for
/// connectivity but most deployments will override this.
pub const DEFAULT_SOLANA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Default Sui fullnode endpoint.
pub const DEFAULT_SUI_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub solana_rpc_url: String,
    pub sui_rpc_url: String,
    pub retry: RetryConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            solana_rpc_url: DEFAULT_SOLANA_RPC_URL.to_string(),
            sui_rpc_url: DEFAULT_SUI_RPC_URL.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl GateConfig {
    /// Build from the environment:
    /// - `NFTGATE_SOLANA_RPC_URL`, `NFTGATE_SUI_RPC_URL`: endpoints
    /// - `NFTGATE_RPC_TIMEOUT_SECS`: per-call timeout
    /// - `NFTGATE_RPC_RETRIES`: retries after the first attempt
    /// Unset or unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("NFTGATE_SOLANA_RPC_URL") {
            if !url.is_empty() {
                config.solana_rpc_url = url;
            }
        }
        if let Ok(url) = env::var("NFTGATE_SUI_RPC_URL") {
            if !url.is_empty() {
                config.sui_rpc_url = url;
            }
        }
        if let Some(secs) = env_parse::<u64>("NFTGATE_RPC_TIMEOUT_SECS") {
            config.retry.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_parse::<u32>("NFTGATE_RPC_RETRIES") {
            config.retry.max_retries = retries;
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.parse().ok()
}
