//! ============================================================================
//! Error Taxonomy
//! ============================================================================
//! Every failure the engine can surface. Fail-closed is the governing rule:
//! any ambiguity about ownership resolves to "not verified", never to
//! "assume verified".
//! ============================================================================

use crate::types::Chain;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    /// Verification was requested with no connected wallet / empty address.
    #[error("no wallet connected")]
    NoWalletConnected,

    /// The chain RPC endpoint could not be reached after the retry budget
    /// was exhausted. Transient; callers may retry explicitly.
    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    /// A single asset id no longer resolves (burned or transferred away
    /// mid-scan). Non-fatal for verification: the scan skips it.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// A policy named a chain with no registered gateway. Programmer or
    /// configuration error, not a runtime condition.
    #[error("unsupported chain: {0}")]
    UnsupportedChain(Chain),

    /// The address is not well-formed for the target chain. Rejected before
    /// any RPC call is spent on it.
    #[error("invalid {chain} address: {address}")]
    InvalidAddress { chain: Chain, address: String },

    /// The RPC endpoint answered, but the payload did not have the shape the
    /// chain's API documents. Distinct from transport failure.
    #[error("malformed rpc response: {0}")]
    MalformedResponse(String),

    /// A verification for this key is already in flight. Informational:
    /// coalesced callers observe this, it is not a failure.
    #[error("verification already in flight")]
    VerificationInFlight,
}

impl GateError {
    /// Whether a scan should continue past this error (per-asset skip)
    /// or abort as a whole.
    pub fn is_skippable(&self) -> bool {
        matches!(self, GateError::AssetNotFound(_))
    }
}
