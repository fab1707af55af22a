//! ============================================================================
//! Access Verifier - Ownership Scan Against a Required Policy
//! ============================================================================
//! Walks the caller's owned assets in chain-reported order and stops at the
//! first one that is in the required collection and carries the required
//! traits. First match wins: the answer is yes/no, and every extra candidate
//! costs one more RPC round trip.
//! ============================================================================

use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::GateError;
use crate::gateway::GatewayRegistry;
use crate::traits::traits_match;
use crate::types::{Chain, RequiredPolicy, VerificationResult};

/// Verifies NFT ownership through the registered chain gateways
pub struct AccessVerifier {
    registry: Arc<GatewayRegistry>,
}

impl AccessVerifier {
    pub fn new(registry: Arc<GatewayRegistry>) -> Self {
        Self { registry }
    }

    /// Scan `address`'s holdings on `chain` for an asset satisfying `policy`.
    ///
    /// Per-asset `AssetNotFound` fetch failures are skipped: an NFT that was
    /// burned or moved mid-scan neither counts nor denies. Any other failure
    /// aborts the whole verification; a truncated scan must never be read as
    /// "owns nothing".
    pub async fn verify(
        &self,
        address: &str,
        chain: Chain,
        policy: &RequiredPolicy,
    ) -> Result<VerificationResult, GateError> {
        if address.trim().is_empty() {
            return Err(GateError::NoWalletConnected);
        }

        let gateway = self.registry.get(chain)?;
        info!(
            "verifying {} on {} against collection {}",
            address, chain, policy.collection_id
        );

        let required = policy.required_traits.as_ref();
        let mut scanned = 0usize;
        let mut stream = gateway.list_owned_assets(address);

        while let Some(next) = stream.next().await {
            let asset_ref = next?;
            scanned += 1;

            let record = match gateway.fetch_asset(&asset_ref).await {
                Ok(record) => record,
                Err(e) if e.is_skippable() => {
                    debug!("asset {} vanished mid-scan, skipping", asset_ref.asset_id);
                    continue;
                }
                Err(e) => {
                    warn!("fetch failed for {}, aborting scan: {}", asset_ref.asset_id, e);
                    return Err(e);
                }
            };

            if !gateway.asset_in_collection(&record, &policy.collection_id) {
                continue;
            }
            if !traits_match(&record.traits, required) {
                debug!("asset {} in collection but traits do not match", record.asset_id);
                continue;
            }

            info!(
                "qualifying asset {} found after scanning {} assets",
                record.asset_id, scanned
            );
            return Ok(VerificationResult::qualified(record));
        }

        info!(
            "no qualifying asset for {} in {} ({} scanned)",
            address, policy.collection_id, scanned
        );
        Ok(VerificationResult::unqualified())
    }
}
