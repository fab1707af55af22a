//! ============================================================================
//! Verification Cache - Coalescing Result Store
//! ============================================================================
//! Per-key state machine: Absent -> Verifying -> {Verified | Failed}.
//! One underlying chain scan per key at a time: concurrent readers subscribe
//! to the in-flight outcome over a watch channel instead of issuing duplicate
//! scans. The scan runs on a spawned task, so a caller abandoning its await
//! never cancels the scan for other subscribers.
//!
//! No TTL: results live until wallet disconnect, chain switch (whole-cache
//! eviction) or an explicit per-key recheck. Verification is re-triggered
//! by events, not timers, to avoid hammering chain RPC endpoints.
//! ============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::types::{Chain, RequiredPolicy, VerificationResult};
use crate::verifier::AccessVerifier;

/// Cache key. Address and chain are both part of the key: the same raw
/// address string can in principle be meaningful to more than one chain,
/// and a result must never leak across either.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub address: String,
    pub chain: Chain,
    pub collection_id: String,
    pub traits_signature: String,
}

impl CacheKey {
    pub fn for_policy(address: &str, chain: Chain, policy: &RequiredPolicy) -> Self {
        Self {
            address: address.to_string(),
            chain,
            collection_id: policy.collection_id.clone(),
            traits_signature: policy.traits_signature(),
        }
    }
}

/// Externally visible state of one cache key
#[derive(Debug, Clone)]
pub enum KeyState {
    /// A scan is in flight for this key
    Verifying,
    /// Scan completed; result is served from cache until invalidated
    Verified(VerificationResult),
    /// Scan failed; readable as a denial with the reason attached
    Failed(String),
}

#[derive(Debug, Clone)]
enum Outcome {
    Verified(VerificationResult),
    Failed(String),
}

impl Outcome {
    fn to_state(&self) -> KeyState {
        match self {
            Outcome::Verified(result) => KeyState::Verified(result.clone()),
            Outcome::Failed(reason) => KeyState::Failed(reason.clone()),
        }
    }
}

enum Entry {
    Verifying {
        rx: watch::Receiver<Option<Outcome>>,
        /// Ties the entry to the scan task that created it. A completion may
        /// only settle the entry of its own generation: after an eviction the
        /// key can hold a newer scan's Verifying entry, and the evicted
        /// scan's outcome must not land on top of it.
        generation: u64,
    },
    Settled { outcome: Outcome, cached_at: i64 },
}

/// Cache entry counts by state, plus the age anchor of the oldest settled
/// entry (unix seconds) for callers that want to layer staleness bounds on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub verifying: usize,
    pub verified: usize,
    pub failed: usize,
    pub oldest_settled_at: Option<i64>,
}

/// The only mutable shared state in the engine. Mutated exclusively by scan
/// completions and explicit invalidation events.
pub struct VerificationCache {
    verifier: Arc<AccessVerifier>,
    entries: Arc<RwLock<HashMap<CacheKey, Entry>>>,
    generation: AtomicU64,
}

impl VerificationCache {
    pub fn new(verifier: Arc<AccessVerifier>) -> Self {
        Self {
            verifier,
            entries: Arc::new(RwLock::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Current state of the key, starting a scan if none exists. Returns
    /// immediately; use [`wait`](Self::wait) to await the outcome.
    pub async fn poll(
        &self,
        address: &str,
        chain: Chain,
        policy: &RequiredPolicy,
    ) -> KeyState {
        match self.ensure_started(address, chain, policy).await {
            Subscription::Settled(outcome) => outcome.to_state(),
            Subscription::InFlight(_) => KeyState::Verifying,
        }
    }

    /// Settled state of the key, coalescing with any in-flight scan.
    /// Never returns `Verifying`.
    pub async fn wait(
        &self,
        address: &str,
        chain: Chain,
        policy: &RequiredPolicy,
    ) -> KeyState {
        match self.ensure_started(address, chain, policy).await {
            Subscription::Settled(outcome) => outcome.to_state(),
            Subscription::InFlight(mut rx) => loop {
                let settled = rx.borrow_and_update().clone();
                if let Some(outcome) = settled {
                    return outcome.to_state();
                }
                if rx.changed().await.is_err() {
                    warn!("verification task dropped before settling");
                    return KeyState::Failed("verification task dropped".into());
                }
            },
        }
    }

    /// Non-starting read. `Ok(None)` when the key is absent and
    /// `Err(VerificationInFlight)` while a scan is running.
    pub async fn try_get(
        &self,
        address: &str,
        chain: Chain,
        policy: &RequiredPolicy,
    ) -> Result<Option<VerificationResult>, crate::error::GateError> {
        let key = CacheKey::for_policy(address, chain, policy);
        let entries = self.entries.read().await;
        match entries.get(&key) {
            None => Ok(None),
            Some(Entry::Verifying { .. }) => Err(crate::error::GateError::VerificationInFlight),
            Some(Entry::Settled { outcome, .. }) => match outcome {
                Outcome::Verified(result) => Ok(Some(result.clone())),
                Outcome::Failed(reason) => Err(crate::error::GateError::ChainUnavailable(
                    reason.clone(),
                )),
            },
        }
    }

    /// Drop any settled state for the key and verify again. Coalesces with
    /// an already-running scan rather than stacking a second one.
    pub async fn recheck(
        &self,
        address: &str,
        chain: Chain,
        policy: &RequiredPolicy,
    ) -> KeyState {
        let key = CacheKey::for_policy(address, chain, policy);
        {
            let mut entries = self.entries.write().await;
            if let Some(Entry::Settled { .. }) = entries.get(&key) {
                entries.remove(&key);
                debug!("recheck evicted settled entry for {}", key.address);
            }
        }
        self.wait(address, chain, policy).await
    }

    /// Whole-cache eviction, used on wallet disconnect and chain switch.
    /// Every key returns to Absent; in-flight scans finish for their current
    /// subscribers but do not re-enter the cache.
    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        if count > 0 {
            info!("evicted {} verification entries", count);
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let mut stats = CacheStats {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries.values() {
            match entry {
                Entry::Verifying { .. } => stats.verifying += 1,
                Entry::Settled { outcome, cached_at } => {
                    match outcome {
                        Outcome::Verified(_) => stats.verified += 1,
                        Outcome::Failed(_) => stats.failed += 1,
                    }
                    stats.oldest_settled_at = Some(match stats.oldest_settled_at {
                        Some(oldest) => oldest.min(*cached_at),
                        None => *cached_at,
                    });
                }
            }
        }
        stats
    }

    async fn ensure_started(
        &self,
        address: &str,
        chain: Chain,
        policy: &RequiredPolicy,
    ) -> Subscription {
        let key = CacheKey::for_policy(address, chain, policy);
        let mut entries = self.entries.write().await;

        match entries.get(&key) {
            Some(Entry::Settled { outcome, .. }) => {
                debug!("cache hit for {} on {}", key.address, key.chain);
                return Subscription::Settled(outcome.clone());
            }
            Some(Entry::Verifying { rx, .. }) => {
                debug!("coalescing with in-flight scan for {}", key.address);
                return Subscription::InFlight(rx.clone());
            }
            None => {}
        }

        let (tx, rx) = watch::channel(None);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            key.clone(),
            Entry::Verifying {
                rx: rx.clone(),
                generation,
            },
        );
        drop(entries);

        let verifier = self.verifier.clone();
        let cache_entries = self.entries.clone();
        let policy = policy.clone();
        let address = address.to_string();
        tokio::spawn(async move {
            let outcome = match verifier.verify(&address, chain, &policy).await {
                Ok(result) => Outcome::Verified(result),
                Err(e) => Outcome::Failed(e.to_string()),
            };

            {
                let mut entries = cache_entries.write().await;
                // Install only if this task's own Verifying entry survived.
                // After an eviction the key stays Absent, and a newer scan's
                // Verifying entry (different generation) is left untouched.
                let own_entry = matches!(
                    entries.get(&key),
                    Some(Entry::Verifying { generation: g, .. }) if *g == generation
                );
                if own_entry {
                    entries.insert(
                        key,
                        Entry::Settled {
                            outcome: outcome.clone(),
                            cached_at: chrono::Utc::now().timestamp(),
                        },
                    );
                }
            }

            let _ = tx.send(Some(outcome));
        });

        Subscription::InFlight(rx)
    }
}

enum Subscription {
    Settled(Outcome),
    InFlight(watch::Receiver<Option<Outcome>>),
}
