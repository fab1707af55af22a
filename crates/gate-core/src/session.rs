//! ============================================================================
//! Wallet Session - Single-Writer Connection Slot
//! ============================================================================
//! Holds the one active WalletConnection. The wallet-provider collaborator is
//! the only writer; the engine reads it and evicts the verification cache on
//! connection-identity changes. Chain switches replace the slot atomically:
//! there is never a state where two chains are connected at once.
//! ============================================================================

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::cache::VerificationCache;
use crate::types::{Chain, WalletConnection};

pub struct WalletSession {
    slot: Arc<RwLock<Option<WalletConnection>>>,
    cache: Arc<VerificationCache>,
}

impl WalletSession {
    pub fn new(cache: Arc<VerificationCache>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
            cache,
        }
    }

    /// The current connection, if any
    pub async fn current(&self) -> Option<WalletConnection> {
        self.slot.read().await.clone()
    }

    /// Install a new connection. Evicts all cached verification results when
    /// the wallet identity (address or chain) changed; reconnecting the same
    /// wallet on the same chain keeps them.
    pub async fn connect(&self, address: impl Into<String>, chain: Chain) {
        let connection = WalletConnection::new(address, chain);
        let previous = {
            let mut slot = self.slot.write().await;
            slot.replace(connection.clone())
        };

        let identity_changed = previous
            .map(|prev| prev.address != connection.address || prev.chain != connection.chain)
            .unwrap_or(false);
        if identity_changed {
            info!("wallet identity changed, evicting verification cache");
            self.cache.invalidate_all().await;
        }
        info!("wallet connected: {} on {}", connection.address, connection.chain);
    }

    /// Switch the active connection to another chain. The slot is replaced
    /// wholesale and the cache evicted.
    pub async fn switch_chain(&self, chain: Chain) {
        let address = match self.current().await {
            Some(conn) if conn.chain != chain => conn.address,
            _ => return,
        };
        info!("switching active chain to {}", chain);
        self.connect(address, chain).await;
    }

    /// Tear down the session: clear the slot and every cached result.
    pub async fn disconnect(&self) {
        let had_connection = {
            let mut slot = self.slot.write().await;
            slot.take().is_some()
        };
        if had_connection {
            info!("wallet disconnected, evicting verification cache");
            self.cache.invalidate_all().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayRegistry;
    use crate::testutil::{asset, MockGateway};
    use crate::types::RequiredPolicy;
    use crate::verifier::AccessVerifier;

    fn session_and_cache() -> (WalletSession, Arc<VerificationCache>) {
        let gateway = MockGateway::new(
            Chain::Sui,
            vec![vec![asset("0xb", "col1", &[("tier", "gold")])]],
        );
        let registry = Arc::new(GatewayRegistry::new().register(Arc::new(gateway)));
        let cache = Arc::new(VerificationCache::new(Arc::new(AccessVerifier::new(
            registry,
        ))));
        (WalletSession::new(cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_lifecycle() {
        let (session, _) = session_and_cache();
        assert!(session.current().await.is_none());

        session.connect("0xaa", Chain::Sui).await;
        let conn = session.current().await.unwrap();
        assert_eq!(conn.address, "0xaa");
        assert_eq!(conn.chain, Chain::Sui);
        assert!(conn.is_connected);

        session.disconnect().await;
        assert!(session.current().await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_evicts_cache() {
        let (session, cache) = session_and_cache();
        let policy = RequiredPolicy::collection("col1");

        session.connect("0xaa", Chain::Sui).await;
        cache.wait("0xaa", Chain::Sui, &policy).await;
        assert_eq!(cache.stats().await.verified, 1);

        session.disconnect().await;
        assert_eq!(cache.stats().await.total, 0);
    }

    #[tokio::test]
    async fn test_chain_switch_replaces_slot_and_evicts() {
        let (session, cache) = session_and_cache();
        let policy = RequiredPolicy::collection("col1");

        session.connect("0xaa", Chain::Sui).await;
        cache.wait("0xaa", Chain::Sui, &policy).await;

        session.switch_chain(Chain::Solana).await;
        let conn = session.current().await.unwrap();
        assert_eq!(conn.chain, Chain::Solana);
        assert_eq!(conn.address, "0xaa");
        assert_eq!(cache.stats().await.total, 0);
    }

    #[tokio::test]
    async fn test_reconnecting_same_wallet_keeps_cache() {
        let (session, cache) = session_and_cache();
        let policy = RequiredPolicy::collection("col1");

        session.connect("0xaa", Chain::Sui).await;
        cache.wait("0xaa", Chain::Sui, &policy).await;

        session.connect("0xaa", Chain::Sui).await;
        assert_eq!(cache.stats().await.verified, 1);
    }

    #[tokio::test]
    async fn test_connecting_different_wallet_evicts() {
        let (session, cache) = session_and_cache();
        let policy = RequiredPolicy::collection("col1");

        session.connect("0xaa", Chain::Sui).await;
        cache.wait("0xaa", Chain::Sui, &policy).await;

        session.connect("0xbb", Chain::Sui).await;
        assert_eq!(cache.stats().await.total, 0);
    }
}
