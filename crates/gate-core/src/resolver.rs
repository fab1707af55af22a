//! ============================================================================
//! Access Policy Resolver - Final Allow/Deny Decisions
//! ============================================================================
//! Maps wallet state plus cached verification state onto one AccessDecision
//! per content item. Owners always bypass NFT checks. Everything else is
//! fail-closed: an unverifiable wallet is never treated as verified.
//!
//! Gallery visibility is an independent axis: a public gallery can still
//! NFT-gate the media inside it, so listing checks never consult the
//! verification pipeline.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{KeyState, VerificationCache};
use crate::types::{AccessDecision, RequiredPolicy, Visibility, WalletConnection};

pub struct AccessPolicyResolver {
    cache: Arc<VerificationCache>,
}

impl AccessPolicyResolver {
    pub fn new(cache: Arc<VerificationCache>) -> Self {
        Self { cache }
    }

    /// Decide access to a content body. Non-blocking: when the key has no
    /// cached result yet this kicks off a verification scan and reports
    /// `Verifying`; callers re-evaluate (or use
    /// [`evaluate_settled`](Self::evaluate_settled)) for the outcome.
    pub async fn evaluate(
        &self,
        content_owner: &str,
        policy: Option<&RequiredPolicy>,
        wallet: Option<&WalletConnection>,
    ) -> AccessDecision {
        match self.pre_checks(content_owner, policy, wallet) {
            PreCheck::Decided(decision) => decision,
            PreCheck::Verify(wallet, policy) => {
                let state = self
                    .cache
                    .poll(&wallet.address, wallet.chain, policy)
                    .await;
                self.map_state(state)
            }
        }
    }

    /// Like [`evaluate`](Self::evaluate) but awaits the verification
    /// outcome; never returns `Verifying`.
    pub async fn evaluate_settled(
        &self,
        content_owner: &str,
        policy: Option<&RequiredPolicy>,
        wallet: Option<&WalletConnection>,
    ) -> AccessDecision {
        match self.pre_checks(content_owner, policy, wallet) {
            PreCheck::Decided(decision) => decision,
            PreCheck::Verify(wallet, policy) => {
                let state = self
                    .cache
                    .wait(&wallet.address, wallet.chain, policy)
                    .await;
                self.map_state(state)
            }
        }
    }

    /// Listing visibility, the second policy axis. Public listings are
    /// always visible; private listings only to their owner.
    pub fn evaluate_listing(
        &self,
        visibility: Visibility,
        content_owner: &str,
        wallet: Option<&WalletConnection>,
    ) -> bool {
        match visibility {
            Visibility::Public => true,
            Visibility::Private => wallet
                .map(|w| w.address.eq_ignore_ascii_case(content_owner))
                .unwrap_or(false),
        }
    }

    fn pre_checks<'a>(
        &self,
        content_owner: &str,
        policy: Option<&'a RequiredPolicy>,
        wallet: Option<&'a WalletConnection>,
    ) -> PreCheck<'a> {
        let policy = match policy {
            // Unlocked content
            None => return PreCheck::Decided(AccessDecision::Allowed),
            Some(policy) => policy,
        };

        if let Some(wallet) = wallet {
            if !wallet.address.is_empty() && wallet.address.eq_ignore_ascii_case(content_owner) {
                debug!("owner bypass for {}", content_owner);
                return PreCheck::Decided(AccessDecision::Allowed);
            }
        }

        match wallet {
            Some(wallet) if wallet.is_connected && !wallet.address.is_empty() => {
                PreCheck::Verify(wallet, policy)
            }
            _ => PreCheck::Decided(AccessDecision::RequiresWallet),
        }
    }

    fn map_state(&self, state: KeyState) -> AccessDecision {
        match state {
            KeyState::Verifying => AccessDecision::Verifying,
            KeyState::Verified(result) if result.owns_qualifying_asset => {
                AccessDecision::Allowed
            }
            KeyState::Verified(_) => AccessDecision::RequiresAsset,
            KeyState::Failed(reason) => {
                warn!("verification failed, denying with retry: {}", reason);
                AccessDecision::Error(reason)
            }
        }
    }
}

enum PreCheck<'a> {
    Decided(AccessDecision),
    Verify(&'a WalletConnection, &'a RequiredPolicy),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayRegistry;
    use crate::testutil::{asset, MockGateway};
    use crate::types::{AssetRecord, Chain};
    use crate::verifier::AccessVerifier;

    fn resolver_with(gateway: MockGateway) -> AccessPolicyResolver {
        let registry = Arc::new(GatewayRegistry::new().register(Arc::new(gateway)));
        let cache = Arc::new(VerificationCache::new(Arc::new(AccessVerifier::new(
            registry,
        ))));
        AccessPolicyResolver::new(cache)
    }

    fn gold_policy() -> RequiredPolicy {
        RequiredPolicy::with_traits("col1", [("tier".to_string(), "gold".to_string())])
    }

    fn wallet(address: &str) -> WalletConnection {
        WalletConnection::new(address, Chain::Sui)
    }

    #[tokio::test]
    async fn test_unlocked_content_is_allowed_for_anyone() {
        let resolver = resolver_with(MockGateway::new(Chain::Sui, vec![]));
        assert_eq!(
            resolver.evaluate("0xowner", None, None).await,
            AccessDecision::Allowed
        );
        assert_eq!(
            resolver
                .evaluate("0xowner", None, Some(&wallet("0xaa")))
                .await,
            AccessDecision::Allowed
        );
    }

    #[tokio::test]
    async fn test_owner_bypass_is_case_insensitive_and_unconditional() {
        // Gateway for the policy's chain is not even registered: if the
        // owner path consulted verification this would error out.
        let registry = Arc::new(GatewayRegistry::new());
        let cache = Arc::new(VerificationCache::new(Arc::new(AccessVerifier::new(
            registry,
        ))));
        let resolver = AccessPolicyResolver::new(cache);

        let policy = gold_policy();
        assert_eq!(
            resolver
                .evaluate("0xAbCd", Some(&policy), Some(&wallet("0xabcd")))
                .await,
            AccessDecision::Allowed
        );
        assert_eq!(
            resolver
                .evaluate_settled("0xABCD", Some(&policy), Some(&wallet("0xabcd")))
                .await,
            AccessDecision::Allowed
        );
    }

    #[tokio::test]
    async fn test_anonymous_caller_requires_wallet() {
        let resolver = resolver_with(MockGateway::new(Chain::Sui, vec![]));
        assert_eq!(
            resolver.evaluate("0xowner", Some(&gold_policy()), None).await,
            AccessDecision::RequiresWallet
        );
    }

    #[tokio::test]
    async fn test_disconnected_wallet_requires_wallet() {
        let resolver = resolver_with(MockGateway::new(Chain::Sui, vec![]));
        let mut conn = wallet("0xaa");
        conn.is_connected = false;
        assert_eq!(
            resolver
                .evaluate("0xowner", Some(&gold_policy()), Some(&conn))
                .await,
            AccessDecision::RequiresWallet
        );
    }

    #[tokio::test]
    async fn test_qualifying_holder_scenario() {
        // Holder of a col1 asset with tier=gold plus an unrelated trait
        let gateway = MockGateway::new(
            Chain::Sui,
            vec![vec![asset(
                "0xb",
                "col1",
                &[("tier", "gold"), ("rarity", "rare")],
            )]],
        );
        let resolver = resolver_with(gateway);

        let decision = resolver
            .evaluate_settled("0xowner", Some(&gold_policy()), Some(&wallet("0xAA")))
            .await;
        assert_eq!(decision, AccessDecision::Allowed);
    }

    #[tokio::test]
    async fn test_wrong_trait_value_requires_asset() {
        let gateway = MockGateway::new(
            Chain::Sui,
            vec![vec![asset("0xb", "col1", &[("tier", "silver")])]],
        );
        let resolver = resolver_with(gateway);

        let decision = resolver
            .evaluate_settled("0xowner", Some(&gold_policy()), Some(&wallet("0xAA")))
            .await;
        assert_eq!(decision, AccessDecision::RequiresAsset);
    }

    #[tokio::test]
    async fn test_failed_verification_is_error_not_requires_asset() {
        let gateway = MockGateway::new(
            Chain::Sui,
            vec![vec![asset("0xb", "col1", &[("tier", "gold")])]],
        )
        .with_failing_page(0);
        let resolver = resolver_with(gateway);

        let decision = resolver
            .evaluate_settled("0xowner", Some(&gold_policy()), Some(&wallet("0xaa")))
            .await;
        assert!(matches!(decision, AccessDecision::Error(_)));
    }

    #[tokio::test]
    async fn test_first_evaluate_reports_verifying_then_settles() {
        let gateway = MockGateway::new(
            Chain::Sui,
            vec![vec![asset("0xb", "col1", &[("tier", "gold")])]],
        )
        .with_latency(std::time::Duration::from_millis(50));
        let resolver = resolver_with(gateway);
        let policy = gold_policy();
        let conn = wallet("0xaa");

        let decision = resolver
            .evaluate("0xowner", Some(&policy), Some(&conn))
            .await;
        assert_eq!(decision, AccessDecision::Verifying);

        let decision = resolver
            .evaluate_settled("0xowner", Some(&policy), Some(&conn))
            .await;
        assert_eq!(decision, AccessDecision::Allowed);
    }

    #[tokio::test]
    async fn test_listing_axis_independent_of_gating() {
        let resolver = resolver_with(MockGateway::new(Chain::Sui, vec![]));

        // Public listing visible to everyone, including anonymous callers
        assert!(resolver.evaluate_listing(Visibility::Public, "0xowner", None));
        assert!(resolver.evaluate_listing(
            Visibility::Public,
            "0xowner",
            Some(&wallet("0xaa"))
        ));

        // Private listing only to the owner
        assert!(!resolver.evaluate_listing(Visibility::Private, "0xowner", None));
        assert!(!resolver.evaluate_listing(
            Visibility::Private,
            "0xowner",
            Some(&wallet("0xaa"))
        ));
        assert!(resolver.evaluate_listing(
            Visibility::Private,
            "0xOwner",
            Some(&wallet("0xowner"))
        ));
    }

    #[tokio::test]
    async fn test_membership_by_type_tag_grants_access() {
        let record = AssetRecord {
            asset_id: "0xt".into(),
            type_tag: Some("0x7::gallery::MediaNft".into()),
            ..Default::default()
        };
        let resolver = resolver_with(MockGateway::new(Chain::Sui, vec![vec![record]]));
        let policy = RequiredPolicy::collection("0x7::gallery::MediaNft");

        let decision = resolver
            .evaluate_settled("0xowner", Some(&policy), Some(&wallet("0xaa")))
            .await;
        assert_eq!(decision, AccessDecision::Allowed);
    }
}
