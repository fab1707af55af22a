// ============================================================================
// nftgate — CLI for the NFT-gated access engine
// ============================================================================
// Usage:
//   nftgate assets --chain sui --address 0x...        List owned assets
//   nftgate check --chain solana --address ... \
//       --collection COL [--trait tier=gold] [--owner ADDR]
//                                                      Run an access check
// Exit code 0 only when the decision is Allowed.
// ============================================================================

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;

use gate_core::{
    AccessDecision, AccessPolicyResolver, AccessVerifier, Chain, GateConfig, GateError,
    GatewayRegistry, RequiredPolicy, VerificationCache, WalletConnection,
};

/// NFT-gated access inspection tool
#[derive(Parser)]
#[command(name = "nftgate", version, about = "Check NFT-gated access against live chain state")]
struct Cli {
    /// Emit machine-readable JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate every asset a wallet owns, with collection and traits
    Assets {
        /// Chain: solana or sui
        #[arg(long)]
        chain: String,

        /// Wallet address to enumerate
        #[arg(long)]
        address: String,
    },

    /// Run the full access check for a wallet against a policy
    Check {
        /// Chain: solana or sui
        #[arg(long)]
        chain: String,

        /// Caller wallet address
        #[arg(long)]
        address: String,

        /// Required collection id (type tag or collection field value)
        #[arg(long)]
        collection: String,

        /// Required trait as key=value; repeatable
        #[arg(long = "trait", value_name = "KEY=VALUE")]
        traits: Vec<String>,

        /// Content owner address (owners always pass)
        #[arg(long)]
        owner: Option<String>,
    },
}

fn parse_chain(s: &str) -> Result<Chain> {
    Chain::parse(s).ok_or_else(|| anyhow!("Unknown chain '{}'. Valid values: solana, sui", s))
}

fn parse_traits(pairs: &[String]) -> Result<Option<BTreeMap<String, String>>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut traits = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Trait '{}' is not in key=value form", pair))?;
        traits.insert(key.to_string(), value.to_string());
    }
    Ok(Some(traits))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = GateConfig::from_env();
    let registry = Arc::new(GatewayRegistry::from_config(&config)?);

    match cli.command {
        Commands::Assets { chain, address } => {
            cmd_assets(&registry, parse_chain(&chain)?, &address, cli.json).await
        }
        Commands::Check {
            chain,
            address,
            collection,
            traits,
            owner,
        } => {
            cmd_check(
                registry,
                parse_chain(&chain)?,
                &address,
                &collection,
                parse_traits(&traits)?,
                owner.as_deref(),
                cli.json,
            )
            .await
        }
    }
}

async fn cmd_assets(
    registry: &GatewayRegistry,
    chain: Chain,
    address: &str,
    json: bool,
) -> Result<()> {
    let gateway = registry.get(chain)?;
    let mut records = Vec::new();
    let mut stream = gateway.list_owned_assets(address);

    while let Some(next) = stream.next().await {
        let asset_ref = next?;
        match gateway.fetch_asset(&asset_ref).await {
            Ok(record) => records.push(record),
            // Burned or transferred between the listing and the fetch
            Err(GateError::AssetNotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No assets found for {} on {}.", address, chain);
        return Ok(());
    }

    println!("{:<46}  {:<30}  {}", "ASSET", "COLLECTION", "TRAITS");
    println!("{}", "-".repeat(100));
    for record in &records {
        let collection = record
            .collection_id
            .as_deref()
            .or(record.type_tag.as_deref())
            .unwrap_or("-");
        let traits = record
            .traits
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{:<46}  {:<30}  {}", record.asset_id, collection, traits);
    }
    println!("\n{} assets on {}", records.len(), chain);

    Ok(())
}

async fn cmd_check(
    registry: Arc<GatewayRegistry>,
    chain: Chain,
    address: &str,
    collection: &str,
    traits: Option<BTreeMap<String, String>>,
    owner: Option<&str>,
    json: bool,
) -> Result<()> {
    let cache = Arc::new(VerificationCache::new(Arc::new(AccessVerifier::new(
        registry,
    ))));
    let resolver = AccessPolicyResolver::new(cache);

    let policy = RequiredPolicy {
        collection_id: collection.to_string(),
        required_traits: traits,
    };
    let wallet = WalletConnection::new(address, chain);

    let decision = resolver
        .evaluate_settled(owner.unwrap_or(""), Some(&policy), Some(&wallet))
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        match &decision {
            AccessDecision::Allowed => println!("ALLOWED"),
            AccessDecision::RequiresAsset => println!(
                "DENIED: no asset in collection {} with the required traits",
                policy.collection_id
            ),
            AccessDecision::RequiresWallet => println!("DENIED: no wallet connected"),
            AccessDecision::Verifying => println!("PENDING: verification in flight"),
            AccessDecision::Error(reason) => {
                println!("ERROR: could not verify ({}), retry later", reason)
            }
        }
    }

    if decision != AccessDecision::Allowed {
        std::process::exit(1);
    }
    Ok(())
}
