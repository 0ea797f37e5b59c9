//! Relay Claim Builder
//!
//! Builds a signed gasless claim for a swap and prints it as JSON, ready to hand to
//! a relayer. The claimer key is read from the environment variable named by
//! `ethereum.private_key_env` in the configuration.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin relay_claim -- \
//!   --config config/swapd.toml \
//!   --swap swap.json \
//!   --secret 0x0101010101010101010101010101010101010101010101010101010101010101
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use swapd::chains::EvmRpcClient;
use swapd::config::SwapdConfig;
use swapd::crypto::EthKey;
use swapd::relayer::create_relay_claim_request;
use swapd::swap::SwapRecord;
use swapd::types::Hash;

#[derive(Parser, Debug)]
#[command(name = "relay_claim")]
#[command(about = "Build a signed relay claim request for a swap")]
struct Args {
    /// Path to configuration file (default: config/swapd.toml or SWAPD_CONFIG_PATH env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Path to the swap record JSON file
    #[arg(short, long)]
    swap: String,

    /// Claim secret (32 bytes, hex)
    #[arg(long)]
    secret: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let config = SwapdConfig::load_from_path(args.config.as_deref())?;
    let contracts = config.contract_addresses()?;

    let swap_json = std::fs::read_to_string(&args.swap)
        .with_context(|| format!("Failed to read swap record {}", args.swap))?;
    let swap: SwapRecord =
        serde_json::from_str(&swap_json).context("Failed to parse swap record JSON")?;
    swap.validate()?;

    let secret_hex = args.secret.trim().strip_prefix("0x").unwrap_or(args.secret.trim());
    let secret_bytes = hex::decode(secret_hex).context("--secret contains invalid hex")?;
    if secret_bytes.len() != 32 {
        anyhow::bail!("--secret must be 32 bytes (64 hex chars)");
    }
    let secret = Hash::from_slice(&secret_bytes);

    let key = EthKey::from_env(&config.ethereum.private_key_env)?;
    info!("Claimer address: {:#x}", key.address());
    info!("Swap id: {:#x}", swap.id());

    let chain = EvmRpcClient::new(&config.ethereum.rpc_url)?;
    let request = create_relay_claim_request(
        &key,
        &chain,
        contracts.swap_creator,
        contracts.forwarder,
        &swap,
        &secret,
        config.timeouts().io,
    )
    .await?;

    if request.chain_id != config.ethereum.chain_id {
        anyhow::bail!(
            "Node reports chain id {}, configuration expects {}",
            request.chain_id,
            config.ethereum.chain_id
        );
    }

    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
