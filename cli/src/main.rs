//! ChainHistory CLI: reconstruct vault and savings timelines from a node.
//!
//! # Commands
//! ```text
//! chainhistory vault    <ID>       [--rpc-url <URL>] [--network <NAME>] [--json]
//! chainhistory savings  <ADDRESS>  [--rpc-url <URL>] [--network <NAME>] [--json]
//! chainhistory networks
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use chainhistory_core::Subject;
use chainhistory_evm::EventHistory;
use chainhistory_rpc::{HttpRpcClient, RpcRecordSource};

mod config;
mod logging;
mod output;

use config::{CliConfig, ENV_NETWORK, ENV_RPC_URL};

#[derive(Parser)]
#[command(
    name = "chainhistory",
    about = "Reconstruct vault and savings timelines from chain logs",
    long_about = "
ChainHistory CLI: rebuilds the ordered event history of a vault or a
savings account from raw logs served by a JSON-RPC node.

ENVIRONMENT VARIABLES:
  CHAINHISTORY_RPC_URL    JSON-RPC endpoint
  CHAINHISTORY_NETWORK    Network name or chain id (default: mainnet)
",
    version
)]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint (overrides config and environment)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Network name or chain id (overrides config and environment)
    #[arg(long, global = true)]
    network: Option<String>,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timeline of a vault by its numeric id
    Vault {
        id: u64,
    },
    /// Timeline of a savings account by proxy address
    Savings {
        address: String,
    },
    /// List known networks
    Networks,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.apply_env();
    config.apply_overrides(cli.network.clone(), cli.rpc_url.clone());
    if cli.verbose {
        config.log.level = "debug".into();
    }
    logging::init_tracing(&config.log)?;

    match &cli.command {
        Commands::Vault { id } => cmd_timeline(&config, Subject::Vault(*id), cli.json).await,
        Commands::Savings { address } => {
            let account: Address = address
                .parse()
                .with_context(|| format!("invalid address '{address}'"))?;
            cmd_timeline(&config, Subject::Savings(account), cli.json).await
        }
        Commands::Networks => cmd_networks(&config, cli.json),
    }
}

async fn cmd_timeline(config: &CliConfig, subject: Subject, json: bool) -> Result<()> {
    let profile = config.profile()?;
    let url = config
        .rpc_url
        .clone()
        .ok_or_else(|| anyhow!("no RPC endpoint: pass --rpc-url or set {ENV_RPC_URL}"))?;

    let client = HttpRpcClient::new(&url, config.rpc.http_config())?;
    let source = RpcRecordSource::new(client, &profile.contracts)
        .with_max_block_range(config.rpc.max_block_range);
    let history = EventHistory::new(Arc::new(source), profile);

    tracing::info!(%subject, network = %history.profile().name, %url, "reconstructing");
    let timeline = history
        .reconstruct(subject.clone())
        .await
        .with_context(|| format!("reconstructing {subject}"))?;

    if json {
        println!("{}", output::render_json(&timeline)?);
    } else {
        print!("{}", output::render_table(&timeline));
    }
    Ok(())
}

fn cmd_networks(config: &CliConfig, json: bool) -> Result<()> {
    let profiles = config.all_profiles();
    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    println!("Known networks (select with --network or {ENV_NETWORK}):\n");
    for p in &profiles {
        let window = p.window();
        let marker = if p.name == config.network { "*" } else { " " };
        println!("{marker} {}", p.name);
        println!("    position manager  {:#x}", p.contracts.cdp_manager);
        println!("    vat               {:#x}", p.contracts.vat);
        println!("    dai adapter       {:#x}", p.contracts.dai_join);
        println!("    savings pot       {:#x}", p.contracts.pot);
        println!("    scan start        {}", window.scan_start_block());
        for c in &window.cutovers {
            println!(
                "    {:?} cutover  block {} ({:#x} -> {:#x})",
                c.kind, c.block, c.before, c.after
            );
        }
        println!();
    }
    Ok(())
}
