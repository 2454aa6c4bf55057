pub mod keys;
pub mod ops;
pub mod wallet;

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::sync::Arc;

use crate::bns::BnsResolver;
use crate::client::RpcClient;
use crate::config::WalletConfig;
use crate::error::{Result, WalletError};
use crate::orchestrator::{ApprovalOrchestrator, OrchestratorConfig};
use crate::storage::{KeyValueStore, SledStore};

#[derive(Parser)]
#[command(name = "rust_banano")]
#[command(about = "Banano wallet engine CLI", long_about = None)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "wallet.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a new 24-word recovery phrase
    Mnemonic,
    /// Derive account addresses from a mnemonic or hex seed
    Derive {
        #[arg(long)]
        mnemonic: Option<String>,
        #[arg(long)]
        seed: Option<String>,
        #[arg(long, default_value_t = 0)]
        index: u32,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Verify a signed message
    Verify {
        /// Public key (hex) or ban_ address of the signer
        #[arg(long)]
        signer: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        signature: String,
        #[arg(long)]
        origin: String,
    },
    /// Convert between raw and display units
    Convert {
        value: String,
        /// Treat VALUE as display units and print raw
        #[arg(long)]
        to_raw: bool,
    },
    /// Query an account balance
    Balance {
        address: String,
    },
    /// Show recent account history
    History {
        address: String,
        #[arg(long, default_value_t = 20)]
        count: u32,
    },
    /// Resolve a BNS name to an address
    Resolve {
        name: String,
    },
    /// List BNS names pointing at an address
    Reverse {
        address: String,
    },
    /// Local wallet management
    Wallet {
        #[command(subcommand)]
        cmd: wallet::WalletCommands,
    },
    /// Connected-site permissions
    Permissions {
        #[command(subcommand)]
        cmd: wallet::PermissionCommands,
    },
}

pub fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout()
        .flush()
        .map_err(|e| WalletError::Storage(format!("stdout: {}", e)))?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .map_err(|e| WalletError::Storage(format!("stdin: {}", e)))?;
    Ok(line.trim().to_string())
}

pub fn rpc_client(config: &WalletConfig) -> Result<Arc<RpcClient>> {
    Ok(Arc::new(RpcClient::from_config(&config.rpc)?))
}

pub fn open_orchestrator(config: &WalletConfig) -> Result<ApprovalOrchestrator> {
    let storage: Arc<dyn KeyValueStore> = Arc::new(SledStore::open(&config.wallet.db_path)?);
    let rpc = rpc_client(config)?;
    let bns = BnsResolver::from_config(&config.bns, rpc.clone())?;
    ApprovalOrchestrator::new(storage, rpc, bns, OrchestratorConfig::from(config))
}

pub async fn run(command: Commands, config: &WalletConfig) -> Result<()> {
    match command {
        Commands::Mnemonic => keys::handle_mnemonic(),
        Commands::Derive { mnemonic, seed, index, count } => {
            keys::handle_derive(mnemonic.as_deref(), seed.as_deref(), index, count)
        }
        Commands::Verify { signer, message, signature, origin } => {
            keys::handle_verify(&signer, &message, &signature, &origin)
        }
        Commands::Convert { value, to_raw } => ops::handle_convert(&value, to_raw),
        Commands::Balance { address } => ops::handle_balance(config, &address).await,
        Commands::History { address, count } => ops::handle_history(config, &address, count).await,
        Commands::Resolve { name } => ops::handle_resolve(config, &name).await,
        Commands::Reverse { address } => ops::handle_reverse(config, &address).await,
        Commands::Wallet { cmd } => wallet::handle_wallet_command(cmd, config).await,
        Commands::Permissions { cmd } => wallet::handle_permission_command(cmd, config),
    }
}
