use clap::Subcommand;

use super::{open_orchestrator, prompt};
use crate::amount::raw_to_display;
use crate::config::WalletConfig;
use crate::error::{Result, WalletError};
use crate::orchestrator::ApprovalOrchestrator;

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Create a new wallet
    Create,
    /// Import a wallet from a mnemonic or hex seed
    Import {
        #[arg(long)]
        mnemonic: Option<String>,
        #[arg(long)]
        seed: Option<String>,
    },
    /// List accounts with their balances
    Accounts,
    /// Derive the next account
    Add,
    /// Remove a non-primary account
    Remove {
        index: u32,
    },
    Rename {
        index: u32,
        name: String,
    },
    /// Print the backup phrase
    Export,
    ChangePassword,
    /// Receive pending blocks for an account
    Receive {
        address: String,
    },
    /// Set the inactivity auto-lock in minutes
    AutoLock {
        minutes: u64,
    },
}

#[derive(Subcommand)]
pub enum PermissionCommands {
    List,
    Revoke {
        origin: String,
    },
}

fn new_password() -> Result<String> {
    let password = prompt("Enter new password: ")?;
    if prompt("Confirm password: ")? != password {
        return Err(WalletError::Validation("passwords do not match".to_string()));
    }
    Ok(password)
}

fn unlock(orchestrator: &ApprovalOrchestrator) -> Result<String> {
    let password = prompt("Enter password: ")?;
    orchestrator.unlock(&password)?;
    Ok(password)
}

pub async fn handle_wallet_command(cmd: WalletCommands, config: &WalletConfig) -> Result<()> {
    let orchestrator = open_orchestrator(config)?;

    match cmd {
        WalletCommands::Create => {
            if orchestrator.is_initialized() {
                return Err(WalletError::Validation("a wallet already exists".to_string()));
            }
            let phrase = orchestrator.create_wallet(&new_password()?)?;
            if let Some(primary) = orchestrator.accounts()?.first() {
                println!("Wallet created. Primary account: {}", primary.address);
            }
            println!("\n[SECRET MNEMONIC] - Write this down securely and NEVER share it:");
            println!("{}", phrase);
        }
        WalletCommands::Import { mnemonic, seed } => {
            let password = new_password()?;
            let primary = match (mnemonic, seed) {
                (Some(m), None) => orchestrator.import_wallet(&m, &password)?,
                (None, Some(s)) => orchestrator.import_seed(&s, &password)?,
                _ => {
                    return Err(WalletError::Validation(
                        "pass exactly one of --mnemonic or --seed".to_string(),
                    ))
                }
            };
            println!("Wallet imported. Primary account: {}", primary.address);
        }
        WalletCommands::Accounts => {
            unlock(&orchestrator)?;
            for account in orchestrator.refresh_balances().await? {
                println!(
                    "{}\t{}\t{} BAN\t{}",
                    account.index,
                    account.address,
                    raw_to_display(&account.balance)?,
                    account.name
                );
            }
        }
        WalletCommands::Add => {
            let password = unlock(&orchestrator)?;
            let account = orchestrator.add_account(&password)?;
            println!("Added account {}: {}", account.index, account.address);
        }
        WalletCommands::Remove { index } => {
            let password = unlock(&orchestrator)?;
            let removed = orchestrator.remove_account(index, &password)?;
            println!("Removed account {} ({})", removed.index, removed.address);
        }
        WalletCommands::Rename { index, name } => {
            let password = unlock(&orchestrator)?;
            orchestrator.rename_account(index, &name, &password)?;
            println!("Account {} renamed to '{}'", index, name.trim());
        }
        WalletCommands::Export => {
            let password = prompt("Enter password: ")?;
            println!("{}", orchestrator.export_mnemonic(&password)?);
        }
        WalletCommands::ChangePassword => {
            let old = prompt("Current password: ")?;
            orchestrator.change_password(&old, &new_password()?)?;
            println!("Password changed.");
        }
        WalletCommands::Receive { address } => {
            unlock(&orchestrator)?;
            let receipt = orchestrator.receive_pending(&address).await?;
            if receipt.received.is_empty() {
                println!("Nothing to receive.");
            }
            for hash in &receipt.received {
                println!("Received {}", hash);
            }
            println!("Balance: {} BAN", raw_to_display(&receipt.balance)?);
        }
        WalletCommands::AutoLock { minutes } => {
            orchestrator.set_auto_lock_minutes(minutes)?;
            println!("Auto-lock set to {} minute(s)", minutes);
        }
    }
    Ok(())
}

pub fn handle_permission_command(cmd: PermissionCommands, config: &WalletConfig) -> Result<()> {
    let orchestrator = open_orchestrator(config)?;
    match cmd {
        PermissionCommands::List => {
            let permissions = orchestrator.list_permissions();
            if permissions.is_empty() {
                println!("No connected sites.");
            }
            for p in permissions {
                let last_used = chrono::DateTime::from_timestamp_millis(p.last_used)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                println!("{}\t{}\tlast used {}", p.origin, p.approved_accounts.join(","), last_used);
            }
        }
        PermissionCommands::Revoke { origin } => {
            if orchestrator.revoke(&origin)? {
                println!("Revoked {}", origin);
            } else {
                println!("{} was not connected", origin);
            }
        }
    }
    Ok(())
}
