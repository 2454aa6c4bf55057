use crate::amount::{display_to_raw, raw_to_display};
use crate::bns::BnsResolver;
use crate::config::WalletConfig;
use crate::encoding::decode_address;
use crate::error::{Result, WalletError};

use super::rpc_client;

pub fn handle_convert(value: &str, to_raw: bool) -> Result<()> {
    if to_raw {
        println!("{}", display_to_raw(value)?);
    } else {
        println!("{}", raw_to_display(value)?);
    }
    Ok(())
}

pub async fn handle_balance(config: &WalletConfig, address: &str) -> Result<()> {
    decode_address(address)?;
    let rpc = rpc_client(config)?;
    let balances = rpc
        .get_accounts_balances(&[address.to_string()])
        .await
        .into_result()?;
    let entry = balances
        .get(address)
        .ok_or_else(|| WalletError::Protocol(format!("no balance returned for {}", address)))?;
    println!("Balance:    {} BAN ({} raw)", raw_to_display(&entry.balance)?, entry.balance);
    println!("Receivable: {} BAN", raw_to_display(&entry.pending)?);
    Ok(())
}

pub async fn handle_history(config: &WalletConfig, address: &str, count: u32) -> Result<()> {
    decode_address(address)?;
    let rpc = rpc_client(config)?;
    let history = rpc.get_account_history(address, count).await.into_result()?;
    if history.is_empty() {
        println!("No history for {}", address);
    }
    for entry in history {
        let kind = entry.subtype.as_deref().unwrap_or(&entry.entry_type);
        let amount = raw_to_display(&entry.amount).unwrap_or_else(|_| entry.amount.clone());
        println!("{:<8} {:>16} BAN  {}", kind, amount, entry.hash);
    }
    Ok(())
}

pub async fn handle_resolve(config: &WalletConfig, name: &str) -> Result<()> {
    let bns = BnsResolver::from_config(&config.bns, rpc_client(config)?)?;
    println!("{}", bns.resolve(name).await?);
    Ok(())
}

pub async fn handle_reverse(config: &WalletConfig, address: &str) -> Result<()> {
    let bns = BnsResolver::from_config(&config.bns, rpc_client(config)?)?;
    let names = bns.reverse_resolve(address).await?;
    if names.is_empty() {
        println!("No names point at {}", address);
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}
