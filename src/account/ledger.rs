//! Ledger submission for a single account: build, sign and publish send and
//! receive blocks through the RPC client.
//!
//! Nothing here serializes operations per account. Two concurrent sends from
//! the same account read the same frontier and one of them will be rejected
//! by the node; callers that need ordering must serialize themselves.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::types::Account;
use crate::amount::{checked_sub, parse_raw};
use crate::block::{sign_block, BlockSubtype, StateBlock};
use crate::client::RpcClient;
use crate::encoding::decode_address;
use crate::error::{Result, WalletError};

const ACCOUNT_NOT_FOUND: &str = "Account not found";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub hash: String,
    /// Balance after the send, raw.
    pub balance: String,
    pub block: StateBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveReceipt {
    /// Hashes of the published receive/open blocks, in order.
    pub received: Vec<String>,
    pub balance: String,
}

pub async fn send_banano(rpc: &RpcClient, account: &Account, destination: &str, amount_raw: &str) -> Result<SendReceipt> {
    decode_address(destination)?;
    let amount = parse_raw(amount_raw)?;
    if amount == BigUint::from(0u32) {
        return Err(WalletError::Validation("amount must be greater than zero".to_string()));
    }

    let info = rpc.get_account_info(&account.address).await.into_result()?;
    let balance = parse_raw(&info.balance)?;
    let new_balance = checked_sub(&balance, &amount)?;
    let representative = info.representative.unwrap_or_else(|| account.address.clone());

    let block = StateBlock::send(&account.address, &info.frontier, &representative, &new_balance, destination)?;
    let signed = sign_block(&block, account)?;
    let hash = rpc.process(&signed, BlockSubtype::Send.as_str()).await.into_result()?;
    info!("Sent {} raw from {} to {} ({})", amount, account.address, destination, hash);

    Ok(SendReceipt {
        hash,
        balance: new_balance.to_string(),
        block: signed,
    })
}

/// Receive up to `max` pending blocks. An account with nothing pending is a
/// success with an empty receipt; an account never seen by the node is opened
/// by its first receive.
pub async fn auto_receive_pending(
    rpc: &RpcClient,
    account: &Account,
    default_representative: Option<&str>,
    max: u32,
) -> Result<ReceiveReceipt> {
    let pending = rpc.get_pending(&account.address, max).await.into_result()?;
    if pending.is_empty() {
        return Ok(ReceiveReceipt {
            received: Vec::new(),
            balance: account.balance.clone(),
        });
    }

    let info = rpc.get_account_info(&account.address).await;
    let (mut frontier, mut balance, representative) = if info.is_node_error(ACCOUNT_NOT_FOUND) {
        let rep = default_representative.unwrap_or(&account.address).to_string();
        (None, BigUint::from(0u32), rep)
    } else {
        let info = info.into_result()?;
        let rep = info.representative.unwrap_or_else(|| account.address.clone());
        (Some(info.frontier), parse_raw(&info.balance)?, rep)
    };

    let mut received = Vec::with_capacity(pending.len());
    for item in pending {
        let amount = parse_raw(&item.amount)?;
        let new_balance = &balance + &amount;
        let subtype = if frontier.is_none() { BlockSubtype::Open } else { BlockSubtype::Receive };
        let block = StateBlock::receive(&account.address, frontier.as_deref(), &representative, &new_balance, &item.hash);
        let signed = sign_block(&block, account)?;
        match rpc.process(&signed, subtype.as_str()).await.into_result() {
            Ok(hash) => {
                info!("Received {} raw into {} ({})", amount, account.address, hash);
                frontier = Some(hash.clone());
                balance = new_balance;
                received.push(hash);
            }
            Err(e) if received.is_empty() => return Err(e),
            Err(e) => {
                warn!("Stopped receiving for {} after {} blocks: {}", account.address, received.len(), e);
                break;
            }
        }
    }

    Ok(ReceiveReceipt {
        received,
        balance: balance.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::recovery::derive_account;
    use crate::block::{verify_block_signature, ZERO_HASH};
    use crate::client::mock::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    const FRONTIER: &str = "991CF190094C00F0B68E2E5F75F6BEE95A2E0BD93CEAA4A6734DB9F19B728948";

    fn rpc(mock: &Arc<MockTransport>) -> RpcClient {
        RpcClient::new(vec!["http://node".to_string()], mock.clone())
    }

    fn opened_account_handler(body: &serde_json::Value) -> std::result::Result<serde_json::Value, String> {
        match body["action"].as_str() {
            Some("account_info") => Ok(json!({
                "frontier": FRONTIER,
                "balance": "1000",
                "representative": body["account"],
            })),
            // echo the link so every published hash is valid hex
            Some("process") => Ok(json!({ "hash": body["block"]["link"] })),
            Some("pending") => Ok(json!({ "blocks": {
                "A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1": { "amount": "5", "source": "ban_x" },
                "B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2B2": { "amount": "7", "source": "ban_y" }
            } })),
            _ => Err("unexpected".to_string()),
        }
    }

    #[tokio::test]
    async fn test_send_builds_signed_block() {
        let mock = Arc::new(MockTransport::new(|_, body| opened_account_handler(body)));
        let account = derive_account(&[4u8; 32], 0);
        let dest = derive_account(&[4u8; 32], 1);

        let receipt = send_banano(&rpc(&mock), &account, &dest.address, "400").await.unwrap();
        assert_eq!(receipt.balance, "600");
        assert_eq!(receipt.hash, receipt.block.link);
        assert_eq!(receipt.block.previous, FRONTIER);
        assert!(verify_block_signature(&receipt.block));
        assert_eq!(mock.actions_called(), vec!["account_info", "process"]);
    }

    #[tokio::test]
    async fn test_send_validates_before_network() {
        let mock = Arc::new(MockTransport::new(|_, body| opened_account_handler(body)));
        let account = derive_account(&[4u8; 32], 0);
        let dest = derive_account(&[4u8; 32], 1);

        assert!(send_banano(&rpc(&mock), &account, "ban_bogus", "1").await.is_err());
        assert!(send_banano(&rpc(&mock), &account, &dest.address, "0").await.is_err());
        assert!(send_banano(&rpc(&mock), &account, &dest.address, "1.5").await.is_err());
        assert_eq!(mock.call_count(), 0);

        let err = send_banano(&rpc(&mock), &account, &dest.address, "5000").await.unwrap_err();
        assert_eq!(err, WalletError::Validation("insufficient balance".to_string()));
        assert_eq!(mock.actions_called(), vec!["account_info"]);
    }

    #[tokio::test]
    async fn test_zero_pending_is_success() {
        let mock = Arc::new(MockTransport::new(|_, _| Ok(json!({ "blocks": "" }))));
        let account = derive_account(&[4u8; 32], 0);
        let receipt = auto_receive_pending(&rpc(&mock), &account, None, 10).await.unwrap();
        assert!(receipt.received.is_empty());
        assert_eq!(receipt.balance, "0");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_receive_chains_frontier() {
        let mock = Arc::new(MockTransport::new(|_, body| opened_account_handler(body)));
        let account = derive_account(&[4u8; 32], 0);
        let receipt = auto_receive_pending(&rpc(&mock), &account, None, 10).await.unwrap();
        assert_eq!(receipt.received.len(), 2);
        assert_eq!(receipt.balance, "1012");

        let bodies = mock.bodies();
        let processed: Vec<_> = bodies.iter().filter(|b| b["action"] == "process").collect();
        assert_eq!(processed[0]["block"]["previous"], FRONTIER);
        assert_eq!(
            processed[1]["block"]["previous"],
            "A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1"
        );
    }

    #[tokio::test]
    async fn test_unopened_account_gets_open_block() {
        let rep = derive_account(&[9u8; 32], 0).address;
        let mock = Arc::new(MockTransport::new(|_, body| match body["action"].as_str() {
            Some("account_info") => Ok(json!({ "error": "Account not found" })),
            Some("process") => Ok(json!({ "hash": "C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3C3" })),
            _ => Ok(json!({ "blocks": {
                "A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1A1": { "amount": "5" }
            } })),
        }));
        let account = derive_account(&[4u8; 32], 0);
        let receipt = auto_receive_pending(&rpc(&mock), &account, Some(&rep), 10).await.unwrap();
        assert_eq!(receipt.balance, "5");

        let bodies = mock.bodies();
        let process = bodies.iter().find(|b| b["action"] == "process").unwrap();
        assert_eq!(process["subtype"], "open");
        assert_eq!(process["block"]["previous"], ZERO_HASH);
        assert_eq!(process["block"]["representative"], rep.as_str());
    }
}
