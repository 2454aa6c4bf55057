// RPC client for the ledger's JSON action API, with endpoint failover
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::transport::{HttpTransport, RpcTransport};
use super::types::{
    AccountBalance, AccountInfo, BalancesReply, FailureKind, HistoryEntry, HistoryReply, PendingBlock, PendingReply,
    ProcessReply, RpcResponse,
};
use crate::block::StateBlock;
use crate::config::RpcConfig;
use crate::error::Result;

pub struct RpcClient {
    endpoints: Vec<String>,
    current: AtomicUsize,
    transport: Arc<dyn RpcTransport>,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn new(endpoints: Vec<String>, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            endpoints,
            current: AtomicUsize::new(0),
            transport,
            request_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &RpcConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(config.endpoints.clone(), Arc::new(transport)))
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Endpoint the next call starts from.
    pub fn current_endpoint(&self) -> Option<&str> {
        if self.endpoints.is_empty() {
            return None;
        }
        let idx = self.current.load(Ordering::SeqCst) % self.endpoints.len();
        Some(&self.endpoints[idx])
    }

    /// Send one action, trying each endpoint at most once starting from the
    /// current one. Transport failures rotate to the next endpoint; a node
    /// `error` reply is returned as-is.
    pub async fn call(&self, body: Value) -> RpcResponse<Value> {
        let count = self.endpoints.len();
        if count == 0 {
            return RpcResponse::failure(FailureKind::Transport, "no RPC endpoints configured");
        }
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let action = body["action"].as_str().unwrap_or("?").to_string();
        let start = self.current.load(Ordering::SeqCst);
        let mut last_error = String::new();

        for attempt in 0..count {
            let idx = (start + attempt) % count;
            let endpoint = &self.endpoints[idx];
            debug!("rpc #{} {} -> {}", id, action, endpoint);
            match self.transport.post(endpoint, &body).await {
                Ok(reply) => {
                    if let Some(error) = reply.get("error") {
                        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
                        return RpcResponse::failure(FailureKind::Node, message);
                    }
                    return RpcResponse::ok(reply);
                }
                Err(e) => {
                    warn!("RPC endpoint {} failed for {}: {}", endpoint, action, e);
                    self.current.store((idx + 1) % count, Ordering::SeqCst);
                    last_error = e;
                }
            }
        }

        RpcResponse::failure(
            FailureKind::Transport,
            format!("all {} RPC endpoints failed: {}", count, last_error),
        )
    }

    async fn call_as<T: DeserializeOwned>(&self, body: Value) -> RpcResponse<T> {
        let response = self.call(body).await;
        match response.data {
            Some(value) if response.success => match serde_json::from_value::<T>(value) {
                Ok(data) => RpcResponse::ok(data),
                Err(e) => RpcResponse::failure(FailureKind::Malformed, format!("Failed to parse response: {}", e)),
            },
            _ => RpcResponse {
                success: false,
                data: None,
                error: response.error,
                kind: response.kind,
            },
        }
    }

    pub async fn get_accounts_balances(&self, accounts: &[String]) -> RpcResponse<BTreeMap<String, AccountBalance>> {
        let body = json!({ "action": "accounts_balances", "accounts": accounts });
        self.call_as::<BalancesReply>(body).await.map(|r| r.balances)
    }

    pub async fn get_account_info(&self, account: &str) -> RpcResponse<AccountInfo> {
        let body = json!({ "action": "account_info", "account": account, "representative": "true" });
        self.call_as(body).await
    }

    pub async fn get_pending(&self, account: &str, count: u32) -> RpcResponse<Vec<PendingBlock>> {
        let body = json!({
            "action": "pending",
            "account": account,
            "count": count.to_string(),
            "source": "true",
        });
        self.call_as::<PendingReply>(body).await.map(|r| {
            r.blocks
                .into_iter()
                .map(|(hash, mut block)| {
                    block.hash = hash;
                    block
                })
                .collect()
        })
    }

    pub async fn get_account_history(&self, account: &str, count: u32) -> RpcResponse<Vec<HistoryEntry>> {
        let body = json!({
            "action": "account_history",
            "account": account,
            "count": count.to_string(),
            "raw": "true",
        });
        self.call_as::<HistoryReply>(body).await.map(|r| r.history)
    }

    /// Publish a signed block; returns its hash.
    pub async fn process(&self, block: &StateBlock, subtype: &str) -> RpcResponse<String> {
        let body = json!({
            "action": "process",
            "json_block": "true",
            "subtype": subtype,
            "block": block,
        });
        self.call_as::<ProcessReply>(body).await.map(|r| r.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockTransport;

    fn client(mock: &Arc<MockTransport>, endpoints: &[&str]) -> RpcClient {
        RpcClient::new(endpoints.iter().map(|e| e.to_string()).collect(), mock.clone())
    }

    #[tokio::test]
    async fn test_failover_reaches_third_endpoint() {
        let mock = Arc::new(MockTransport::new(|endpoint, _| match endpoint {
            "http://c" => Ok(json!({ "balances": { "ban_1": { "balance": "10", "pending": "0" } } })),
            _ => Err("connection refused".to_string()),
        }));
        let rpc = client(&mock, &["http://a", "http://b", "http://c"]);

        let response = rpc.get_accounts_balances(&["ban_1".to_string()]).await;
        assert!(response.success);
        assert_eq!(response.data.unwrap()["ban_1"].balance, "10");
        assert_eq!(mock.endpoints_called(), vec!["http://a", "http://b", "http://c"]);
        assert_eq!(rpc.current_endpoint(), Some("http://c"));

        // the healthy endpoint is tried first next time
        rpc.get_accounts_balances(&["ban_1".to_string()]).await;
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test]
    async fn test_all_endpoints_failing_is_tagged_failure() {
        let mock = Arc::new(MockTransport::new(|_, _| Err("timeout".to_string())));
        let rpc = client(&mock, &["http://a", "http://b", "http://c"]);

        let response = rpc.get_account_info("ban_1").await;
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.kind, Some(FailureKind::Transport));
        assert!(response.error.unwrap().contains("all 3 RPC endpoints failed"));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_node_error_does_not_rotate() {
        let mock = Arc::new(MockTransport::new(|_, _| Ok(json!({ "error": "Account not found" }))));
        let rpc = client(&mock, &["http://a", "http://b"]);

        let response = rpc.get_account_info("ban_1").await;
        assert!(response.is_node_error("Account not found"));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(rpc.current_endpoint(), Some("http://a"));
    }

    #[tokio::test]
    async fn test_pending_fills_hashes_and_handles_empty() {
        let mock = Arc::new(MockTransport::new(|_, body| {
            if body["account"] == "ban_empty" {
                Ok(json!({ "blocks": "" }))
            } else {
                Ok(json!({ "blocks": { "AA11": { "amount": "5", "source": "ban_src" } } }))
            }
        }));
        let rpc = client(&mock, &["http://a"]);

        let blocks = rpc.get_pending("ban_full", 10).await.into_result().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].hash, "AA11");
        assert!(rpc.get_pending("ban_empty", 10).await.into_result().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_endpoints() {
        let mock = Arc::new(MockTransport::new(|_, _| Ok(json!({}))));
        let rpc = client(&mock, &[]);
        assert!(!rpc.get_account_info("ban_1").await.success);
        assert_eq!(mock.call_count(), 0);
    }
}
