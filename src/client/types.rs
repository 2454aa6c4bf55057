use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, WalletError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Every endpoint failed to answer.
    Transport,
    /// A node answered with an `error` field.
    Node,
    /// A node answered with something we could not read.
    Malformed,
}

/// Tagged result shape of every client call; failures never escape as panics
/// or transport errors.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub kind: Option<FailureKind>,
}

impl<T> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, kind: None }
    }

    pub fn failure(kind: FailureKind, error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()), kind: Some(kind) }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RpcResponse<U> {
        RpcResponse { success: self.success, data: self.data.map(f), error: self.error, kind: self.kind }
    }

    pub fn is_node_error(&self, message: &str) -> bool {
        self.kind == Some(FailureKind::Node) && self.error.as_deref() == Some(message)
    }

    pub fn into_result(self) -> Result<T> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => {
                let message = self.error.unwrap_or_else(|| "empty response".to_string());
                Err(match self.kind {
                    Some(FailureKind::Transport) => WalletError::Network(message),
                    _ => WalletError::Protocol(message),
                })
            }
        }
    }
}

/// Nodes encode empty maps and lists as `""`.
pub(crate) fn empty_string_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) if s.is_empty() => Ok(T::default()),
        serde_json::Value::Null => Ok(T::default()),
        other => serde_json::from_value(other).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AccountBalance {
    pub balance: String,
    #[serde(default, alias = "receivable")]
    pub pending: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub(crate) struct BalancesReply {
    #[serde(default, deserialize_with = "empty_string_as_default")]
    pub balances: BTreeMap<String, AccountBalance>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AccountInfo {
    pub frontier: String,
    pub balance: String,
    #[serde(default)]
    pub representative: Option<String>,
    #[serde(default)]
    pub open_block: Option<String>,
    #[serde(default)]
    pub block_count: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PendingBlock {
    #[serde(default)]
    pub hash: String,
    pub amount: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub(crate) struct PendingReply {
    #[serde(default, deserialize_with = "empty_string_as_default")]
    pub blocks: BTreeMap<String, PendingBlock>,
}

/// One entry of `account_history` in raw mode.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub amount: String,
    pub hash: String,
    #[serde(default)]
    pub representative: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub local_timestamp: Option<String>,
}

impl HistoryEntry {
    pub fn is_send(&self) -> bool {
        match self.entry_type.as_str() {
            "state" => self.subtype.as_deref() == Some("send"),
            other => other == "send",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub(crate) struct HistoryReply {
    #[serde(default, deserialize_with = "empty_string_as_default")]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub(crate) struct ProcessReply {
    pub hash: String,
}
