//! Page-context message envelopes.
//!
//! Requests are parsed into [`ProviderRequest`] and validated here, so handlers
//! only ever see well-formed parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::amount::parse_raw;
use crate::block::StateBlock;
use crate::bns::parse_name;
use crate::encoding::decode_address;
use crate::error::{Result, WalletError};

/// `source` tag on envelopes sent by the page-side provider.
pub const PAGE_SOURCE: &str = "banano-provider-page";
/// `source` tag on envelopes the wallet sends back.
pub const WALLET_SOURCE: &str = "banano-provider-wallet";

pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderRequest {
    Connect {
        #[serde(default, rename = "onlyIfTrusted")]
        only_if_trusted: bool,
    },
    Disconnect,
    GetAccounts,
    GetBalance {
        #[serde(default)]
        address: Option<String>,
    },
    SignMessage {
        message: String,
        #[serde(default)]
        account: Option<String>,
    },
    SignBlock {
        block: StateBlock,
        #[serde(default)]
        account: Option<String>,
    },
    SendTransaction {
        to: String,
        /// Raw units.
        amount: String,
        #[serde(default)]
        account: Option<String>,
    },
    ResolveBns {
        name: String,
    },
    ReverseResolveBns {
        address: String,
    },
}

const KNOWN_TYPES: &[&str] = &[
    "CONNECT",
    "DISCONNECT",
    "GET_ACCOUNTS",
    "GET_BALANCE",
    "SIGN_MESSAGE",
    "SIGN_BLOCK",
    "SEND_TRANSACTION",
    "RESOLVE_BNS",
    "REVERSE_RESOLVE_BNS",
];

fn check_address(address: &str) -> Result<()> {
    decode_address(address).map(|_| ())
}

fn check_optional_address(address: &Option<String>) -> Result<()> {
    match address {
        Some(a) => check_address(a),
        None => Ok(()),
    }
}

impl ProviderRequest {
    pub fn validate(&self) -> Result<()> {
        match self {
            ProviderRequest::Connect { .. } | ProviderRequest::Disconnect | ProviderRequest::GetAccounts => Ok(()),
            ProviderRequest::GetBalance { address } => check_optional_address(address),
            ProviderRequest::SignMessage { message, account } => {
                if message.is_empty() || message.len() > MAX_MESSAGE_LEN {
                    return Err(WalletError::Validation(format!(
                        "message must be 1-{} bytes",
                        MAX_MESSAGE_LEN
                    )));
                }
                check_optional_address(account)
            }
            ProviderRequest::SignBlock { block, account } => {
                check_optional_address(account)?;
                if let Some(account) = account {
                    if account != &block.account {
                        return Err(WalletError::Validation("block account does not match account".to_string()));
                    }
                }
                block.hash().map(|_| ())
            }
            ProviderRequest::SendTransaction { to, amount, account } => {
                check_address(to)?;
                check_optional_address(account)?;
                if parse_raw(amount)? == num_bigint::BigUint::from(0u32) {
                    return Err(WalletError::Validation("amount must be greater than zero".to_string()));
                }
                Ok(())
            }
            ProviderRequest::ResolveBns { name } => parse_name(name).map(|_| ()),
            ProviderRequest::ReverseResolveBns { address } => check_address(address),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub id: String,
    pub request: ProviderRequest,
}

/// Parse and validate a raw page message.
///
/// `Ok(None)` means the message is not addressed to the wallet and gets no
/// reply. Errors carry the request id when one could be read.
pub fn parse_envelope(raw: &Value) -> std::result::Result<Option<RequestEnvelope>, (String, WalletError)> {
    if raw.get("source").and_then(Value::as_str) != Some(PAGE_SOURCE) {
        return Ok(None);
    }
    let id = match raw.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err((String::new(), WalletError::Validation("missing request id".to_string()))),
    };
    let kind = raw.get("type").and_then(Value::as_str).unwrap_or_default();
    if !KNOWN_TYPES.contains(&kind) {
        return Err((id, WalletError::UnsupportedMethod(kind.to_string())));
    }
    let request: ProviderRequest = serde_json::from_value(raw.clone())
        .map_err(|e| (id.clone(), WalletError::Validation(format!("invalid params: {}", e))))?;
    request.validate().map_err(|e| (id.clone(), e))?;
    Ok(Some(RequestEnvelope { id, request }))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

impl ProviderResponse {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None, code: None }
    }

    pub fn err(error: &WalletError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            code: Some(error.code()),
        }
    }
}

impl From<Result<Value>> for ProviderResponse {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(&e),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEnvelope {
    pub source: String,
    pub id: String,
    pub response: ProviderResponse,
}

impl ResponseEnvelope {
    pub fn new(id: String, response: ProviderResponse) -> Self {
        Self {
            source: WALLET_SOURCE.to_string(),
            id,
            response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use serde_json::json;

    const ADDR: &str = "ban_3i1aq1cchnmbn9x5rsbap8b15akfh7wj7pwskuzi7ahz8oq6cobd99d4r3b7";

    fn envelope(body: Value) -> Value {
        let mut value = json!({ "source": PAGE_SOURCE, "id": "req-1" });
        for (k, v) in body.as_object().unwrap() {
            value[k] = v.clone();
        }
        value
    }

    #[test]
    fn test_parses_typed_requests() {
        let parsed = parse_envelope(&envelope(json!({ "type": "CONNECT", "onlyIfTrusted": true })))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.id, "req-1");
        assert_eq!(parsed.request, ProviderRequest::Connect { only_if_trusted: true });

        let parsed = parse_envelope(&envelope(json!({ "type": "SEND_TRANSACTION", "to": ADDR, "amount": "100" })))
            .unwrap()
            .unwrap();
        assert!(matches!(parsed.request, ProviderRequest::SendTransaction { account: None, .. }));

        let parsed = parse_envelope(&envelope(json!({ "type": "RESOLVE_BNS", "name": "satoshi.ban" })))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.request, ProviderRequest::ResolveBns { name: "satoshi.ban".into() });
    }

    #[test]
    fn test_foreign_source_ignored() {
        assert_eq!(parse_envelope(&json!({ "source": "other", "id": "1", "type": "CONNECT" })).unwrap(), None);
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let (id, err) = parse_envelope(&envelope(json!({ "type": "MINE_BLOCKS" }))).unwrap_err();
        assert_eq!(id, "req-1");
        assert_eq!(err.code(), codes::UNSUPPORTED_METHOD);
    }

    #[test]
    fn test_bad_params_are_invalid_params() {
        let cases = vec![
            json!({ "type": "SIGN_MESSAGE" }),
            json!({ "type": "SIGN_MESSAGE", "message": "" }),
            json!({ "type": "SEND_TRANSACTION", "to": "ban_nope", "amount": "1" }),
            json!({ "type": "SEND_TRANSACTION", "to": ADDR, "amount": "1.5" }),
            json!({ "type": "SEND_TRANSACTION", "to": ADDR, "amount": "0" }),
            json!({ "type": "GET_BALANCE", "address": "xrb_1" }),
            json!({ "type": "RESOLVE_BNS", "name": "no-dot" }),
        ];
        for case in cases {
            let (_, err) = parse_envelope(&envelope(case.clone())).unwrap_err();
            assert_eq!(err.code(), codes::INVALID_PARAMS, "{}", case);
        }
    }

    #[test]
    fn test_response_shape() {
        let envelope = ResponseEnvelope::new("7".into(), ProviderResponse::err(&WalletError::UserRejected));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["source"], WALLET_SOURCE);
        assert_eq!(json["response"]["success"], false);
        assert_eq!(json["response"]["code"], 4001);
        assert!(json["response"].get("data").is_none());
    }
}
