use thiserror::Error;

/// Standardized provider response codes shared with the page context.
pub mod codes {
    pub const USER_REJECTED: i32 = 4001;
    /// Not one of the EIP-1193 codes. Pages that only know 4001 should treat
    /// it as a refusal.
    pub const APPROVAL_TIMEOUT: i32 = 4002;
    pub const UNAUTHORIZED: i32 = 4100;
    pub const UNSUPPORTED_METHOD: i32 = 4200;
    pub const DISCONNECTED: i32 = 4900;
    pub const CHAIN_DISCONNECTED: i32 = 4901;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authorization error: {0}")]
    Authorization(String),
    #[error("Wallet is locked")]
    Locked,
    #[error("Crypto error: {0}")]
    Crypto(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Name not found: {0}")]
    NameNotFound(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("User rejected the request")]
    UserRejected,
    /// Reported as [`codes::APPROVAL_TIMEOUT`] rather than `USER_REJECTED`,
    /// connect included.
    #[error("Approval request timed out")]
    ApprovalTimeout,
    #[error("Request cancelled: provider disconnected")]
    Cancelled,
    #[error("request not found")]
    RequestNotFound,
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),
}

impl WalletError {
    /// Wire code reported in response envelopes.
    pub fn code(&self) -> i32 {
        match self {
            WalletError::UserRejected => codes::USER_REJECTED,
            WalletError::ApprovalTimeout => codes::APPROVAL_TIMEOUT,
            WalletError::Authorization(_) | WalletError::Locked => codes::UNAUTHORIZED,
            WalletError::UnsupportedMethod(_) => codes::UNSUPPORTED_METHOD,
            WalletError::Cancelled => codes::DISCONNECTED,
            WalletError::Network(_) => codes::CHAIN_DISCONNECTED,
            WalletError::Validation(_)
            | WalletError::NameNotFound(_)
            | WalletError::RequestNotFound => codes::INVALID_PARAMS,
            WalletError::Crypto(_)
            | WalletError::Protocol(_)
            | WalletError::Storage(_)
            | WalletError::Serialization(_) => codes::INTERNAL_ERROR,
        }
    }

    pub fn invalid_password() -> Self {
        WalletError::Crypto("invalid password".to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
