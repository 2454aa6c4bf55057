//! Cryptographic account store.
//!
//! - Deterministic account derivation from a 32-byte seed (BIP39 backup phrase)
//! - Password-encrypted wallet record (PBKDF2 + AES-256-GCM)
//! - Message and block signing for unlocked accounts
//! - Ledger submission (send / auto-receive) with local balance bookkeeping

pub mod types;
pub mod store;
pub mod ledger;
pub mod auth;
pub mod recovery;

pub use types::{Account, AccountSummary, StoredWalletRecord};
pub use store::AccountStore;
pub use ledger::{ReceiveReceipt, SendReceipt};
pub use recovery::RecoveryKey;
