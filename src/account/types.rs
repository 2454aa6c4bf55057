//! Account type definitions

use serde::{Deserialize, Serialize};

use crate::crypto::KeyPair;

/// A derived account. Identity is `(seed, index)`; everything else is a
/// pure function of it except `balance` and `name`.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub index: u32,
    pub address: String,
    pub public_key: String,
    private_key: String,
    /// Raw units, decimal string.
    pub balance: String,
    pub name: String,
}

impl Account {
    pub fn from_keypair(index: u32, keypair: &KeyPair) -> Self {
        Self {
            index,
            address: keypair.address(),
            public_key: keypair.public_key_hex(),
            private_key: keypair.private_key_hex(),
            balance: "0".to_string(),
            name: Self::default_name(index),
        }
    }

    pub fn default_name(index: u32) -> String {
        format!("Account {}", index + 1)
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    pub fn is_primary(&self) -> bool {
        self.index == 0
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            index: self.index,
            address: self.address.clone(),
            public_key: self.public_key.clone(),
            balance: self.balance.clone(),
            name: self.name.clone(),
        }
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("index", &self.index)
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("balance", &self.balance)
            .field("name", &self.name)
            .finish()
    }
}

/// Secret-free view of an account, safe to hand to the UI or a page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub index: u32,
    pub address: String,
    pub public_key: String,
    pub balance: String,
    pub name: String,
}

/// The at-rest wallet record. Ciphertexts and salt are hex encoded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoredWalletRecord {
    pub encrypted_accounts: String,
    pub encrypted_seed: String,
    pub salt: String,
    pub is_initialized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_private_key() {
        let account = Account::from_keypair(0, &KeyPair::derive(&[9u8; 32], 0));
        let printed = format!("{:?}", account);
        assert!(!printed.contains(account.private_key()));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_record_uses_camel_case_keys() {
        let record = StoredWalletRecord {
            is_initialized: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["isInitialized"], true);
        assert!(json.get("encryptedAccounts").is_some());
        assert!(json.get("encryptedSeed").is_some());
    }
}
