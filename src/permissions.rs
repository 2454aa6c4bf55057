use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::error::{Result, WalletError};
use crate::storage::KeyValueStore;

pub const PERMISSIONS_KEY: &str = "permissions";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OriginPermission {
    pub origin: String,
    pub approved_accounts: Vec<String>,
    /// Unix millis.
    pub approved_at: i64,
    pub last_used: i64,
}

impl OriginPermission {
    pub fn includes(&self, account: &str) -> bool {
        self.approved_accounts.iter().any(|a| a == account)
    }

    /// Account used when a request names none.
    pub fn default_account(&self) -> Option<&str> {
        self.approved_accounts.first().map(String::as_str)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Persistent per-origin authorization records, written through on every change.
pub struct PermissionLedger {
    storage: Arc<dyn KeyValueStore>,
    permissions: BTreeMap<String, OriginPermission>,
}

impl PermissionLedger {
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let permissions = storage
            .get::<BTreeMap<String, OriginPermission>>(PERMISSIONS_KEY)?
            .unwrap_or_default();
        Ok(Self { storage, permissions })
    }

    pub fn get(&self, origin: &str) -> Option<&OriginPermission> {
        self.permissions.get(origin)
    }

    pub fn is_account_authorized(&self, origin: &str, account: &str) -> bool {
        self.get(origin).map(|p| p.includes(account)).unwrap_or(false)
    }

    pub fn list(&self) -> Vec<OriginPermission> {
        self.permissions.values().cloned().collect()
    }

    /// Create or replace the permission for `origin`.
    pub fn grant(&mut self, origin: &str, accounts: Vec<String>) -> Result<OriginPermission> {
        if accounts.is_empty() {
            return Err(WalletError::Validation("at least one account must be approved".to_string()));
        }
        let now = now_millis();
        let permission = OriginPermission {
            origin: origin.to_string(),
            approved_accounts: accounts,
            approved_at: now,
            last_used: now,
        };
        self.permissions.insert(origin.to_string(), permission.clone());
        self.persist()?;
        info!("Granted {} account(s) to {}", permission.approved_accounts.len(), origin);
        Ok(permission)
    }

    /// Record a use of the permission and return it.
    pub fn touch(&mut self, origin: &str) -> Result<Option<OriginPermission>> {
        let Some(permission) = self.permissions.get_mut(origin) else {
            return Ok(None);
        };
        permission.last_used = now_millis();
        let updated = permission.clone();
        self.persist()?;
        Ok(Some(updated))
    }

    /// Returns whether a permission existed.
    pub fn revoke(&mut self, origin: &str) -> Result<bool> {
        let existed = self.permissions.remove(origin).is_some();
        if existed {
            self.persist()?;
            info!("Revoked permission for {}", origin);
        }
        Ok(existed)
    }

    /// Drop `account` from every grant; origins left with no accounts lose
    /// their permission. Returns the origins that were revoked outright.
    pub fn remove_account_everywhere(&mut self, account: &str) -> Result<Vec<String>> {
        let mut emptied = Vec::new();
        let mut changed = false;
        for (origin, permission) in self.permissions.iter_mut() {
            let before = permission.approved_accounts.len();
            permission.approved_accounts.retain(|a| a != account);
            if permission.approved_accounts.len() != before {
                changed = true;
                if permission.approved_accounts.is_empty() {
                    emptied.push(origin.clone());
                }
            }
        }
        for origin in &emptied {
            self.permissions.remove(origin);
        }
        if changed {
            self.persist()?;
        }
        Ok(emptied)
    }

    fn persist(&self) -> Result<()> {
        self.storage.put(PERMISSIONS_KEY, &self.permissions)
    }
}
