use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::account::auth::{DEFAULT_KDF_ITERATIONS, MIN_KDF_ITERATIONS};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WalletConfig {
    pub wallet: WalletSection,
    pub rpc: RpcConfig,
    #[serde(default)]
    pub bns: BnsConfig,
    #[serde(default)]
    pub approvals: ApprovalConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WalletSection {
    pub db_path: String,
    pub log_level: String,
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
    #[serde(default = "default_auto_lock_minutes")]
    pub auto_lock_minutes: u64,
    /// Representative used when opening an account; the account itself when unset.
    #[serde(default)]
    pub default_representative: Option<String>,
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_KDF_ITERATIONS
}

fn default_auto_lock_minutes() -> u64 {
    15
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RpcConfig {
    pub endpoints: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BnsConfig {
    /// tld -> owner address
    #[serde(default)]
    pub tlds: BTreeMap<String, String>,
    #[serde(default = "default_history_count")]
    pub history_count: u32,
    /// Raw amounts, decimal strings.
    #[serde(default = "default_registration_min")]
    pub registration_min_raw: String,
    #[serde(default = "default_registration_max")]
    pub registration_max_raw: String,
    #[serde(default = "default_resolver_marker")]
    pub resolver_marker_raw: String,
}

fn default_history_count() -> u32 {
    500
}

fn default_registration_min() -> String {
    "1000000000000000000000000000".to_string()
}

fn default_registration_max() -> String {
    "10000000000000000000000000000".to_string()
}

fn default_resolver_marker() -> String {
    "4224".to_string()
}

impl Default for BnsConfig {
    fn default() -> Self {
        Self {
            tlds: BTreeMap::new(),
            history_count: default_history_count(),
            registration_min_raw: default_registration_min(),
            registration_max_raw: default_registration_max(),
            resolver_marker_raw: default_resolver_marker(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ApprovalConfig {
    #[serde(default = "default_unlocked_timeout")]
    pub unlocked_timeout_secs: u64,
    #[serde(default = "default_locked_timeout")]
    pub locked_timeout_secs: u64,
}

fn default_unlocked_timeout() -> u64 {
    300
}

fn default_locked_timeout() -> u64 {
    600
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            unlocked_timeout_secs: default_unlocked_timeout(),
            locked_timeout_secs: default_locked_timeout(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            wallet: WalletSection {
                db_path: "./data/wallet".to_string(),
                log_level: "info".to_string(),
                kdf_iterations: DEFAULT_KDF_ITERATIONS,
                auto_lock_minutes: default_auto_lock_minutes(),
                default_representative: None,
            },
            rpc: RpcConfig {
                endpoints: vec![
                    "https://kaliumapi.appditto.com/api".to_string(),
                    "https://booster.dev-ptera.com/banano-rpc".to_string(),
                    "https://api.banano.trade/proxy".to_string(),
                ],
                timeout_secs: default_timeout_secs(),
            },
            bns: BnsConfig::default(),
            approvals: ApprovalConfig::default(),
        }
    }
}

impl WalletConfig {
    pub fn load_or_default(path: &str) -> Self {
        let config = if std::path::Path::new(path).exists() {
            match std::fs::read_to_string(path) {
                Ok(s) => match toml::from_str(&s) {
                    Ok(c) => {
                        info!("Config loaded from {}", path);
                        c
                    }
                    Err(e) => {
                        warn!("Error parsing config: {}. Using defaults.", e);
                        Self::default()
                    }
                },
                Err(e) => {
                    warn!("Error reading config: {}. Using defaults.", e);
                    Self::default()
                }
            }
        } else {
            info!("Config file not found at '{}'. Creating default.", path);
            let config = Self::default();
            if let Ok(s) = toml::to_string_pretty(&config) {
                if let Err(e) = std::fs::write(path, s) {
                    warn!("Could not write default config: {}", e);
                }
            }
            config
        };
        config.validate()
    }

    /// Clamp values that would weaken the wallet or stall the timers.
    pub fn validate(mut self) -> Self {
        if self.wallet.kdf_iterations < MIN_KDF_ITERATIONS {
            warn!(
                "kdf_iterations {} below minimum, using {}",
                self.wallet.kdf_iterations, MIN_KDF_ITERATIONS
            );
            self.wallet.kdf_iterations = MIN_KDF_ITERATIONS;
        }
        self.wallet.auto_lock_minutes = self.wallet.auto_lock_minutes.max(1);
        self.rpc.timeout_secs = self.rpc.timeout_secs.max(1);
        self.approvals.unlocked_timeout_secs = self.approvals.unlocked_timeout_secs.max(1);
        self.approvals.locked_timeout_secs = self.approvals.locked_timeout_secs.max(1);
        self.bns.tlds = self
            .bns
            .tlds
            .into_iter()
            .map(|(tld, owner)| (tld.to_lowercase(), owner))
            .collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_written_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.toml");
        let path = path.to_str().unwrap();

        let created = WalletConfig::load_or_default(path);
        assert!(std::path::Path::new(path).exists());
        assert_eq!(WalletConfig::load_or_default(path), created);
        assert_eq!(created.approvals.unlocked_timeout_secs, 300);
        assert_eq!(created.approvals.locked_timeout_secs, 600);
    }

    #[test]
    fn test_parse_error_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        assert_eq!(WalletConfig::load_or_default(path.to_str().unwrap()), WalletConfig::default());
    }

    #[test]
    fn test_validate_clamps_unsafe_values() {
        let mut config = WalletConfig::default();
        config.wallet.kdf_iterations = 10;
        config.wallet.auto_lock_minutes = 0;
        config.bns.tlds.insert("BAN".to_string(), "ban_owner".to_string());
        let config = config.validate();
        assert_eq!(config.wallet.kdf_iterations, MIN_KDF_ITERATIONS);
        assert_eq!(config.wallet.auto_lock_minutes, 1);
        assert!(config.bns.tlds.contains_key("ban"));
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let toml_src = r#"
[wallet]
db_path = "/tmp/w"
log_level = "debug"

[rpc]
endpoints = ["http://a", "http://b"]

[bns.tlds]
ban = "ban_1owner"
"#;
        let config: WalletConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.wallet.kdf_iterations, DEFAULT_KDF_ITERATIONS);
        assert_eq!(config.rpc.timeout_secs, 10);
        assert_eq!(config.bns.history_count, 500);
        assert_eq!(config.bns.tlds.get("ban").map(String::as_str), Some("ban_1owner"));
    }
}
