//! On-chain name resolution.
//!
//! A name `label.tld` is registered by a send from the tld owner whose amount
//! falls in the registration band. That send's representative field carries
//! the label (NUL-padded bytes read as a public key) and its link points at
//! the domain-record account. The domain-record account publishes the
//! resolved address as the link of a send whose amount equals the resolver
//! marker.

pub mod registry;

use num_bigint::BigUint;
use std::sync::Arc;
use tracing::debug;

use crate::amount::parse_raw;
use crate::client::{HistoryEntry, RpcClient};
use crate::config::BnsConfig;
use crate::encoding::{decode_address, encode_address, link_to_address};
use crate::error::{Result, WalletError};

pub use registry::TldRegistry;

pub const MAX_NAME_LEN: usize = 32;

/// Split and normalize `label.tld`. The tld is not checked against a registry here.
pub fn parse_name(full_name: &str) -> Result<(String, String)> {
    let normalized = full_name.trim().to_lowercase();
    let mut parts = normalized.split('.');
    let (Some(label), Some(tld), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(WalletError::Validation(format!("'{}' must have the form name.tld", full_name)));
    };
    validate_label(label)?;
    if tld.is_empty() {
        return Err(WalletError::Validation(format!("'{}' has an empty tld", full_name)));
    }
    Ok((label.to_string(), tld.to_string()))
}

fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() || label.len() > MAX_NAME_LEN {
        return Err(WalletError::Validation(format!(
            "name must be 1-{} characters",
            MAX_NAME_LEN
        )));
    }
    if !label
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
    {
        return Err(WalletError::Validation(format!("name '{}' has invalid characters", label)));
    }
    Ok(())
}

/// Representative address that carries `label` in a registration block.
pub fn encode_domain_name(label: &str) -> Result<String> {
    let label = label.trim().to_lowercase();
    validate_label(&label)?;
    let mut bytes = [0u8; 32];
    bytes[..label.len()].copy_from_slice(label.as_bytes());
    Ok(encode_address(&bytes))
}

/// Inverse of [`encode_domain_name`]; `None` when the field carries no text.
pub fn decode_domain_name(representative: &str) -> Option<String> {
    let bytes = decode_address(representative).ok()?;
    let end = bytes.iter().rposition(|b| *b != 0)? + 1;
    String::from_utf8(bytes[..end].to_vec()).ok()
}

pub struct BnsResolver {
    rpc: Arc<RpcClient>,
    registry: TldRegistry,
    history_count: u32,
    registration_min: BigUint,
    registration_max: BigUint,
    resolver_marker: BigUint,
}

impl BnsResolver {
    pub fn new(
        rpc: Arc<RpcClient>,
        registry: TldRegistry,
        history_count: u32,
        registration_band: (BigUint, BigUint),
        resolver_marker: BigUint,
    ) -> Self {
        Self {
            rpc,
            registry,
            history_count,
            registration_min: registration_band.0,
            registration_max: registration_band.1,
            resolver_marker,
        }
    }

    pub fn from_config(config: &BnsConfig, rpc: Arc<RpcClient>) -> Result<Self> {
        let registry = TldRegistry::from_map(&config.tlds)?;
        let min = parse_raw(&config.registration_min_raw)?;
        let max = parse_raw(&config.registration_max_raw)?;
        let marker = parse_raw(&config.resolver_marker_raw)?;
        if min > max {
            return Err(WalletError::Validation("registration band is empty".to_string()));
        }
        if min <= marker && marker <= max {
            return Err(WalletError::Validation("resolver marker overlaps the registration band".to_string()));
        }
        Ok(Self::new(rpc, registry, config.history_count, (min, max), marker))
    }

    pub fn registry(&self) -> &TldRegistry {
        &self.registry
    }

    /// Resolve `label.tld` to the address its resolver record points at.
    pub async fn resolve(&self, full_name: &str) -> Result<String> {
        let (label, tld) = parse_name(full_name)?;
        let owner = self
            .registry
            .owner(&tld)
            .ok_or_else(|| WalletError::Validation(format!("unsupported tld '{}'", tld)))?;

        let record = self
            .registrations(owner)
            .await?
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&label))
            .map(|(_, record)| record)
            .ok_or_else(|| WalletError::NameNotFound(format!("{}.{}", label, tld)))?;
        debug!("{}.{} registered at domain record {}", label, tld, record);

        self.resolver_target(&record)
            .await?
            .ok_or_else(|| WalletError::NameNotFound(format!("{}.{} has no resolver record", label, tld)))
    }

    /// Every registered name whose resolver record targets `address`. No
    /// match is an empty list, not an error.
    pub async fn reverse_resolve(&self, address: &str) -> Result<Vec<String>> {
        decode_address(address)?;
        let mut names = Vec::new();
        for (tld, owner) in self.registry.tlds() {
            for (label, record) in self.registrations(owner).await? {
                if self.resolver_target(&record).await?.as_deref() == Some(address) {
                    names.push(format!("{}.{}", label, tld));
                }
            }
        }
        Ok(names)
    }

    async fn history(&self, account: &str) -> Result<Vec<HistoryEntry>> {
        self.rpc
            .get_account_history(account, self.history_count)
            .await
            .into_result()
    }

    /// `(label, domain record address)` for each registration send, newest first.
    async fn registrations(&self, owner: &str) -> Result<Vec<(String, String)>> {
        let history = self.history(owner).await?;
        Ok(history
            .iter()
            .filter(|entry| entry.is_send())
            .filter(|entry| {
                parse_raw(&entry.amount)
                    .map(|amount| amount >= self.registration_min && amount <= self.registration_max)
                    .unwrap_or(false)
            })
            .filter_map(|entry| {
                let label = decode_domain_name(entry.representative.as_deref()?)?;
                let record = link_to_address(entry.link.as_deref()?).ok()?;
                Some((label, record))
            })
            .collect())
    }

    async fn resolver_target(&self, record: &str) -> Result<Option<String>> {
        let history = self.history(record).await?;
        Ok(history
            .iter()
            .filter(|entry| entry.is_send())
            .filter(|entry| parse_raw(&entry.amount).map(|a| a == self.resolver_marker).unwrap_or(false))
            .find_map(|entry| link_to_address(entry.link.as_deref()?).ok()))
    }
}
