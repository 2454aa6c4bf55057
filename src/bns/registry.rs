use std::collections::BTreeMap;

use crate::encoding::decode_address;
use crate::error::{Result, WalletError};

/// Top-level names and the owner account whose history carries their
/// registrations.
#[derive(Debug, Clone, Default)]
pub struct TldRegistry {
    owners: BTreeMap<String, String>,
}

impl TldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(tlds: &BTreeMap<String, String>) -> Result<Self> {
        let mut registry = Self::new();
        for (tld, owner) in tlds {
            registry.register(tld, owner)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, tld: &str, owner: &str) -> Result<()> {
        let tld = tld.trim().to_lowercase();
        if tld.is_empty() || tld.contains('.') {
            return Err(WalletError::Validation(format!("invalid tld '{}'", tld)));
        }
        decode_address(owner)?;
        self.owners.insert(tld, owner.to_string());
        Ok(())
    }

    pub fn owner(&self, tld: &str) -> Option<&str> {
        self.owners.get(&tld.to_lowercase()).map(String::as_str)
    }

    pub fn tlds(&self) -> impl Iterator<Item = (&str, &str)> {
        self.owners.iter().map(|(t, o)| (t.as_str(), o.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "ban_3jqurq7t9c7mceu3quew3wj1jhi9mm9j9zwxzdsaciun1gatxpfbc4btmzbd";

    #[test]
    fn test_register_and_lookup_case_insensitive() {
        let mut registry = TldRegistry::new();
        registry.register("BAN", OWNER).unwrap();
        assert_eq!(registry.owner("ban"), Some(OWNER));
        assert_eq!(registry.owner("Ban"), Some(OWNER));
        assert_eq!(registry.owner("jtv"), None);
    }

    #[test]
    fn test_rejects_bad_entries() {
        let mut registry = TldRegistry::new();
        assert!(registry.register("a.b", OWNER).is_err());
        assert!(registry.register("ban", "ban_nope").is_err());
        assert!(registry.is_empty());
    }
}
