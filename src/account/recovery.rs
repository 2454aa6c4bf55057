//! Wallet recovery using BIP39 mnemonic seed phrases
//!
//! The 24-word phrase encodes the 32-byte seed directly as its entropy, so the
//! phrase and the seed are interchangeable backup forms.

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;

use super::types::Account;
use crate::crypto::KeyPair;
use crate::encoding::decode_hex32;
use crate::error::{Result, WalletError};

pub const SEED_LEN: usize = 32;

/// Recovery key system using BIP39 mnemonic
pub struct RecoveryKey {
    pub mnemonic: Mnemonic,
}

impl RecoveryKey {
    /// Generate a new 24-word recovery key (256 bits of entropy)
    pub fn generate() -> Result<Self> {
        let mut entropy = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut entropy);
        Self::from_seed(&entropy)
    }

    pub fn from_seed(seed: &[u8; SEED_LEN]) -> Result<Self> {
        let mnemonic = Mnemonic::from_entropy_in(Language::English, seed)
            .map_err(|e| WalletError::Crypto(format!("mnemonic encoding failed: {}", e)))?;
        Ok(Self { mnemonic })
    }

    /// Parse a phrase; unknown words or a checksum mismatch are validation errors.
    pub fn from_phrase(phrase: &str) -> Result<Self> {
        let normalized = phrase
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|e| WalletError::Validation(format!("invalid mnemonic: {}", e)))?;
        Ok(Self { mnemonic })
    }

    pub fn to_phrase(&self) -> String {
        self.mnemonic.words().collect::<Vec<&str>>().join(" ")
    }

    pub fn seed(&self) -> Result<[u8; SEED_LEN]> {
        let entropy = self.mnemonic.to_entropy();
        entropy.try_into().map_err(|e: Vec<u8>| {
            WalletError::Validation(format!(
                "mnemonic carries {} bits of entropy, expected 256",
                e.len() * 8
            ))
        })
    }
}

pub fn generate_mnemonic() -> Result<String> {
    Ok(RecoveryKey::generate()?.to_phrase())
}

pub fn derive_seed(mnemonic: &str) -> Result<[u8; SEED_LEN]> {
    RecoveryKey::from_phrase(mnemonic)?.seed()
}

pub fn seed_from_hex(seed_hex: &str) -> Result<[u8; SEED_LEN]> {
    decode_hex32(seed_hex.trim()).map_err(|_| WalletError::Validation("seed must be 64 hex characters".to_string()))
}

/// Pure derivation: the same `(seed, index)` always yields the same account.
pub fn derive_account(seed: &[u8; SEED_LEN], index: u32) -> Account {
    Account::from_keypair(index, &KeyPair::derive(seed, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_recovery_key_generation() {
        let phrase = generate_mnemonic().unwrap();
        assert_eq!(phrase.split_whitespace().count(), 24);

        let recovered = RecoveryKey::from_phrase(&phrase).unwrap();
        assert_eq!(recovered.to_phrase(), phrase);
    }

    #[test]
    fn test_seed_round_trips_through_phrase() {
        let seed = [0x5Au8; 32];
        let phrase = RecoveryKey::from_seed(&seed).unwrap().to_phrase();
        assert_eq!(derive_seed(&phrase).unwrap(), seed);
        assert_eq!(derive_seed(&phrase.to_uppercase()).unwrap(), seed);
    }

    #[test]
    fn test_checksum_mismatch_is_validation_error() {
        let phrase = RecoveryKey::from_seed(&[0u8; 32]).unwrap().to_phrase();
        // "abandon" x23 + "art" is the valid all-zero phrase; swapping the last word breaks the checksum
        let mut words: Vec<&str> = phrase.split_whitespace().collect();
        assert_eq!(words[23], "art");
        words[23] = "abandon";
        let err = derive_seed(&words.join(" ")).unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
        assert!(matches!(derive_seed("not a mnemonic"), Err(WalletError::Validation(_))));
    }

    #[test]
    fn test_twelve_words_rejected() {
        let twelve = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        assert!(matches!(derive_seed(twelve), Err(WalletError::Validation(_))));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let seed = [3u8; 32];
        let a = derive_account(&seed, 5);
        let b = derive_account(&seed, 5);
        assert_eq!(a, b);
        assert_ne!(a.address, derive_account(&seed, 6).address);
    }

    #[test]
    fn test_no_address_collisions_across_indices() {
        let seed = [0xC4u8; 32];
        let addresses: HashSet<String> = (0..10_000u32)
            .map(|i| KeyPair::derive(&seed, i).address())
            .collect();
        assert_eq!(addresses.len(), 10_000);
    }
}
