//! Password-based encryption for the at-rest wallet record

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use super::recovery::SEED_LEN;
use super::types::Account;
use crate::error::{Result, WalletError};

pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;
pub const MIN_KDF_ITERATIONS: u32 = 10_000;
pub const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Ciphertexts for one save of the wallet, sharing a single fresh salt.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedWallet {
    pub encrypted_accounts: String,
    pub encrypted_seed: String,
    pub salt: String,
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive an encryption key from a password and salt
pub fn derive_encryption_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32]; // 256-bit key
    pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations.max(MIN_KDF_ITERATIONS), &mut key);
    key
}

/// Encrypt data using AES-256-GCM; the random nonce is prepended to the ciphertext.
pub fn encrypt_data(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| WalletError::Crypto("invalid key length".to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, data)
        .map_err(|_| WalletError::Crypto("encryption failed".to_string()))?;

    let mut result = nonce_bytes.to_vec();
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt data using AES-256-GCM. Every failure reads as a wrong password.
pub fn decrypt_data(encrypted: &[u8], key: &[u8; 32]) -> Result<Vec<u8>> {
    if encrypted.len() < NONCE_LEN {
        return Err(WalletError::invalid_password());
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| WalletError::invalid_password())?;
    let nonce = Nonce::from_slice(&encrypted[..NONCE_LEN]);
    cipher
        .decrypt(nonce, &encrypted[NONCE_LEN..])
        .map_err(|_| WalletError::invalid_password())
}

pub fn encrypt_wallet(accounts: &[Account], seed: &[u8; SEED_LEN], password: &str, iterations: u32) -> Result<EncryptedWallet> {
    let salt = generate_salt();
    let key = derive_encryption_key(password, &salt, iterations);
    let serialized = serde_json::to_vec(accounts)?;
    Ok(EncryptedWallet {
        encrypted_accounts: hex::encode(encrypt_data(&serialized, &key)?),
        encrypted_seed: hex::encode(encrypt_data(seed, &key)?),
        salt: hex::encode(salt),
    })
}

fn open(ciphertext_hex: &str, salt_hex: &str, password: &str, iterations: u32) -> Result<Vec<u8>> {
    let salt = hex::decode(salt_hex).map_err(|_| WalletError::invalid_password())?;
    let blob = hex::decode(ciphertext_hex).map_err(|_| WalletError::invalid_password())?;
    let key = derive_encryption_key(password, &salt, iterations);
    decrypt_data(&blob, &key)
}

pub fn decrypt_accounts(ciphertext_hex: &str, salt_hex: &str, password: &str, iterations: u32) -> Result<Vec<Account>> {
    let plaintext = open(ciphertext_hex, salt_hex, password, iterations)?;
    serde_json::from_slice(&plaintext).map_err(|_| WalletError::invalid_password())
}

pub fn decrypt_seed(ciphertext_hex: &str, salt_hex: &str, password: &str, iterations: u32) -> Result<[u8; SEED_LEN]> {
    let plaintext = open(ciphertext_hex, salt_hex, password, iterations)?;
    plaintext.try_into().map_err(|_| WalletError::invalid_password())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::recovery::derive_account;

    const ITER: u32 = MIN_KDF_ITERATIONS;

    #[test]
    fn test_encryption() {
        let data = b"sensitive data";
        let key = derive_encryption_key("encryption_password", b"random_salt_1234", ITER);

        let encrypted = encrypt_data(data, &key).unwrap();
        let decrypted = decrypt_data(&encrypted, &key).unwrap();

        assert_eq!(data, decrypted.as_slice());
    }

    #[test]
    fn test_wallet_round_trip() {
        let seed = [11u8; 32];
        let accounts = vec![derive_account(&seed, 0), derive_account(&seed, 2)];
        let sealed = encrypt_wallet(&accounts, &seed, "correct horse", ITER).unwrap();

        let restored = decrypt_accounts(&sealed.encrypted_accounts, &sealed.salt, "correct horse", ITER).unwrap();
        assert_eq!(restored, accounts);
        assert_eq!(decrypt_seed(&sealed.encrypted_seed, &sealed.salt, "correct horse", ITER).unwrap(), seed);
    }

    #[test]
    fn test_wrong_password_never_returns_data() {
        let seed = [11u8; 32];
        let sealed = encrypt_wallet(&[derive_account(&seed, 0)], &seed, "correct horse", ITER).unwrap();

        let err = decrypt_accounts(&sealed.encrypted_accounts, &sealed.salt, "wrong horse", ITER).unwrap_err();
        assert_eq!(err, WalletError::Crypto("invalid password".to_string()));
        assert!(decrypt_seed(&sealed.encrypted_seed, &sealed.salt, "wrong horse", ITER).is_err());
    }

    #[test]
    fn test_tampered_or_malformed_ciphertext_fails() {
        let seed = [11u8; 32];
        let sealed = encrypt_wallet(&[derive_account(&seed, 0)], &seed, "pw-12345", ITER).unwrap();

        let mut bytes = hex::decode(&sealed.encrypted_seed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x80;
        assert!(decrypt_seed(&hex::encode(bytes), &sealed.salt, "pw-12345", ITER).is_err());
        assert!(decrypt_seed("zz", &sealed.salt, "pw-12345", ITER).is_err());
        assert!(decrypt_seed("00ff", &sealed.salt, "pw-12345", ITER).is_err());
    }

    #[test]
    fn test_fresh_salt_per_encryption() {
        let seed = [11u8; 32];
        let a = encrypt_wallet(&[], &seed, "pw-12345", ITER).unwrap();
        let b = encrypt_wallet(&[], &seed, "pw-12345", ITER).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.encrypted_seed, b.encrypted_seed);
    }
}
