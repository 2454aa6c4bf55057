//! The wallet's account store
//!
//! Owns the encrypted at-rest record and, while unlocked, the plaintext seed
//! and derived accounts. Locking drops the plaintext; everything a locked
//! wallet can still answer comes from the non-secret address index.

use std::sync::Arc;
use tracing::{debug, info};

use super::auth::{decrypt_accounts, decrypt_seed, encrypt_wallet};
use super::recovery::{derive_account, derive_seed, seed_from_hex, RecoveryKey, SEED_LEN};
use super::types::{Account, AccountSummary, StoredWalletRecord};
use crate::amount::parse_raw;
use crate::block::{sign_block, StateBlock};
use crate::crypto::sign_message;
use crate::error::{Result, WalletError};
use crate::storage::KeyValueStore;

pub const WALLET_KEY: &str = "wallet";
pub const ADDRESSES_KEY: &str = "accountAddresses";
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_ACCOUNT_NAME_LEN: usize = 32;

struct UnlockedWallet {
    seed: [u8; SEED_LEN],
    /// Sorted by index; index 0 is always present.
    accounts: Vec<Account>,
}

pub struct AccountStore {
    storage: Arc<dyn KeyValueStore>,
    kdf_iterations: u32,
    record: Option<StoredWalletRecord>,
    addresses: Vec<String>,
    session: Option<UnlockedWallet>,
}

fn check_new_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(WalletError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl AccountStore {
    /// Load the persisted record, if any. The store always starts locked.
    pub fn open(storage: Arc<dyn KeyValueStore>, kdf_iterations: u32) -> Result<Self> {
        let record = storage.get::<StoredWalletRecord>(WALLET_KEY)?;
        let addresses = storage.get::<Vec<String>>(ADDRESSES_KEY)?.unwrap_or_default();
        Ok(Self {
            storage,
            kdf_iterations,
            record,
            addresses,
            session: None,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.record.as_ref().map(|r| r.is_initialized).unwrap_or(false)
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.is_some()
    }

    /// Create a fresh wallet and return its 24-word backup phrase.
    pub fn create_wallet(&mut self, password: &str) -> Result<String> {
        check_new_password(password)?;
        let recovery = RecoveryKey::generate()?;
        self.install(recovery.seed()?, password)?;
        Ok(recovery.to_phrase())
    }

    pub fn import_wallet(&mut self, mnemonic: &str, password: &str) -> Result<AccountSummary> {
        check_new_password(password)?;
        let seed = derive_seed(mnemonic)?;
        self.install(seed, password)
    }

    pub fn import_seed(&mut self, seed_hex: &str, password: &str) -> Result<AccountSummary> {
        check_new_password(password)?;
        let seed = seed_from_hex(seed_hex)?;
        self.install(seed, password)
    }

    /// Existing origin grants refer to the installed accounts, so an
    /// initialized wallet is never replaced in place.
    fn install(&mut self, seed: [u8; SEED_LEN], password: &str) -> Result<AccountSummary> {
        if self.is_initialized() {
            return Err(WalletError::Validation("a wallet already exists".to_string()));
        }
        let primary = derive_account(&seed, 0);
        let summary = primary.summary();
        let accounts = vec![primary];
        self.persist(&seed, &accounts, password)?;
        self.session = Some(UnlockedWallet { seed, accounts });
        info!("Wallet initialized, primary account {}", summary.address);
        Ok(summary)
    }

    pub fn unlock(&mut self, password: &str) -> Result<()> {
        let record = self.require_record()?;
        let accounts = decrypt_accounts(&record.encrypted_accounts, &record.salt, password, self.kdf_iterations)?;
        let seed = decrypt_seed(&record.encrypted_seed, &record.salt, password, self.kdf_iterations)?;
        info!("Wallet unlocked ({} accounts)", accounts.len());
        self.session = Some(UnlockedWallet { seed, accounts });
        Ok(())
    }

    /// Drop all plaintext secrets. Returns whether the wallet was unlocked.
    pub fn lock(&mut self) -> bool {
        let was_unlocked = self.session.take().is_some();
        if was_unlocked {
            info!("Wallet locked");
        }
        was_unlocked
    }

    /// Non-secret address index, available while locked. Primary first.
    pub fn account_addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn primary_address(&self) -> Option<&str> {
        self.addresses.first().map(String::as_str)
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.addresses.iter().any(|a| a == address)
    }

    pub fn accounts(&self) -> Result<Vec<AccountSummary>> {
        Ok(self.session()?.accounts.iter().map(Account::summary).collect())
    }

    pub fn account(&self, address: &str) -> Result<&Account> {
        self.session()?
            .accounts
            .iter()
            .find(|a| a.address == address)
            .ok_or_else(|| WalletError::Validation(format!("unknown account {}", address)))
    }

    /// Lowest unused index >= 1, so removed accounts are re-derived first.
    pub fn next_account_index(&self) -> Result<u32> {
        let session = self.session()?;
        let mut candidate = 1u32;
        while session.accounts.iter().any(|a| a.index == candidate) {
            candidate += 1;
        }
        Ok(candidate)
    }

    pub fn add_account(&mut self, password: &str) -> Result<AccountSummary> {
        self.verify_password(password)?;
        let index = self.next_account_index()?;
        let session = self.session_mut()?;
        let account = derive_account(&session.seed, index);
        let summary = account.summary();
        let position = session.accounts.partition_point(|a| a.index < index);
        session.accounts.insert(position, account);
        self.save(password)?;
        info!("Added account {} ({})", index, summary.address);
        Ok(summary)
    }

    /// The primary account is refused before any other check.
    pub fn remove_account(&mut self, index: u32, password: &str) -> Result<AccountSummary> {
        if index == 0 {
            return Err(WalletError::Validation("cannot remove the primary account".to_string()));
        }
        self.session()?;
        self.verify_password(password)?;
        let session = self.session_mut()?;
        let position = session
            .accounts
            .iter()
            .position(|a| a.index == index)
            .ok_or_else(|| WalletError::Validation(format!("no account at index {}", index)))?;
        let removed = session.accounts.remove(position);
        self.save(password)?;
        info!("Removed account {} ({})", index, removed.address);
        Ok(removed.summary())
    }

    pub fn rename_account(&mut self, index: u32, name: &str, password: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_ACCOUNT_NAME_LEN {
            return Err(WalletError::Validation(format!(
                "account name must be 1-{} characters",
                MAX_ACCOUNT_NAME_LEN
            )));
        }
        self.session()?;
        self.verify_password(password)?;
        let session = self.session_mut()?;
        let account = session
            .accounts
            .iter_mut()
            .find(|a| a.index == index)
            .ok_or_else(|| WalletError::Validation(format!("no account at index {}", index)))?;
        account.name = name.to_string();
        self.save(password)
    }

    /// Optimistic in-memory balance bookkeeping; the next refresh from the
    /// network overwrites it.
    pub fn set_balance(&mut self, address: &str, balance_raw: &str) -> Result<()> {
        parse_raw(balance_raw)?;
        let session = self.session_mut()?;
        let account = session
            .accounts
            .iter_mut()
            .find(|a| a.address == address)
            .ok_or_else(|| WalletError::Validation(format!("unknown account {}", address)))?;
        debug!("Balance of {} set to {}", address, balance_raw);
        account.balance = balance_raw.to_string();
        Ok(())
    }

    pub fn sign_message(&self, address: &str, message: &str, origin: &str) -> Result<String> {
        let account = self.account(address)?;
        sign_message(account.private_key(), message, origin)
    }

    pub fn sign_block(&self, block: &StateBlock) -> Result<StateBlock> {
        let account = self.account(&block.account)?;
        sign_block(block, account)
    }

    pub fn export_mnemonic(&self, password: &str) -> Result<String> {
        let seed = self.verify_password(password)?;
        Ok(RecoveryKey::from_seed(&seed)?.to_phrase())
    }

    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<()> {
        check_new_password(new_password)?;
        let record = self.require_record()?;
        let accounts = decrypt_accounts(&record.encrypted_accounts, &record.salt, old_password, self.kdf_iterations)?;
        let seed = decrypt_seed(&record.encrypted_seed, &record.salt, old_password, self.kdf_iterations)?;
        let accounts = match &self.session {
            Some(session) => session.accounts.clone(),
            None => accounts,
        };
        self.persist(&seed, &accounts, new_password)?;
        info!("Wallet password changed");
        Ok(())
    }

    fn require_record(&self) -> Result<StoredWalletRecord> {
        match &self.record {
            Some(record) if record.is_initialized => Ok(record.clone()),
            _ => Err(WalletError::Authorization("wallet not initialized".to_string())),
        }
    }

    fn session(&self) -> Result<&UnlockedWallet> {
        self.session.as_ref().ok_or(WalletError::Locked)
    }

    fn session_mut(&mut self) -> Result<&mut UnlockedWallet> {
        self.session.as_mut().ok_or(WalletError::Locked)
    }

    fn verify_password(&self, password: &str) -> Result<[u8; SEED_LEN]> {
        let record = self.require_record()?;
        decrypt_seed(&record.encrypted_seed, &record.salt, password, self.kdf_iterations)
    }

    fn save(&mut self, password: &str) -> Result<()> {
        let session = self.session()?;
        let (seed, accounts) = (session.seed, session.accounts.clone());
        self.persist(&seed, &accounts, password)
    }

    fn persist(&mut self, seed: &[u8; SEED_LEN], accounts: &[Account], password: &str) -> Result<()> {
        let sealed = encrypt_wallet(accounts, seed, password, self.kdf_iterations)?;
        let record = StoredWalletRecord {
            encrypted_accounts: sealed.encrypted_accounts,
            encrypted_seed: sealed.encrypted_seed,
            salt: sealed.salt,
            is_initialized: true,
        };
        let addresses: Vec<String> = accounts.iter().map(|a| a.address.clone()).collect();
        self.storage.put(WALLET_KEY, &record)?;
        self.storage.put(ADDRESSES_KEY, &addresses)?;
        self.record = Some(record);
        self.addresses = addresses;
        Ok(())
    }
}
