use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::amount::{parse_raw, raw_to_block_bytes};
use crate::crypto::{blake2b_256, verify_with_pubkey_hex, KeyPair};
use crate::encoding::{address_to_link, decode_address, decode_hex32};
use crate::error::{Result, WalletError};

/// Proof-of-work is produced by an external work provider; blocks leave the
/// wallet with this placeholder.
pub const WORK_PLACEHOLDER: &str = "0000000000000000";
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// State blocks are hashed behind a 32-byte preamble whose last byte is 6.
const STATE_BLOCK_PREAMBLE: [u8; 32] = {
    let mut p = [0u8; 32];
    p[31] = 6;
    p
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockSubtype {
    Send,
    Receive,
    Open,
    Change,
}

impl BlockSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockSubtype::Send => "send",
            BlockSubtype::Receive => "receive",
            BlockSubtype::Open => "open",
            BlockSubtype::Change => "change",
        }
    }
}

fn state_type() -> String {
    "state".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StateBlock {
    #[serde(rename = "type", default = "state_type")]
    pub block_type: String,
    pub account: String,
    pub previous: String,
    pub representative: String,
    /// Balance after this block, raw units as a decimal string.
    pub balance: String,
    /// Destination public key (send) or source block hash (receive), hex.
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
}

impl StateBlock {
    pub fn new(account: &str, previous: &str, representative: &str, balance: &BigUint, link: &str) -> Self {
        StateBlock {
            block_type: state_type(),
            account: account.to_string(),
            previous: previous.to_uppercase(),
            representative: representative.to_string(),
            balance: balance.to_string(),
            link: link.to_uppercase(),
            signature: None,
            work: None,
        }
    }

    pub fn send(account: &str, frontier: &str, representative: &str, new_balance: &BigUint, destination: &str) -> Result<Self> {
        let link = address_to_link(destination)?;
        Ok(Self::new(account, frontier, representative, new_balance, &link))
    }

    /// Receive (or open, when the account has no frontier yet) a pending block.
    pub fn receive(
        account: &str,
        frontier: Option<&str>,
        representative: &str,
        new_balance: &BigUint,
        source_hash: &str,
    ) -> Self {
        Self::new(account, frontier.unwrap_or(ZERO_HASH), representative, new_balance, source_hash)
    }

    pub fn is_open(&self) -> bool {
        self.previous == ZERO_HASH
    }

    /// Hash of the signed fields. Fails on malformed fields so a bad block is
    /// never signed.
    pub fn hash(&self) -> Result<[u8; 32]> {
        if self.block_type != "state" {
            return Err(WalletError::Protocol(format!("unsupported block type '{}'", self.block_type)));
        }
        let account = decode_address(&self.account)?;
        let previous = decode_hex32(&self.previous)?;
        let representative = decode_address(&self.representative)?;
        let balance = raw_to_block_bytes(&parse_raw(&self.balance)?)?;
        let link = decode_hex32(&self.link)?;
        Ok(blake2b_256(&[
            &STATE_BLOCK_PREAMBLE[..],
            &account[..],
            &previous[..],
            &representative[..],
            &balance[..],
            &link[..],
        ]))
    }

    pub fn hash_hex(&self) -> Result<String> {
        Ok(hex::encode_upper(self.hash()?))
    }
}

/// Sign `block` with `account`'s key, attaching the signature and work placeholder.
pub fn sign_block(block: &StateBlock, account: &Account) -> Result<StateBlock> {
    if block.account != account.address {
        return Err(WalletError::Validation(format!(
            "block belongs to {}, not {}",
            block.account, account.address
        )));
    }
    let hash = block.hash()?;
    let keypair = KeyPair::from_private_key_hex(account.private_key())?;
    let mut signed = block.clone();
    signed.signature = Some(keypair.sign_hex(&hash));
    signed.work = Some(WORK_PLACEHOLDER.to_string());
    Ok(signed)
}

pub fn verify_block_signature(block: &StateBlock) -> bool {
    let (Some(signature), Ok(hash), Ok(public_key)) = (&block.signature, block.hash(), decode_address(&block.account)) else {
        return false;
    };
    verify_with_pubkey_hex(&hash, signature, &hex::encode(public_key))
}
