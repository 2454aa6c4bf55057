//! Account address codec.
//!
//! An address is `ban_` followed by 52 base32 characters carrying the 4-bit
//! zero-padded public key and 8 characters carrying the byte-reversed 5-byte
//! Blake2b checksum of that key.

use blake2::digest::consts::U5;
use blake2::{Blake2b, Digest};

use crate::error::{Result, WalletError};

pub const ADDRESS_PREFIX: &str = "ban_";
const ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";
const KEY_CHARS: usize = 52;
const CHECKSUM_CHARS: usize = 8;

type Blake2b40 = Blake2b<U5>;

fn checksum(public_key: &[u8; 32]) -> [u8; 5] {
    let digest = Blake2b40::digest(public_key);
    let mut out = [0u8; 5];
    out.copy_from_slice(&digest);
    out.reverse();
    out
}

fn bit_at(data: &[u8], pad_bits: usize, pos: usize) -> u8 {
    if pos < pad_bits {
        return 0;
    }
    let p = pos - pad_bits;
    (data[p / 8] >> (7 - p % 8)) & 1
}

/// Encode `data` preceded by `pad_bits` zero bits; the total must be a multiple of 5.
fn encode_base32(data: &[u8], pad_bits: usize) -> String {
    let total = data.len() * 8 + pad_bits;
    let mut out = String::with_capacity(total / 5);
    for chunk in (0..total).step_by(5) {
        let mut value = 0u8;
        for offset in 0..5 {
            value = (value << 1) | bit_at(data, pad_bits, chunk + offset);
        }
        out.push(ALPHABET[value as usize] as char);
    }
    out
}

fn decode_base32(input: &str, pad_bits: usize, out: &mut [u8]) -> Result<()> {
    let mut bits: Vec<u8> = Vec::with_capacity(input.len() * 5);
    for c in input.bytes() {
        let value = ALPHABET
            .iter()
            .position(|a| *a == c)
            .ok_or_else(|| WalletError::Validation(format!("invalid address character '{}'", c as char)))?;
        for shift in (0..5).rev() {
            bits.push(((value >> shift) & 1) as u8);
        }
    }
    if bits.len() != out.len() * 8 + pad_bits || bits[..pad_bits].iter().any(|b| *b != 0) {
        return Err(WalletError::Validation("malformed address".to_string()));
    }
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = bits[pad_bits + i * 8..pad_bits + (i + 1) * 8]
            .iter()
            .fold(0u8, |acc, b| (acc << 1) | b);
    }
    Ok(())
}

pub fn encode_address(public_key: &[u8; 32]) -> String {
    format!(
        "{}{}{}",
        ADDRESS_PREFIX,
        encode_base32(public_key, 4),
        encode_base32(&checksum(public_key), 0)
    )
}

/// Decode an address back to its 32 public-key bytes, validating prefix and checksum.
pub fn decode_address(address: &str) -> Result<[u8; 32]> {
    let body = address
        .strip_prefix(ADDRESS_PREFIX)
        .ok_or_else(|| WalletError::Validation(format!("address must start with '{}'", ADDRESS_PREFIX)))?;
    if !body.is_ascii() || body.len() != KEY_CHARS + CHECKSUM_CHARS {
        return Err(WalletError::Validation("invalid address length".to_string()));
    }
    let mut public_key = [0u8; 32];
    decode_base32(&body[..KEY_CHARS], 4, &mut public_key)?;
    let mut expected = [0u8; 5];
    decode_base32(&body[KEY_CHARS..], 0, &mut expected)?;
    if checksum(&public_key) != expected {
        return Err(WalletError::Validation("address checksum mismatch".to_string()));
    }
    Ok(public_key)
}

pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

/// Parse a 64-character hex string (public key, block hash, link).
pub fn decode_hex32(value: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value).map_err(|_| WalletError::Validation(format!("invalid hex value '{}'", value)))?;
    bytes
        .try_into()
        .map_err(|_| WalletError::Validation("expected 32 bytes".to_string()))
}

pub fn address_to_public_key_hex(address: &str) -> Result<String> {
    Ok(hex::encode_upper(decode_address(address)?))
}

/// Interpret a block link (hex) as an account address.
pub fn link_to_address(link: &str) -> Result<String> {
    Ok(encode_address(&decode_hex32(link)?))
}

pub fn address_to_link(address: &str) -> Result<String> {
    address_to_public_key_hex(address)
}
