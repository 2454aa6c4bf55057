//! Raw ↔ display unit conversion.
//!
//! One display unit (BAN) is 10^29 raw. All arithmetic runs on `BigUint`.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{Result, WalletError};

pub const RAW_DECIMALS: u32 = 29;
pub const DEFAULT_DISPLAY_DECIMALS: u32 = 6;
/// Largest raw amount representable in a state block balance (u128).
pub const MAX_RAW_BYTES: usize = 16;

pub fn raw_per_unit() -> BigUint {
    BigUint::from(10u32).pow(RAW_DECIMALS)
}

pub fn parse_raw(raw: &str) -> Result<BigUint> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WalletError::Validation(format!("invalid raw amount '{}'", raw)));
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 10)
        .ok_or_else(|| WalletError::Validation(format!("invalid raw amount '{}'", raw)))
}

/// Convert raw to display units, truncating (never rounding) to `decimals`
/// places and stripping trailing zeros.
pub fn raw_to_display_with(raw: &BigUint, decimals: u32) -> String {
    let unit = raw_per_unit();
    let whole = raw / &unit;
    let decimals = decimals.min(RAW_DECIMALS);
    if decimals == 0 {
        return whole.to_string();
    }
    let fraction = (raw % &unit) / BigUint::from(10u32).pow(RAW_DECIMALS - decimals);
    if fraction.is_zero() {
        return whole.to_string();
    }
    let padded = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{}.{}", whole, padded.trim_end_matches('0'))
}

pub fn raw_to_display(raw: &str) -> Result<String> {
    Ok(raw_to_display_with(&parse_raw(raw)?, DEFAULT_DISPLAY_DECIMALS))
}

/// Parse a display amount ("1", "0.01", "1234.5") into raw units.
pub fn display_to_raw(display: &str) -> Result<BigUint> {
    let invalid = || WalletError::Validation(format!("invalid amount '{}'", display));
    let trimmed = display.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits_only(whole) || !digits_only(fraction) {
        return Err(invalid());
    }
    if fraction.len() > RAW_DECIMALS as usize {
        return Err(WalletError::Validation(format!(
            "amount '{}' has more than {} decimals",
            display, RAW_DECIMALS
        )));
    }
    let whole_raw = if whole.is_empty() {
        BigUint::zero()
    } else {
        BigUint::parse_bytes(whole.as_bytes(), 10).ok_or_else(invalid)?
    };
    let padded = format!("{:0<width$}", fraction, width = RAW_DECIMALS as usize);
    let fraction_raw = BigUint::parse_bytes(padded.as_bytes(), 10).ok_or_else(invalid)?;
    Ok(whole_raw * raw_per_unit() + fraction_raw)
}

/// Big-endian 16-byte encoding used inside state blocks.
pub fn raw_to_block_bytes(raw: &BigUint) -> Result<[u8; 16]> {
    let bytes = raw.to_bytes_be();
    if bytes.len() > MAX_RAW_BYTES {
        return Err(WalletError::Validation("amount exceeds maximum supply".to_string()));
    }
    let mut out = [0u8; 16];
    out[MAX_RAW_BYTES - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

pub fn checked_sub(balance: &BigUint, amount: &BigUint) -> Result<BigUint> {
    if amount > balance {
        return Err(WalletError::Validation("insufficient balance".to_string()));
    }
    Ok(balance - amount)
}
