use crate::account::recovery::{derive_account, derive_seed, generate_mnemonic, seed_from_hex};
use crate::crypto::verify_signed_message;
use crate::encoding::{address_to_public_key_hex, ADDRESS_PREFIX};
use crate::error::{Result, WalletError};

pub fn handle_mnemonic() -> Result<()> {
    let phrase = generate_mnemonic()?;
    println!("[SECRET MNEMONIC] - Write this down securely and NEVER share it:");
    println!("---------------------------------------------------------------");
    println!("{}", phrase);
    println!("---------------------------------------------------------------");
    Ok(())
}

pub fn handle_derive(mnemonic: Option<&str>, seed: Option<&str>, index: u32, count: u32) -> Result<()> {
    let seed = match (mnemonic, seed) {
        (Some(m), None) => derive_seed(m)?,
        (None, Some(s)) => seed_from_hex(s)?,
        _ => {
            return Err(WalletError::Validation(
                "pass exactly one of --mnemonic or --seed".to_string(),
            ))
        }
    };
    for i in index..index.saturating_add(count) {
        let account = derive_account(&seed, i);
        println!("{}\t{}\t{}", account.index, account.address, account.public_key);
    }
    Ok(())
}

pub fn handle_verify(signer: &str, message: &str, signature: &str, origin: &str) -> Result<()> {
    let public_key = if signer.starts_with(ADDRESS_PREFIX) {
        address_to_public_key_hex(signer)?
    } else {
        signer.to_string()
    };
    if verify_signed_message(&public_key, message, signature, origin) {
        println!("Signature VALID for {}", origin);
    } else {
        println!("Signature INVALID");
    }
    Ok(())
}
