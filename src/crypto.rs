use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};
use ed25519_dalek::hazmat::{raw_sign, raw_verify, ExpandedSecretKey};
use ed25519_dalek::{Signature, VerifyingKey};
use hex;

use crate::encoding::{decode_hex32, encode_address};
use crate::error::{Result, WalletError};

pub type Blake2b256 = Blake2b<U32>;

/// Protocol prefix mixed into every signed-message preimage.
pub const SIGNED_MESSAGE_PREFIX: &str = "Banano Signed Message:\n";

pub fn blake2b_256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// The ledger signs with Ed25519 where the key expansion and the signature
/// hash are Blake2b-512 instead of SHA-512.
fn expand(secret: &[u8; 32]) -> ExpandedSecretKey {
    let hash = Blake2b512::digest(secret);
    let mut bytes = [0u8; 64];
    bytes.copy_from_slice(&hash);
    ExpandedSecretKey::from_bytes(&bytes)
}

#[derive(Clone)]
pub struct KeyPair {
    secret: [u8; 32],
    public: VerifyingKey,
}

impl KeyPair {
    pub fn from_private_key(secret: [u8; 32]) -> Self {
        let public = VerifyingKey::from(&expand(&secret));
        KeyPair { secret, public }
    }

    pub fn from_private_key_hex(private_key_hex: &str) -> Result<Self> {
        let secret = decode_hex32(private_key_hex)
            .map_err(|_| WalletError::Crypto("malformed private key".to_string()))?;
        Ok(Self::from_private_key(secret))
    }

    /// Deterministic account key: Blake2b-256(seed || index as big-endian u32).
    pub fn derive(seed: &[u8; 32], index: u32) -> Self {
        Self::from_private_key(blake2b_256(&[&seed[..], &index.to_be_bytes()[..]]))
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        raw_sign::<Blake2b512>(&expand(&self.secret), message, &self.public)
    }

    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode_upper(self.sign(message).to_bytes())
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        raw_verify::<Blake2b512>(&self.public, message, signature).is_ok()
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode_upper(self.public_key_bytes())
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode_upper(self.secret)
    }

    pub fn address(&self) -> String {
        encode_address(&self.public_key_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Verify a signature against a message with a provided public key (hex).
pub fn verify_with_pubkey_hex(message: &[u8], signature_hex: &str, pubkey_hex: &str) -> bool {
    let (Ok(sig_bytes), Ok(pk_bytes)) = (hex::decode(signature_hex), decode_hex32(pubkey_hex)) else {
        return false;
    };
    let (Ok(signature), Ok(pubkey)) = (Signature::from_slice(&sig_bytes), VerifyingKey::from_bytes(&pk_bytes)) else {
        return false;
    };
    raw_verify::<Blake2b512>(&pubkey, message, &signature).is_ok()
}

/// Origins are newline-terminated in the preimage, so one containing a
/// control character could shift bytes into the message.
pub fn check_origin(origin: &str) -> Result<()> {
    if origin.is_empty() || origin.chars().any(char::is_control) {
        return Err(WalletError::Validation("origin must be non-empty and free of control characters".to_string()));
    }
    Ok(())
}

/// Domain-separated digest: prefix, origin and message are all bound into it,
/// so a signature produced for one origin does not verify for another.
/// Only unambiguous for origins accepted by [`check_origin`].
pub fn signed_message_digest(origin: &str, message: &str) -> [u8; 32] {
    blake2b_256(&[
        SIGNED_MESSAGE_PREFIX.as_bytes(),
        origin.as_bytes(),
        "\n".as_bytes(),
        message.as_bytes(),
    ])
}

pub fn sign_message(private_key_hex: &str, message: &str, origin: &str) -> Result<String> {
    check_origin(origin)?;
    let keypair = KeyPair::from_private_key_hex(private_key_hex)?;
    Ok(keypair.sign_hex(&signed_message_digest(origin, message)))
}

pub fn verify_signed_message(public_key_hex: &str, message: &str, signature_hex: &str, origin: &str) -> bool {
    if check_origin(origin).is_err() {
        return false;
    }
    verify_with_pubkey_hex(&signed_message_digest(origin, message), signature_hex, public_key_hex)
}
