//! # ejson
//!
//! Transport key pair used to encrypt the secret side files, and the
//! document codec. Keys are 32-byte Curve25519 keys, hex encoded. The
//! private key file on disk is named after the public key.

pub mod codec;

pub use codec::{decrypt, encrypt, is_boxed, write_encrypted};

use crate::error::{OperatorError, Result};
use crypto_box::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroizing;

/// Field of an ejson document naming the key it is encrypted to
pub const PUBLIC_KEY_FIELD: &str = "_public_key";

#[derive(Clone)]
pub struct EjsonKeyPair {
    public_key: String,
    private_key: Zeroizing<String>,
}

impl fmt::Debug for EjsonKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EjsonKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl EjsonKeyPair {
    #[must_use]
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        Self {
            public_key: hex::encode(secret.public_key().as_bytes()),
            private_key: Zeroizing::new(hex::encode(secret.to_bytes())),
        }
    }

    /// Pair read from a key directory entry: file name and trimmed content
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: Zeroizing::new(private_key.into().trim().to_string()),
        }
    }

    /// Public key id, also the on-disk file name of the private key
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// True when the private key derives the public key
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        parse_secret_key(&self.private_key)
            .map(|secret| hex::encode(secret.public_key().as_bytes()) == self.public_key)
            .unwrap_or(false)
    }
}

pub(crate) fn parse_public_key(hex_key: &str) -> Result<PublicKey> {
    Ok(PublicKey::from(decode_key(hex_key, "public")?))
}

pub(crate) fn parse_secret_key(hex_key: &str) -> Result<SecretKey> {
    Ok(SecretKey::from(decode_key(hex_key, "private")?))
}

fn decode_key(hex_key: &str, which: &str) -> Result<[u8; 32]> {
    let bytes = Zeroizing::new(
        hex::decode(hex_key.trim())
            .map_err(|e| OperatorError::Encryption(format!("invalid {which} key: {e}")))?,
    );
    bytes
        .as_slice()
        .try_into()
        .map_err(|e| OperatorError::Encryption(format!("{which} key must be 32 bytes: {e}")))
}
