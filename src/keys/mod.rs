//! # Key Material
//!
//! Generator capability for everything the key lifecycle creates: the ejson
//! transport pair, per-service signing keys with their JWKS, self-signed
//! certificates and raw random material.

mod generator;

pub use generator::DefaultKeyGenerator;

use crate::ejson::EjsonKeyPair;
use crate::error::Result;
use std::fmt;
use zeroize::Zeroizing;

/// Signing key of one service
#[derive(Clone)]
pub struct ApplicationKey {
    /// SEC1 PEM of the P-384 private key
    pub private_key_pem: Zeroizing<String>,
    /// base64url SHA-256 JWK thumbprint of the public key
    pub kid: String,
    /// `{"keys":[...]}` holding the public JWK and its PEM
    pub jwks: String,
}

impl fmt::Debug for ApplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct TlsMaterial {
    pub cert_pem: String,
    pub key_pem: Zeroizing<String>,
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial").finish_non_exhaustive()
    }
}

pub trait KeyGenerator: Send + Sync {
    fn ejson_key_pair(&self) -> Result<EjsonKeyPair>;

    fn application_key(&self) -> Result<ApplicationKey>;

    /// Bare private key PEM, no JWKS
    fn private_key_pem(&self) -> Result<Zeroizing<String>>;

    /// Certificate for `host` and `*.host`
    fn self_signed_cert(&self, host: &str, organization: &str) -> Result<TlsMaterial>;

    fn random_bytes(&self, len: usize) -> Result<Zeroizing<Vec<u8>>>;
}
