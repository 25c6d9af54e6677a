//! # ejson Document Codec
//!
//! Encrypts every string value of a JSON document to the document's
//! `_public_key`. Values under keys starting with `_` stay in clear text,
//! and values already in boxed form are left alone.
//!
//! Boxed value format: `EJ[1:<encrypter public key>:<nonce>:<box>]`, each
//! part standard base64. The box is a NaCl box sealed with a fresh
//! ephemeral key per value.

use super::{parse_public_key, parse_secret_key, PUBLIC_KEY_FIELD};
use crate::error::{OperatorError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use crypto_box::aead::{Aead, AeadCore};
use crypto_box::{Nonce, PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

const BOX_PREFIX: &str = "EJ[1:";
const NONCE_LEN: usize = 24;

/// True when `s` is already an encrypted ejson value
#[must_use]
pub fn is_boxed(s: &str) -> bool {
    s.starts_with(BOX_PREFIX) && s.ends_with(']')
}

/// Encrypt a JSON document in place of its plaintext bytes
pub fn encrypt(plain: &[u8]) -> Result<Vec<u8>> {
    let mut doc: Value = serde_json::from_slice(plain)
        .map_err(|e| OperatorError::json("parsing ejson document", e))?;
    let recipient = document_public_key(&doc)?;
    walk(&mut doc, &mut |s| {
        if is_boxed(s) {
            Ok(s.to_string())
        } else {
            seal(&recipient, s)
        }
    })?;
    to_pretty_bytes(&doc)
}

/// Decrypt a JSON document with the hex encoded private key
pub fn decrypt(cipher: &[u8], private_key_hex: &str) -> Result<Vec<u8>> {
    let mut doc: Value = serde_json::from_slice(cipher)
        .map_err(|e| OperatorError::json("parsing ejson document", e))?;
    let secret = parse_secret_key(private_key_hex)?;
    walk(&mut doc, &mut |s| {
        if is_boxed(s) {
            open(&secret, s)
        } else {
            Ok(s.to_string())
        }
    })?;
    to_pretty_bytes(&doc)
}

/// Write `entries` plus `_public_key` as an encrypted ejson file
pub fn write_encrypted(path: &Path, entries: &BTreeMap<String, String>, public_key: &str) -> Result<()> {
    let mut doc = Map::new();
    doc.insert(PUBLIC_KEY_FIELD.to_string(), Value::String(public_key.to_string()));
    for (k, v) in entries {
        doc.insert(k.clone(), Value::String(v.clone()));
    }
    let plain = serde_json::to_vec(&Value::Object(doc))
        .map_err(|e| OperatorError::json("serializing ejson document", e))?;
    let encrypted = encrypt(&plain)?;
    crate::qust::write_file(path, encrypted)
}

fn document_public_key(doc: &Value) -> Result<PublicKey> {
    let hex_key = doc
        .get(PUBLIC_KEY_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| OperatorError::Encryption(format!("document has no {PUBLIC_KEY_FIELD} field")))?;
    parse_public_key(hex_key)
}

fn walk(value: &mut Value, f: &mut impl FnMut(&str) -> Result<String>) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key.starts_with('_') && v.is_string() {
                    continue;
                }
                walk(v, f)?;
            }
        }
        Value::Array(items) => {
            for v in items {
                walk(v, f)?;
            }
        }
        Value::String(s) => *s = f(s)?,
        _ => {}
    }
    Ok(())
}

fn seal(recipient: &PublicKey, plain: &str) -> Result<String> {
    let ephemeral = SecretKey::generate(&mut OsRng);
    let sealed = SalsaBox::new(recipient, &ephemeral);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let boxed = sealed
        .encrypt(&nonce, plain.as_bytes())
        .map_err(|e| OperatorError::Encryption(format!("sealing value: {e}")))?;
    Ok(format!(
        "{BOX_PREFIX}{}:{}:{}]",
        STANDARD.encode(ephemeral.public_key().as_bytes()),
        STANDARD.encode(nonce.as_slice()),
        STANDARD.encode(boxed)
    ))
}

fn open(secret: &SecretKey, boxed: &str) -> Result<String> {
    let inner = &boxed[BOX_PREFIX.len()..boxed.len() - 1];
    let parts: Vec<&str> = inner.split(':').collect();
    let [encrypter, nonce, sealed] = parts.as_slice() else {
        return Err(OperatorError::Encryption("malformed boxed value".to_string()));
    };
    let decode = |part: &str| {
        STANDARD
            .decode(part)
            .map_err(|e| OperatorError::Encryption(format!("decoding boxed value: {e}")))
    };
    let encrypter: [u8; 32] = decode(*encrypter)?
        .try_into()
        .map_err(|_bytes: Vec<u8>| OperatorError::Encryption("bad encrypter key length".to_string()))?;
    let nonce = decode(*nonce)?;
    if nonce.len() != NONCE_LEN {
        return Err(OperatorError::Encryption("bad nonce length".to_string()));
    }
    let plain = SalsaBox::new(&PublicKey::from(encrypter), secret)
        .decrypt(Nonce::from_slice(&nonce), decode(*sealed)?.as_slice())
        .map_err(|e| OperatorError::Encryption(format!("opening value: {e}")))?;
    String::from_utf8(plain)
        .map_err(|e| OperatorError::Encryption(format!("decrypted value is not UTF-8: {e}")))
}

fn to_pretty_bytes(doc: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(doc).map_err(|e| OperatorError::json("serializing ejson document", e))
}
