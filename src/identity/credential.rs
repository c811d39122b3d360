use std::fmt::{Debug, Formatter};

use anyhow::{anyhow, Context, Result};
use base64::Engine;

/// Password material for one attempt. Never printed.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(s: S) -> Self { Secret(s.into()) }

    pub fn expose(&self) -> &str { &self.0 }

    /// Compares without an early exit on the first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let a = self.0.as_bytes();
        let b = candidate.as_bytes();
        if a.len() != b.len() { return false; }
        a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str("Secret(***)") }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self { Secret(s.to_string()) }
}

impl From<String> for Secret {
    fn from(s: String) -> Self { Secret(s) }
}

/// SSH public key: algorithm name plus the wire-format key blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    algorithm: String,
    key: Vec<u8>,
}

impl PublicKey {
    pub fn new<S: Into<String>>(algorithm: S, key: Vec<u8>) -> Self {
        Self { algorithm: algorithm.into(), key }
    }

    /// Build from a wire blob; the algorithm is the blob's leading length-prefixed string.
    pub fn from_blob(key: Vec<u8>) -> Result<Self> {
        let algorithm = blob_algorithm(&key).ok_or_else(|| anyhow!("key blob has no algorithm header"))?;
        Ok(Self { algorithm, key })
    }

    /// Accepts `authorized_keys` form (`ssh-ed25519 AAAA... comment`) or a bare base64 blob.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split_whitespace();
        let first = parts.next().ok_or_else(|| anyhow!("empty public key"))?;
        match parts.next() {
            Some(b64) => {
                let key = base64::engine::general_purpose::STANDARD
                    .decode(b64)
                    .with_context(|| format!("invalid base64 in {} key", first))?;
                if let Some(embedded) = blob_algorithm(&key) {
                    if embedded != first {
                        return Err(anyhow!("key type '{}' does not match blob type '{}'", first, embedded));
                    }
                }
                Ok(Self::new(first, key))
            }
            None => {
                let key = base64::engine::general_purpose::STANDARD
                    .decode(first)
                    .context("invalid base64 public key")?;
                Self::from_blob(key)
            }
        }
    }

    pub fn algorithm(&self) -> &str { &self.algorithm }

    pub fn key(&self) -> &[u8] { &self.key }

    pub fn to_openssh(&self) -> String {
        format!("{} {}", self.algorithm, base64::engine::general_purpose::STANDARD.encode(&self.key))
    }
}

fn blob_algorithm(blob: &[u8]) -> Option<String> {
    let len_bytes: [u8; 4] = blob.get(..4)?.try_into().ok()?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    let name = blob.get(4..4usize.checked_add(len)?)?;
    if name.is_empty() { return None; }
    std::str::from_utf8(name).ok().map(|s| s.to_string())
}

#[derive(Debug, Clone)]
pub enum Proof {
    Secret(Secret),
    PublicKey(PublicKey),
}

/// One authentication attempt: who the peer claims to be and what it offered as proof.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    pub identity: String,
    pub proof: Proof,
}

impl CredentialRequest {
    pub fn password<S: Into<String>>(identity: S, secret: Secret) -> Self {
        Self { identity: identity.into(), proof: Proof::Secret(secret) }
    }

    pub fn public_key<S: Into<String>>(identity: S, key: PublicKey) -> Self {
        Self { identity: identity.into(), proof: Proof::PublicKey(key) }
    }

    pub fn secret(&self) -> Option<&Secret> {
        match &self.proof { Proof::Secret(s) => Some(s), Proof::PublicKey(_) => None }
    }

    pub fn key(&self) -> Option<&PublicKey> {
        match &self.proof { Proof::PublicKey(k) => Some(k), Proof::Secret(_) => None }
    }
}
