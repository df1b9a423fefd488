//! Secret Store
//!
//! Holds every spend and revocation secret generated for a channel, keyed by
//! its HASH160 commitment. Secrets are hex encoded 32-byte values and the
//! store is append-only: a superseded secret can still be needed to punish a
//! stale commit, so nothing is ever removed.

use rand_core::CryptoRngCore;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{btree_map::Entry, BTreeMap};

use crate::error::{ChannelError, ChannelResult};

/// Size of a secret value (and of a payment token) in bytes
pub const SECRET_LEN: usize = 32;

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// HASH160 of hex encoded data, hex encoded.
pub fn hash160_hex(hex_data: &str) -> ChannelResult<String> {
    let bytes = hex::decode(hex_data)
        .map_err(|e| ChannelError::CorruptState(format!("invalid hex secret: {}", e)))?;
    Ok(hex::encode(hash160(&bytes)))
}

/// Draw [`SECRET_LEN`] random bytes and hex encode them.
pub fn random_hex<R: CryptoRngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; SECRET_LEN];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Append-only map of secret hash to secret value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretStore {
    secrets: BTreeMap<String, String>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh secret and store it.
    ///
    /// Returns `(secret_value, secret_hash)`. The insert is collision checked:
    /// a hash that is already present is rejected rather than overwritten.
    pub fn generate<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> ChannelResult<(String, String)> {
        let value = random_hex(rng);
        let hash = hash160_hex(&value)?;

        match self.secrets.entry(hash.clone()) {
            Entry::Occupied(_) => Err(ChannelError::DuplicateSecret(hash)),
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                Ok((value, hash))
            }
        }
    }

    /// Record a secret revealed by the counterparty.
    ///
    /// The value must hash to `hash`. Recording the same pair twice is a
    /// no-op; a different value under an existing hash is rejected.
    pub fn record(&mut self, hash: &str, value: &str) -> ChannelResult<()> {
        let bytes = hex::decode(value).map_err(|e| {
            ChannelError::RemoteProtocol(format!("secret for {} is not hex: {}", hash, e))
        })?;
        if hex::encode(hash160(&bytes)) != hash {
            return Err(ChannelError::RemoteProtocol(format!(
                "secret does not match hash {}",
                hash
            )));
        }

        match self.secrets.entry(hash.to_string()) {
            Entry::Occupied(existing) if existing.get() == value => Ok(()),
            Entry::Occupied(_) => Err(ChannelError::DuplicateSecret(hash.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(value.to_string());
                Ok(())
            }
        }
    }

    /// Check that every stored value hashes to its key.
    pub fn verify(&self) -> ChannelResult<()> {
        for (hash, value) in &self.secrets {
            if &hash160_hex(value)? != hash {
                return Err(ChannelError::CorruptState(format!(
                    "stored secret does not match hash {}",
                    hash
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, hash: &str) -> Option<&str> {
        self.secrets.get(hash).map(String::as_str)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.secrets.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Iterate `(hash, value)` pairs in hash order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.secrets
            .iter()
            .map(|(hash, value)| (hash.as_str(), value.as_str()))
    }
}
