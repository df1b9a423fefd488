//! Key Management
//!
//! Decodes the client's WIF private key and derives the compressed public key
//! and pay-to-pubkey-hash address the hub and chain RPCs expect.
//!
//! Security: the WIF string is kept in a `Zeroizing<String>` so it is
//! overwritten when the key is dropped. Signing itself is delegated to the
//! [`Signer`](crate::hub::Signer) collaborator, which receives the WIF.

use k256::{elliptic_curve::sec1::ToEncodedPoint, SecretKey};
use zeroize::Zeroizing;

use crate::error::{ChannelError, ChannelResult};
use crate::secrets::hash160;

/// WIF version byte for mainnet keys
const MAINNET_WIF_VERSION: u8 = 0x80;

/// WIF version byte for testnet keys
const TESTNET_WIF_VERSION: u8 = 0xef;

/// Suffix marking a WIF key whose public key is compressed
const COMPRESSED_FLAG: u8 = 0x01;

/// Network a key belongs to, inferred from the WIF version byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    fn address_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }
}

/// A client private key in wallet import format.
#[derive(Clone)]
pub struct ClientKey {
    wif: Zeroizing<String>,
    network: Network,
    compressed: bool,
    public_key: Vec<u8>,
}

impl std::fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClientKey {{ address: {} }}", self.address())
    }
}

impl ClientKey {
    /// Decode a WIF private key
    pub fn from_wif(wif: &str) -> ChannelResult<Self> {
        let payload = Zeroizing::new(
            bs58::decode(wif.trim())
                .with_check(None)
                .into_vec()
                .map_err(|e| ChannelError::InvalidKey(format!("bad base58check: {}", e)))?,
        );

        let network = match payload.first() {
            Some(&MAINNET_WIF_VERSION) => Network::Mainnet,
            Some(&TESTNET_WIF_VERSION) => Network::Testnet,
            Some(other) => {
                return Err(ChannelError::InvalidKey(format!(
                    "unknown WIF version byte {:#04x}",
                    other
                )))
            }
            None => return Err(ChannelError::InvalidKey("empty WIF payload".to_string())),
        };

        let compressed = match payload.len() {
            33 => false,
            34 if payload[33] == COMPRESSED_FLAG => true,
            n => {
                return Err(ChannelError::InvalidKey(format!(
                    "unexpected WIF payload length {}",
                    n
                )))
            }
        };

        let secret = SecretKey::from_slice(&payload[1..33])
            .map_err(|_| ChannelError::InvalidKey("scalar out of range".to_string()))?;
        let public_key = secret
            .public_key()
            .to_encoded_point(compressed)
            .as_bytes()
            .to_vec();

        Ok(Self {
            wif: Zeroizing::new(wif.trim().to_string()),
            network,
            compressed,
            public_key,
        })
    }

    /// The WIF string, for handing to the signer
    pub fn wif(&self) -> &str {
        &self.wif
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// SEC1 encoded public key, hex
    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }

    /// Base58check pay-to-pubkey-hash address
    pub fn address(&self) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.network.address_version());
        payload.extend_from_slice(&hash160(&self.public_key));
        bs58::encode(payload).with_check().into_string()
    }
}

/// Encode a raw 32-byte secret as a WIF key.
#[cfg(test)]
fn encode_wif(secret: &[u8; 32], network: Network, compressed: bool) -> String {
    let mut payload = Zeroizing::new(Vec::with_capacity(34));
    payload.push(match network {
        Network::Mainnet => MAINNET_WIF_VERSION,
        Network::Testnet => TESTNET_WIF_VERSION,
    });
    payload.extend_from_slice(secret);
    if compressed {
        payload.push(COMPRESSED_FLAG);
    }
    bs58::encode(payload.as_slice()).with_check().into_string()
}
