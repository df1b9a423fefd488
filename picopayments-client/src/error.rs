//! Error types for the channel client.

use displaydoc::Display;
use thiserror::Error;

/// Errors surfaced by channel operations.
///
/// Every variant reaches the caller unchanged; nothing here is retried or
/// recovered locally.
#[derive(Debug, Display, Error)]
pub enum ChannelError {
    /// Operation requires an established hub connection
    NotConnected,

    /// Client is already connected to a hub
    AlreadyConnected,

    /// Requested {field} of {requested} exceeds the hub limit of {limit}
    TermsViolation {
        /// Which term was exceeded
        field: &'static str,
        /// The value the client asked for
        requested: u64,
        /// The hub-advertised ceiling
        limit: u64,
    },

    /// Secret hash {0} is already mapped to a different value
    DuplicateSecret(String),

    /// Corrupt channel state: {0}
    CorruptState(String),

    /// Malformed or inconsistent hub response: {0}
    RemoteProtocol(String),

    /// Signing failed: {0}
    Signature(String),

    /// Transaction broadcast failed: {0}
    Broadcast(String),

    /// Deposit signed but not broadcast: {reason}
    DepositUnconfirmed {
        /// The signed c2h deposit transaction, ready to be rebroadcast
        signed_rawtx: String,
        /// Why the broadcast failed
        reason: String,
    },

    /// Transport error: {0}
    Transport(String),

    /// Invalid channel parameters: {0}
    InvalidParams(String),

    /// Invalid key: {0}
    InvalidKey(String),

    /// I/O error: {0}
    Io(String),
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        ChannelError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        ChannelError::CorruptState(err.to_string())
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        ChannelError::Transport(err.to_string())
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;
