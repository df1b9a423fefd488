//! Picopayments Channel Client
//!
//! Client side of a bidirectional micropayment channel with a picopayments
//! hub. The client opens a channel by funding a client-to-hub deposit,
//! signs commits that move value to the hub, and queues payments for the
//! hub to route.
//!
//! ## Trust Model
//!
//! - The client key never leaves the client; signing is done by a local
//!   [`Signer`]
//! - The hub is a counterparty: every hash and script it returns is checked
//!   before it is stored
//! - Persisted state is validated as a whole before it is used again

pub mod client;
pub mod config;
pub mod error;
pub mod hub;
pub mod keys;
pub mod rpc;
pub mod secrets;
pub mod state;
pub mod storage;
pub mod terms;

pub use client::{Client, Collaborators, ConnectParams, SignedCommit};
pub use config::ClientConfig;
pub use error::{ChannelError, ChannelResult};
pub use hub::{ChainAccess, HubService, Signer};
pub use keys::ClientKey;
pub use rpc::{HubConnection, HubRpc};
pub use secrets::SecretStore;
pub use state::{ChannelState, Payment};
pub use storage::ClientRecord;
pub use terms::ChannelTerms;
