//! Collaborator interfaces
//!
//! The channel client talks to three outside parties:
//! - the hub service, which runs the other side of the channel protocol
//! - the chain, for raw transaction lookup, construction and broadcast
//! - a signer, which signs raw transactions with the client key
//!
//! Each remote operation is its own trait method so that tests can fake them
//! one at a time. Request and response types mirror the hub's JSON-RPC
//! parameters and results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, ChannelResult};
use crate::keys::ClientKey;
use crate::terms::ChannelTerms;

/// Dust size used for plain on-chain sends
pub const REGULAR_DUST_SIZE: u64 = 200_000;

// ============================================================================
// Hub requests and responses
// ============================================================================

/// Parameters of `mpc_hub_request`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub asset: String,
    /// Callback URL of the client, if it runs its own endpoint
    pub url: Option<String>,
    /// Hash of the h2c spend secret
    pub spend_secret_hash: String,
}

/// Result of `mpc_hub_request`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionResponse {
    pub handle: String,
    pub channel_terms: ChannelTerms,
    #[serde(rename = "pubkey")]
    pub hub_pubkey: String,
    /// Hash of the c2h spend secret, held by the hub
    pub spend_secret_hash: String,
}

/// Parameters of `mpc_make_deposit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    pub asset: String,
    pub payer_pubkey: String,
    pub payee_pubkey: String,
    pub spend_secret_hash: String,
    pub expire_time: u64,
    pub quantity: u64,
}

/// Result of `mpc_make_deposit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositResponse {
    /// Opaque channel construction state
    pub state: Value,
    /// Unsigned deposit transaction
    #[serde(rename = "topublish")]
    pub unsigned_rawtx: String,
}

impl DepositResponse {
    /// The depositing script carried inside the construction state
    pub fn deposit_script(&self) -> ChannelResult<&str> {
        deposit_script_of(&self.state)
    }
}

/// Extract `deposit_script` from an opaque channel construction state.
pub fn deposit_script_of(state: &Value) -> ChannelResult<&str> {
    state
        .get("deposit_script")
        .and_then(Value::as_str)
        .filter(|script| !script.is_empty())
        .ok_or_else(|| {
            ChannelError::RemoteProtocol("channel state has no deposit script".to_string())
        })
}

/// Parameters of `mpc_hub_deposit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositScriptsRequest {
    pub handle: String,
    pub asset: String,
    /// The c2h deposit script
    pub deposit_script: String,
    /// Hash of the first h2c revocation secret
    pub next_revoke_secret_hash: String,
}

/// Result of `mpc_hub_deposit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositScriptsResponse {
    /// The h2c deposit script
    pub deposit_script: String,
    /// Hash of the hub's first c2h revocation secret
    pub next_revoke_secret_hash: String,
}

/// Parameters of `mpc_create_commit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub state: Value,
    pub quantity: u64,
    pub revoke_secret_hash: String,
    pub delay_time: u64,
}

/// Transactions returned for signing by `mpc_create_commit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitToSign {
    pub commit_rawtx: String,
    pub deposit_script: String,
}

/// Result of `mpc_create_commit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitResponse {
    pub commit_script: String,
    pub tosign: CommitToSign,
    /// Updated construction state, when the hub returns one
    #[serde(default)]
    pub state: Option<Value>,
    /// Revoke secret hash the hub commits to for the following commit
    #[serde(default)]
    pub next_revoke_secret_hash: Option<String>,
}

/// Parameters of `create_send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub source: String,
    pub destination: String,
    pub asset: String,
    pub quantity: u64,
    pub regular_dust_size: u64,
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// The remote hub service.
#[async_trait]
pub trait HubService: Send + Sync {
    /// Ask the hub for a channel handle.
    async fn request_connection(
        &self,
        request: &ConnectionRequest,
    ) -> ChannelResult<ConnectionResponse>;

    /// Build the unsigned c2h deposit.
    async fn build_deposit(&self, request: &DepositRequest) -> ChannelResult<DepositResponse>;

    /// Trade the c2h deposit script for the hub's h2c deposit script.
    async fn exchange_deposit_scripts(
        &self,
        request: &DepositScriptsRequest,
    ) -> ChannelResult<DepositScriptsResponse>;

    /// Build an unsigned c2h commit.
    async fn create_commit(&self, request: &CommitRequest) -> ChannelResult<CommitResponse>;
}

/// Read and write access to the settlement chain.
#[async_trait]
pub trait ChainAccess: Send + Sync {
    /// Fetch a raw transaction by id.
    async fn get_transaction(&self, txid: &str) -> ChannelResult<String>;

    /// Broadcast a signed raw transaction, returning its id.
    async fn broadcast(&self, signed_rawtx: &str) -> ChannelResult<String>;

    /// Construct an unsigned asset send.
    async fn create_send(&self, request: &SendRequest) -> ChannelResult<String>;
}

/// Signs raw transactions with the client key.
///
/// Implementations may look up the transactions being spent through `chain`.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign a deposit (or plain send) transaction.
    async fn sign_deposit(
        &self,
        chain: &dyn ChainAccess,
        key: &ClientKey,
        unsigned_rawtx: &str,
    ) -> ChannelResult<String>;

    /// Sign a commit transaction spending from `deposit_script`.
    async fn sign_commit(
        &self,
        chain: &dyn ChainAccess,
        key: &ClientKey,
        unsigned_rawtx: &str,
        deposit_script: &str,
    ) -> ChannelResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_response_field_names() {
        let response: ConnectionResponse = serde_json::from_value(json!({
            "handle": "h1",
            "channel_terms": {"deposit_limit": 0, "timeout_limit": 0},
            "pubkey": "02aa",
            "spend_secret_hash": "bb",
        }))
        .unwrap();
        assert_eq!(response.hub_pubkey, "02aa");
        assert!(response.channel_terms.is_unlimited());
    }

    #[test]
    fn test_deposit_script_from_state() {
        let response: DepositResponse = serde_json::from_value(json!({
            "state": {"deposit_script": "51ae", "commits_active": []},
            "topublish": "0100",
        }))
        .unwrap();
        assert_eq!(response.deposit_script().unwrap(), "51ae");
        assert_eq!(response.unsigned_rawtx, "0100");

        let missing = DepositResponse {
            state: json!({}),
            unsigned_rawtx: String::new(),
        };
        assert!(matches!(
            missing.deposit_script(),
            Err(ChannelError::RemoteProtocol(_))
        ));
    }

    #[test]
    fn test_commit_response_optional_fields() {
        let response: CommitResponse = serde_json::from_value(json!({
            "commit_script": "63",
            "tosign": {"commit_rawtx": "0100", "deposit_script": "51"},
        }))
        .unwrap();
        assert_eq!(response.state, None);
        assert_eq!(response.next_revoke_secret_hash, None);
    }

    #[test]
    fn test_connection_request_serializes_null_url() {
        let request = ConnectionRequest {
            asset: "XCP".to_string(),
            url: None,
            spend_secret_hash: "aa".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["url"], Value::Null);
        assert_eq!(value["asset"], "XCP");
    }
}
