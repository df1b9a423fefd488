//! Hub JSON-RPC Client
//!
//! Talks JSON-RPC 2.0 over HTTP to a picopayments hub. The hub serves both
//! the channel protocol calls and a pass-through to its chain backend, so a
//! single [`HubRpc`] implements [`HubService`] and [`ChainAccess`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::error::{ChannelError, ChannelResult};
use crate::hub::{
    ChainAccess, CommitRequest, CommitResponse, ConnectionRequest, ConnectionResponse,
    DepositRequest, DepositResponse, DepositScriptsRequest, DepositScriptsResponse, HubService,
    SendRequest,
};
use crate::storage::required;

/// Timeout for RPC requests
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

/// Everything needed to rebuild the hub client after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConnection {
    /// JSON-RPC endpoint of the hub
    pub url: String,

    /// Client key in wallet import format
    #[serde(deserialize_with = "required::deserialize")]
    pub auth_wif: Option<String>,

    /// HTTP basic auth user
    #[serde(deserialize_with = "required::deserialize")]
    pub username: Option<String>,

    /// HTTP basic auth password
    #[serde(deserialize_with = "required::deserialize")]
    pub password: Option<String>,

    /// Verify the hub's TLS certificate
    pub verify_ssl_cert: bool,
}

impl HubConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_wif: None,
            username: None,
            password: None,
            verify_ssl_cert: true,
        }
    }
}

/// JSON-RPC client for a single hub
#[derive(Debug)]
pub struct HubRpc {
    connection: HubConnection,
    client: reqwest::Client,
}

impl HubRpc {
    pub fn new(connection: HubConnection) -> ChannelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .danger_accept_invalid_certs(!connection.verify_ssl_cert)
            .build()?;

        if !connection.verify_ssl_cert {
            warn!("TLS certificate verification disabled for {}", connection.url);
        }

        Ok(Self { connection, client })
    }

    pub fn connection(&self) -> &HubConnection {
        &self.connection
    }

    /// Issue one JSON-RPC call
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChannelResult<T> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let start = Instant::now();

        let mut builder = self.client.post(&self.connection.url).json(&request);
        if let Some(username) = &self.connection.username {
            builder = builder.basic_auth(username, self.connection.password.as_ref());
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(ChannelError::Transport(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        debug!(
            "{} (id {}) answered in {}ms",
            method,
            id,
            start.elapsed().as_millis()
        );

        parse_response(method, &body)
    }

    fn params<P: Serialize>(params: &P) -> ChannelResult<Value> {
        serde_json::to_value(params)
            .map_err(|e| ChannelError::Transport(format!("failed to encode params: {}", e)))
    }
}

/// Decode a JSON-RPC response body.
fn parse_response<T: DeserializeOwned>(method: &str, body: &str) -> ChannelResult<T> {
    let response: JsonRpcResponse<T> = serde_json::from_str(body).map_err(|e| {
        ChannelError::RemoteProtocol(format!("malformed {} response: {}", method, e))
    })?;

    if let Some(error) = response.error {
        return Err(ChannelError::RemoteProtocol(format!(
            "{} failed with RPC error {}: {}",
            method, error.code, error.message
        )));
    }

    response
        .result
        .ok_or_else(|| ChannelError::RemoteProtocol(format!("missing result in {} response", method)))
}

#[async_trait]
impl HubService for HubRpc {
    async fn request_connection(
        &self,
        request: &ConnectionRequest,
    ) -> ChannelResult<ConnectionResponse> {
        self.call("mpc_hub_request", Self::params(request)?).await
    }

    async fn build_deposit(&self, request: &DepositRequest) -> ChannelResult<DepositResponse> {
        self.call("mpc_make_deposit", Self::params(request)?).await
    }

    async fn exchange_deposit_scripts(
        &self,
        request: &DepositScriptsRequest,
    ) -> ChannelResult<DepositScriptsResponse> {
        self.call("mpc_hub_deposit", Self::params(request)?).await
    }

    async fn create_commit(&self, request: &CommitRequest) -> ChannelResult<CommitResponse> {
        self.call("mpc_create_commit", Self::params(request)?).await
    }
}

#[async_trait]
impl ChainAccess for HubRpc {
    async fn get_transaction(&self, txid: &str) -> ChannelResult<String> {
        self.call("getrawtransaction", json!({ "tx_hash": txid }))
            .await
    }

    async fn broadcast(&self, signed_rawtx: &str) -> ChannelResult<String> {
        self.call("sendrawtransaction", json!({ "tx_hex": signed_rawtx }))
            .await
            .map_err(|e| ChannelError::Broadcast(e.to_string()))
    }

    async fn create_send(&self, request: &SendRequest) -> ChannelResult<String> {
        self.call("create_send", Self::params(request)?).await
    }
}
