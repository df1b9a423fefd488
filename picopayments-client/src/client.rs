//! Channel Client
//!
//! Drives one client-hub relationship: the connection handshake that funds
//! the c2h deposit, commit creation, payment queueing and persistence of the
//! whole thing as a [`ClientRecord`].

use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ChannelError, ChannelResult};
use crate::hub::{
    ChainAccess, CommitRequest, ConnectionRequest, ConnectionResponse, DepositRequest,
    DepositScriptsRequest, DepositScriptsResponse, HubService, SendRequest, Signer,
    REGULAR_DUST_SIZE,
};
use crate::keys::ClientKey;
use crate::rpc::{HubConnection, HubRpc};
use crate::secrets::{random_hex, SecretStore};
use crate::state::{C2hChannel, ChannelState, H2cChannel, Payment};
use crate::storage::ClientRecord;

/// Asset used when a connection does not name one
pub const DEFAULT_ASSET: &str = "XCP";

/// Commit delay, in blocks, used when a connection does not name one
pub const DEFAULT_DELAY_TIME: u64 = 2;

/// The outside parties a client works through
#[derive(Clone)]
pub struct Collaborators {
    pub hub: Arc<dyn HubService>,
    pub chain: Arc<dyn ChainAccess>,
    pub signer: Arc<dyn Signer>,
}

impl Collaborators {
    /// Hub and chain access over JSON-RPC to `connection`, with a local signer.
    pub fn rpc(connection: &HubConnection, signer: Arc<dyn Signer>) -> ChannelResult<Self> {
        let rpc = Arc::new(HubRpc::new(connection.clone())?);
        Ok(Self {
            hub: rpc.clone(),
            chain: rpc,
            signer,
        })
    }
}

/// Parameters of a new channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Amount to lock in the c2h deposit
    pub quantity: u64,
    /// Deposit expiry, in blocks
    pub expire_time: u64,
    pub asset: String,
    /// Relative timelock on commits, in blocks
    pub delay_time: u64,
    /// Callback URL announced to the hub
    pub own_url: Option<String>,
}

impl ConnectParams {
    pub fn new(quantity: u64, expire_time: u64) -> Self {
        Self {
            quantity,
            expire_time,
            asset: DEFAULT_ASSET.to_string(),
            delay_time: DEFAULT_DELAY_TIME,
            own_url: None,
        }
    }

    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = asset.into();
        self
    }

    pub fn with_delay_time(mut self, delay_time: u64) -> Self {
        self.delay_time = delay_time;
        self
    }

    pub fn with_own_url(mut self, own_url: impl Into<String>) -> Self {
        self.own_url = Some(own_url.into());
        self
    }

    /// Local sanity checks, run before anything is sent to the hub.
    pub fn validate(&self) -> ChannelResult<()> {
        if self.asset.is_empty() {
            return Err(invalid_params("asset must not be empty"));
        }
        if self.delay_time == 0 {
            return Err(invalid_params("delay time must be at least one block"));
        }
        if let Some(own_url) = &self.own_url {
            url::Url::parse(own_url)
                .map_err(|e| invalid_params(&format!("own url is not a valid URL: {}", e)))?;
        }
        Ok(())
    }
}

fn invalid_params(reason: &str) -> ChannelError {
    ChannelError::InvalidParams(reason.to_string())
}

/// A signed c2h commit, ready to hand to the hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCommit {
    pub rawtx: String,
    pub script: String,
}

/// Client side of a picopayments channel
pub struct Client {
    connection: HubConnection,
    key: Option<ClientKey>,
    hub: Arc<dyn HubService>,
    chain: Arc<dyn ChainAccess>,
    signer: Arc<dyn Signer>,
    rng: Box<dyn CryptoRngCore + Send>,
    channel: Option<ChannelState>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("hub", &self.connection.url)
            .field("key", &self.key)
            .field(
                "handle",
                &self.channel.as_ref().map(ChannelState::handle),
            )
            .finish()
    }
}

impl Client {
    /// Create a disconnected client.
    ///
    /// The client key is decoded from `connection.auth_wif` when present.
    pub fn new(
        connection: HubConnection,
        collaborators: Collaborators,
        rng: Box<dyn CryptoRngCore + Send>,
    ) -> ChannelResult<Self> {
        let key = connection
            .auth_wif
            .as_deref()
            .map(ClientKey::from_wif)
            .transpose()?;

        Ok(Self {
            connection,
            key,
            hub: collaborators.hub,
            chain: collaborators.chain,
            signer: collaborators.signer,
            rng,
            channel: None,
        })
    }

    /// Restore a client from a persisted record.
    ///
    /// The record is validated again, and a stored channel must belong to
    /// the key in the record's hub connection.
    pub fn deserialize(
        record: ClientRecord,
        collaborators: Collaborators,
        rng: Box<dyn CryptoRngCore + Send>,
    ) -> ChannelResult<Self> {
        record.validate()?;

        let mut client = Self::new(record.hub, collaborators, rng)?;
        if let Some(channel) = record.channel {
            if let Some(key) = &client.key {
                if key.public_key_hex() != channel.client_pubkey() {
                    return Err(ChannelError::CorruptState(
                        "channel client_pubkey does not match auth_wif".to_string(),
                    ));
                }
            }
            debug!("Restored channel {}", channel.handle());
            client.channel = Some(channel);
        }
        Ok(client)
    }

    /// Snapshot of everything needed to resume this client.
    pub fn serialize(&self) -> ClientRecord {
        ClientRecord::new(self.connection.clone(), self.channel.clone())
    }

    pub fn connected(&self) -> bool {
        self.channel.is_some()
    }

    pub fn channel(&self) -> Option<&ChannelState> {
        self.channel.as_ref()
    }

    pub fn connection(&self) -> &HubConnection {
        &self.connection
    }

    pub fn key(&self) -> Option<&ClientKey> {
        self.key.as_ref()
    }

    /// Open a channel with the hub and publish the c2h deposit.
    ///
    /// Returns the deposit txid. Nothing is installed unless the handshake
    /// completes; if only the final broadcast fails, the channel is installed
    /// and `DepositUnconfirmed` carries the signed deposit for
    /// [`Client::publish_deposit`].
    pub async fn connect(&mut self, params: ConnectParams) -> ChannelResult<String> {
        if self.channel.is_some() {
            return Err(ChannelError::AlreadyConnected);
        }
        params.validate()?;
        let key = self.require_key()?.clone();

        info!(
            "Connecting to {} ({} {}, expire {}, delay {})",
            self.connection.url, params.quantity, params.asset, params.expire_time, params.delay_time
        );

        let handshake = Handshake::new(self.rng.as_mut())?;
        debug!(
            "Generated h2c spend secret {} and revoke secret {}",
            handshake.h2c_spend_secret_hash, handshake.h2c_next_revoke_secret_hash
        );

        let connection = self
            .hub
            .request_connection(&ConnectionRequest {
                asset: params.asset.clone(),
                url: params.own_url.clone(),
                spend_secret_hash: handshake.h2c_spend_secret_hash.clone(),
            })
            .await?;
        handshake.check_connection(&connection)?;
        info!(
            "Hub assigned handle {} (deposit limit {}, timeout limit {})",
            connection.handle,
            connection.channel_terms.deposit_limit,
            connection.channel_terms.timeout_limit
        );

        connection
            .channel_terms
            .validate(params.quantity, params.expire_time)?;
        debug!("Channel terms accepted");

        let deposit = self
            .hub
            .build_deposit(&DepositRequest {
                asset: params.asset.clone(),
                payer_pubkey: key.public_key_hex(),
                payee_pubkey: connection.hub_pubkey.clone(),
                spend_secret_hash: connection.spend_secret_hash.clone(),
                expire_time: params.expire_time,
                quantity: params.quantity,
            })
            .await?;
        let c2h_deposit_script = deposit.deposit_script()?.to_string();
        if deposit.unsigned_rawtx.is_empty() {
            return Err(ChannelError::RemoteProtocol(
                "hub returned an empty deposit transaction".to_string(),
            ));
        }
        debug!("Deposit built for handle {}", connection.handle);

        let scripts = self
            .hub
            .exchange_deposit_scripts(&DepositScriptsRequest {
                handle: connection.handle.clone(),
                asset: params.asset.clone(),
                deposit_script: c2h_deposit_script,
                next_revoke_secret_hash: handshake.h2c_next_revoke_secret_hash.clone(),
            })
            .await?;
        handshake.check_scripts(&scripts)?;
        debug!("Deposit scripts exchanged for handle {}", connection.handle);

        let channel = ChannelState {
            handle: connection.handle,
            asset: params.asset.clone(),
            channel_terms: connection.channel_terms,
            client_pubkey: key.public_key_hex(),
            hub_pubkey: connection.hub_pubkey,
            secrets: handshake.secrets,
            h2c_spend_secret_hash: handshake.h2c_spend_secret_hash,
            c2h: C2hChannel {
                state: deposit.state,
                spend_secret_hash: connection.spend_secret_hash,
                commit_delay_time: params.delay_time,
                next_revoke_secret_hash: scripts.next_revoke_secret_hash,
                deposit_expire_time: params.expire_time,
                deposit_quantity: params.quantity,
                commits_issued: Vec::new(),
            },
            h2c: H2cChannel::new(params.asset, scripts.deposit_script),
            payments_sent: Vec::new(),
            payments_received: Vec::new(),
            payments_queued: Vec::new(),
        };
        channel.validate().map_err(|e| {
            ChannelError::RemoteProtocol(format!("hub handshake produced an invalid channel: {}", e))
        })?;

        let signed_rawtx = self
            .signer
            .sign_deposit(self.chain.as_ref(), &key, &deposit.unsigned_rawtx)
            .await?;

        let handle = channel.handle().to_string();
        self.channel = Some(channel);

        match self.chain.broadcast(&signed_rawtx).await {
            Ok(txid) => {
                info!("Channel {} funded by deposit {}", handle, txid);
                Ok(txid)
            }
            Err(e) => {
                warn!("Deposit broadcast for channel {} failed: {}", handle, e);
                Err(ChannelError::DepositUnconfirmed {
                    signed_rawtx,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Broadcast a signed deposit again after a failed publish.
    pub async fn publish_deposit(&mut self, signed_rawtx: &str) -> ChannelResult<String> {
        let handle = self.require_channel()?.handle().to_string();
        let txid = self.chain.broadcast(signed_rawtx).await?;
        info!("Channel {} funded by deposit {}", handle, txid);
        Ok(txid)
    }

    /// Create and sign the next c2h commit for `quantity`.
    ///
    /// The commit is not broadcast. On success the revoke secret hash rotates
    /// to the one the hub supplied for the following commit.
    pub async fn create_commit(&mut self, quantity: u64) -> ChannelResult<SignedCommit> {
        let channel = self.channel.as_ref().ok_or(ChannelError::NotConnected)?;
        let key = self.require_key()?;

        let revoke_secret_hash = channel.c2h().next_revoke_secret_hash.clone();
        let request = CommitRequest {
            state: channel.c2h().state.clone(),
            quantity,
            revoke_secret_hash: revoke_secret_hash.clone(),
            delay_time: channel.c2h().commit_delay_time,
        };
        debug!(
            "Requesting commit for {} on channel {} (revoke hash {})",
            quantity,
            channel.handle(),
            revoke_secret_hash
        );

        let response = self.hub.create_commit(&request).await?;
        if response.commit_script.is_empty() || response.tosign.commit_rawtx.is_empty() {
            return Err(ChannelError::RemoteProtocol(
                "hub returned an empty commit".to_string(),
            ));
        }
        let next_revoke_secret_hash = response.next_revoke_secret_hash.ok_or_else(|| {
            ChannelError::RemoteProtocol("commit response has no next revoke secret hash".to_string())
        })?;

        let rawtx = self
            .signer
            .sign_commit(
                self.chain.as_ref(),
                key,
                &response.tosign.commit_rawtx,
                &response.tosign.deposit_script,
            )
            .await?;

        let channel = self.channel.as_mut().ok_or(ChannelError::NotConnected)?;
        channel.apply_commit(
            &revoke_secret_hash,
            quantity,
            &response.commit_script,
            response.state,
            &next_revoke_secret_hash,
        )?;
        info!(
            "Commit {} for {} signed on channel {}",
            channel.c2h().commits_issued.len(),
            quantity,
            channel.handle()
        );

        Ok(SignedCommit {
            rawtx,
            script: response.commit_script,
        })
    }

    /// Queue a payment to `payee_handle`, returning its token.
    ///
    /// A fresh random token is generated when none is given.
    pub fn queue(
        &mut self,
        payee_handle: &str,
        amount: u64,
        token: Option<String>,
    ) -> ChannelResult<String> {
        let channel = self.channel.as_mut().ok_or(ChannelError::NotConnected)?;
        let token = match token {
            Some(token) => token,
            None => random_hex(self.rng.as_mut()),
        };

        channel.queue_payment(Payment {
            payee_handle: payee_handle.to_string(),
            amount,
            token: token.clone(),
        });
        debug!(
            "Queued payment of {} to {} ({} queued)",
            amount,
            payee_handle,
            channel.payments_queued().len()
        );
        Ok(token)
    }

    /// Reconcile h2c commits with the hub.
    pub async fn sync(&mut self) -> ChannelResult<()> {
        let channel = self.require_channel()?;
        // TODO: exchange requested/active/revoked h2c commits with the hub once
        // a reconciliation RPC is defined; until then nothing is mutated.
        debug!("Sync requested for channel {}", channel.handle());
        Ok(())
    }

    /// Plain on-chain send of `quantity` of `asset`, outside any channel.
    pub async fn block_send(
        &mut self,
        source_wif: &str,
        destination: &str,
        asset: &str,
        quantity: u64,
    ) -> ChannelResult<String> {
        let key = ClientKey::from_wif(source_wif)?;
        let source = key.address();

        let unsigned_rawtx = self
            .chain
            .create_send(&SendRequest {
                source: source.clone(),
                destination: destination.to_string(),
                asset: asset.to_string(),
                quantity,
                regular_dust_size: REGULAR_DUST_SIZE,
            })
            .await?;
        let signed_rawtx = self
            .signer
            .sign_deposit(self.chain.as_ref(), &key, &unsigned_rawtx)
            .await?;
        let txid = self.chain.broadcast(&signed_rawtx).await?;

        info!(
            "Sent {} {} from {} to {} in {}",
            quantity, asset, source, destination, txid
        );
        Ok(txid)
    }

    /// Look up a raw transaction.
    pub async fn get_tx(&self, txid: &str) -> ChannelResult<String> {
        self.chain.get_transaction(txid).await
    }

    fn require_key(&self) -> ChannelResult<&ClientKey> {
        self.key
            .as_ref()
            .ok_or_else(|| ChannelError::InvalidKey("no auth_wif configured".to_string()))
    }

    fn require_channel(&self) -> ChannelResult<&ChannelState> {
        self.channel.as_ref().ok_or(ChannelError::NotConnected)
    }
}

/// Client-side material accumulated during the connection handshake
struct Handshake {
    secrets: SecretStore,
    h2c_spend_secret_hash: String,
    h2c_next_revoke_secret_hash: String,
}

impl Handshake {
    fn new<R: CryptoRngCore + ?Sized>(rng: &mut R) -> ChannelResult<Self> {
        let mut secrets = SecretStore::new();
        let (_, h2c_spend_secret_hash) = secrets.generate(rng)?;
        let (_, h2c_next_revoke_secret_hash) = secrets.generate(rng)?;
        Ok(Self {
            secrets,
            h2c_spend_secret_hash,
            h2c_next_revoke_secret_hash,
        })
    }

    fn check_connection(&self, response: &ConnectionResponse) -> ChannelResult<()> {
        if response.handle.is_empty() {
            return Err(remote("hub returned an empty handle"));
        }
        check_hub_hash("pubkey", &response.hub_pubkey)?;
        check_hub_hash("spend_secret_hash", &response.spend_secret_hash)?;
        if self.secrets.contains(&response.spend_secret_hash) {
            return Err(remote("hub spend secret hash collides with a client secret"));
        }
        Ok(())
    }

    fn check_scripts(&self, response: &DepositScriptsResponse) -> ChannelResult<()> {
        if response.deposit_script.is_empty() {
            return Err(remote("hub returned an empty h2c deposit script"));
        }
        check_hub_hash("next_revoke_secret_hash", &response.next_revoke_secret_hash)?;
        if self.secrets.contains(&response.next_revoke_secret_hash) {
            return Err(remote(
                "hub next revoke secret hash collides with a client secret",
            ));
        }
        Ok(())
    }
}

fn check_hub_hash(field: &str, value: &str) -> ChannelResult<()> {
    if value.is_empty() || hex::decode(value).is_err() {
        return Err(ChannelError::RemoteProtocol(format!(
            "hub returned an invalid {}",
            field
        )));
    }
    Ok(())
}

fn remote(reason: &str) -> ChannelError {
    ChannelError::RemoteProtocol(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_params_defaults() {
        let params = ConnectParams::new(1000, 144);
        assert_eq!(params.asset, "XCP");
        assert_eq!(params.delay_time, 2);
        assert_eq!(params.own_url, None);

        let params = params
            .with_asset("BTC")
            .with_delay_time(6)
            .with_own_url("https://me.example.org");
        assert_eq!(params.asset, "BTC");
        assert_eq!(params.delay_time, 6);
        assert_eq!(params.own_url.as_deref(), Some("https://me.example.org"));
    }

    #[test]
    fn test_connect_params_validate() {
        assert!(ConnectParams::new(1, 1).validate().is_ok());
        assert!(ConnectParams::new(1, 1)
            .with_own_url("https://me.example.org/cb")
            .validate()
            .is_ok());

        for params in [
            ConnectParams::new(1, 1).with_asset(""),
            ConnectParams::new(1, 1).with_delay_time(0),
            ConnectParams::new(1, 1).with_own_url("not a url"),
        ] {
            assert!(matches!(
                params.validate(),
                Err(ChannelError::InvalidParams(_))
            ));
        }
    }

    #[test]
    fn test_handshake_rejects_colliding_hub_hash() {
        use rand::{rngs::StdRng, SeedableRng};

        let handshake = Handshake::new(&mut StdRng::seed_from_u64(5)).unwrap();
        let scripts = DepositScriptsResponse {
            deposit_script: "51".to_string(),
            next_revoke_secret_hash: handshake.h2c_spend_secret_hash.clone(),
        };
        assert!(matches!(
            handshake.check_scripts(&scripts),
            Err(ChannelError::RemoteProtocol(_))
        ));
    }

    #[test]
    fn test_check_hub_hash() {
        assert!(check_hub_hash("x", "ab01").is_ok());
        assert!(check_hub_hash("x", "").is_err());
        assert!(check_hub_hash("x", "not hex").is_err());
    }
}
