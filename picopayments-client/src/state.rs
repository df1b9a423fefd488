//! Channel State
//!
//! The serializable aggregate for one client-hub relationship: the c2h and
//! h2c sub-states, every secret generated for the channel, and the payment
//! ledgers. A `ChannelState` only comes into existence through a completed
//! connection handshake or a validated deserialization; after that the c2h
//! construction state and revoke secret hash change only through
//! [`ChannelState::apply_commit`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, ChannelResult};
use crate::hub::deposit_script_of;
use crate::secrets::SecretStore;
use crate::terms::ChannelTerms;

/// A payment intent or settled payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payee_handle: String,
    pub amount: u64,
    /// 64 hex characters identifying the payment to the hub
    pub token: String,
}

/// A c2h commit handed to the hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCommit {
    pub quantity: u64,
    /// Hash whose preimage the hub reveals to revoke this commit
    pub revoke_secret_hash: String,
    pub commit_script: String,
}

/// Client-to-hub channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct C2hChannel {
    /// Opaque construction state from the hub (deposit script and commit
    /// construction material)
    pub state: Value,

    /// Hash of the secret the hub must reveal to spend the payout
    pub spend_secret_hash: String,

    /// Relative timelock on commits, in blocks
    pub commit_delay_time: u64,

    /// Hash that will revoke the next commit issued
    pub next_revoke_secret_hash: String,

    /// Deposit expiry, in blocks
    pub deposit_expire_time: u64,

    /// Funded amount
    pub deposit_quantity: u64,

    /// Commits issued so far, oldest first
    pub commits_issued: Vec<IssuedCommit>,
}

impl C2hChannel {
    pub fn deposit_script(&self) -> ChannelResult<&str> {
        deposit_script_of(&self.state)
    }

    /// True if `hash` was already used to revoke an issued commit.
    pub fn revoke_hash_used(&self, hash: &str) -> bool {
        self.commits_issued
            .iter()
            .any(|commit| commit.revoke_secret_hash == hash)
    }
}

/// Hub-to-client channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct H2cChannel {
    pub asset: String,
    pub deposit_script: String,
    pub commits_requested: Vec<String>,
    pub commits_active: Vec<String>,
    pub commits_revoked: Vec<String>,
}

impl H2cChannel {
    /// Freshly negotiated h2c channel with no commits
    pub fn new(asset: impl Into<String>, deposit_script: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            deposit_script: deposit_script.into(),
            commits_requested: Vec::new(),
            commits_active: Vec::new(),
            commits_revoked: Vec::new(),
        }
    }
}

/// State of an established channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub(crate) handle: String,
    pub(crate) asset: String,
    pub(crate) channel_terms: ChannelTerms,
    pub(crate) client_pubkey: String,
    pub(crate) hub_pubkey: String,
    pub(crate) secrets: SecretStore,
    pub(crate) h2c_spend_secret_hash: String,
    pub(crate) c2h: C2hChannel,
    pub(crate) h2c: H2cChannel,
    pub(crate) payments_sent: Vec<Payment>,
    pub(crate) payments_received: Vec<Payment>,
    pub(crate) payments_queued: Vec<Payment>,
}

impl ChannelState {
    /// Check internal consistency.
    ///
    /// Run after a handshake completes and after every deserialization; a
    /// state that fails here is never used.
    pub fn validate(&self) -> ChannelResult<()> {
        if self.handle.is_empty() {
            return Err(corrupt("empty handle"));
        }
        if self.asset.is_empty() {
            return Err(corrupt("empty asset"));
        }
        require_hex("client_pubkey", &self.client_pubkey)?;
        require_hex("hub_pubkey", &self.hub_pubkey)?;
        require_hex("c2h.spend_secret_hash", &self.c2h.spend_secret_hash)?;
        require_hex("c2h.next_revoke_secret_hash", &self.c2h.next_revoke_secret_hash)?;

        self.secrets.verify()?;

        if !self.secrets.contains(&self.h2c_spend_secret_hash) {
            return Err(corrupt("h2c spend secret missing from secret store"));
        }

        // Knowing this preimage would let us revoke a commit nobody has
        // published yet.
        if self.secrets.contains(&self.c2h.next_revoke_secret_hash) {
            return Err(corrupt("preimage of the next c2h revoke secret hash is known"));
        }
        if self.c2h.revoke_hash_used(&self.c2h.next_revoke_secret_hash) {
            return Err(corrupt("next c2h revoke secret hash was already used"));
        }

        self.channel_terms
            .validate(self.c2h.deposit_quantity, self.c2h.deposit_expire_time)
            .map_err(|e| corrupt(&e.to_string()))?;

        self.c2h
            .deposit_script()
            .map_err(|_| corrupt("c2h state has no deposit script"))?;

        if self.h2c.deposit_script.is_empty() {
            return Err(corrupt("empty h2c deposit script"));
        }

        Ok(())
    }

    /// Record a signed commit and rotate to the revoke hash for the next one.
    ///
    /// `used_revoke_secret_hash` must be the hash the commit was built with.
    /// `next_revoke_secret_hash` must be new: not the used hash, not used by
    /// any earlier commit, and not a hash whose preimage we hold. On error
    /// the state is left untouched.
    pub fn apply_commit(
        &mut self,
        used_revoke_secret_hash: &str,
        quantity: u64,
        commit_script: &str,
        new_state: Option<Value>,
        next_revoke_secret_hash: &str,
    ) -> ChannelResult<()> {
        if used_revoke_secret_hash != self.c2h.next_revoke_secret_hash {
            return Err(ChannelError::RemoteProtocol(format!(
                "commit built with revoke hash {} but {} is current",
                used_revoke_secret_hash, self.c2h.next_revoke_secret_hash
            )));
        }
        if next_revoke_secret_hash.is_empty() || hex::decode(next_revoke_secret_hash).is_err() {
            return Err(ChannelError::RemoteProtocol(
                "invalid next revoke secret hash".to_string(),
            ));
        }
        if next_revoke_secret_hash == used_revoke_secret_hash
            || self.c2h.revoke_hash_used(next_revoke_secret_hash)
        {
            return Err(ChannelError::RemoteProtocol(format!(
                "hub reused revoke secret hash {}",
                next_revoke_secret_hash
            )));
        }
        if self.secrets.contains(next_revoke_secret_hash) {
            return Err(ChannelError::RemoteProtocol(format!(
                "revoke secret hash {} belongs to a client secret",
                next_revoke_secret_hash
            )));
        }
        if let Some(state) = &new_state {
            deposit_script_of(state)?;
        }

        self.c2h.commits_issued.push(IssuedCommit {
            quantity,
            revoke_secret_hash: used_revoke_secret_hash.to_string(),
            commit_script: commit_script.to_string(),
        });
        if let Some(state) = new_state {
            self.c2h.state = state;
        }
        self.c2h.next_revoke_secret_hash = next_revoke_secret_hash.to_string();

        Ok(())
    }

    /// Append a payment intent to the queue.
    pub fn queue_payment(&mut self, payment: Payment) {
        self.payments_queued.push(payment);
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn channel_terms(&self) -> &ChannelTerms {
        &self.channel_terms
    }

    pub fn client_pubkey(&self) -> &str {
        &self.client_pubkey
    }

    pub fn hub_pubkey(&self) -> &str {
        &self.hub_pubkey
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    pub fn h2c_spend_secret_hash(&self) -> &str {
        &self.h2c_spend_secret_hash
    }

    pub fn c2h(&self) -> &C2hChannel {
        &self.c2h
    }

    pub fn h2c(&self) -> &H2cChannel {
        &self.h2c
    }

    pub fn payments_sent(&self) -> &[Payment] {
        &self.payments_sent
    }

    pub fn payments_received(&self) -> &[Payment] {
        &self.payments_received
    }

    pub fn payments_queued(&self) -> &[Payment] {
        &self.payments_queued
    }
}

fn corrupt(reason: &str) -> ChannelError {
    ChannelError::CorruptState(reason.to_string())
}

fn require_hex(field: &str, value: &str) -> ChannelResult<()> {
    if value.is_empty() || hex::decode(value).is_err() {
        return Err(corrupt(&format!("{} is not a hex string", field)));
    }
    Ok(())
}
