//! Test doubles for the hub, the chain and the signer.
//!
//! Each fake counts its calls and can be told to fail, so tests can check
//! both what the client sent and what it did not send.

#![allow(dead_code)]

use async_trait::async_trait;
use picopayments_client::{
    hub::{
        deposit_script_of, CommitRequest, CommitResponse, CommitToSign, ConnectionRequest,
        ConnectionResponse, DepositRequest, DepositResponse, DepositScriptsRequest,
        DepositScriptsResponse, SendRequest,
    },
    secrets::{hash160, hash160_hex},
    ChainAccess, ChannelError, ChannelResult, ChannelTerms, Client, ClientKey, Collaborators,
    HubConnection, HubService, Signer,
};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::json;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex,
};

/// Compressed WIF of private key 1
pub const CLIENT_WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
pub const CLIENT_ADDRESS: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";
pub const CLIENT_PUBKEY: &str =
    "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

/// Uncompressed WIF of the same key
pub const OTHER_WIF: &str = "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf";

pub const UNSIGNED_DEPOSIT: &str = "unsigned-deposit";
pub const H2C_DEPOSIT_SCRIPT: &str = "h2c-deposit-script";

pub fn hub_pubkey() -> String {
    format!("03{}", "5a".repeat(32))
}

pub fn connection() -> HubConnection {
    let mut connection = HubConnection::new("http://hub.test/api/");
    connection.auth_wif = Some(CLIENT_WIF.to_string());
    connection
}

fn injected(method: &str) -> ChannelError {
    ChannelError::Transport(format!("injected failure in {}", method))
}

// ============================================================================
// Hub
// ============================================================================

#[derive(Debug, Default)]
pub struct HubCalls {
    pub request_connection: AtomicUsize,
    pub build_deposit: AtomicUsize,
    pub exchange_deposit_scripts: AtomicUsize,
    pub create_commit: AtomicUsize,
}

pub struct FakeHub {
    pub terms: Mutex<ChannelTerms>,
    pub calls: HubCalls,
    /// Name of the hub method that should fail
    pub fail_at: Mutex<Option<&'static str>>,
    /// Leave `next_revoke_secret_hash` out of commit responses
    pub omit_next_revoke_hash: AtomicBool,
    /// Hand the used revoke hash back as the next one
    pub reuse_revoke_hash: AtomicBool,
    pub connection_requests: Mutex<Vec<ConnectionRequest>>,
    pub deposit_requests: Mutex<Vec<DepositRequest>>,
    pub script_requests: Mutex<Vec<DepositScriptsRequest>>,
    pub commit_requests: Mutex<Vec<CommitRequest>>,
    counter: AtomicU64,
}

impl FakeHub {
    pub fn new(terms: ChannelTerms) -> Self {
        Self {
            terms: Mutex::new(terms),
            calls: HubCalls::default(),
            fail_at: Mutex::new(None),
            omit_next_revoke_hash: AtomicBool::new(false),
            reuse_revoke_hash: AtomicBool::new(false),
            connection_requests: Mutex::new(Vec::new()),
            deposit_requests: Mutex::new(Vec::new()),
            script_requests: Mutex::new(Vec::new()),
            commit_requests: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
        }
    }

    pub fn fail_at(&self, method: &'static str) {
        *self.fail_at.lock().unwrap() = Some(method);
    }

    /// A hub-side hash whose preimage the client never sees
    pub fn fresh_hash(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        hash160_hex(&format!("{:064x}", 0xfeed_0000 + n)).unwrap()
    }

    fn check(&self, method: &'static str) -> ChannelResult<()> {
        if *self.fail_at.lock().unwrap() == Some(method) {
            return Err(injected(method));
        }
        Ok(())
    }
}

#[async_trait]
impl HubService for FakeHub {
    async fn request_connection(
        &self,
        request: &ConnectionRequest,
    ) -> ChannelResult<ConnectionResponse> {
        self.calls.request_connection.fetch_add(1, Ordering::SeqCst);
        self.connection_requests.lock().unwrap().push(request.clone());
        self.check("request_connection")?;

        Ok(ConnectionResponse {
            handle: format!("handle-{}", self.counter.load(Ordering::SeqCst)),
            channel_terms: *self.terms.lock().unwrap(),
            hub_pubkey: hub_pubkey(),
            spend_secret_hash: self.fresh_hash(),
        })
    }

    async fn build_deposit(&self, request: &DepositRequest) -> ChannelResult<DepositResponse> {
        self.calls.build_deposit.fetch_add(1, Ordering::SeqCst);
        self.deposit_requests.lock().unwrap().push(request.clone());
        self.check("build_deposit")?;

        Ok(DepositResponse {
            state: json!({
                "asset": request.asset,
                "deposit_script": format!("c2h-deposit-script-{}", request.quantity),
                "commits_requested": [],
                "commits_active": [],
                "commits_revoked": [],
            }),
            unsigned_rawtx: UNSIGNED_DEPOSIT.to_string(),
        })
    }

    async fn exchange_deposit_scripts(
        &self,
        request: &DepositScriptsRequest,
    ) -> ChannelResult<DepositScriptsResponse> {
        self.calls
            .exchange_deposit_scripts
            .fetch_add(1, Ordering::SeqCst);
        self.script_requests.lock().unwrap().push(request.clone());
        self.check("exchange_deposit_scripts")?;

        Ok(DepositScriptsResponse {
            deposit_script: H2C_DEPOSIT_SCRIPT.to_string(),
            next_revoke_secret_hash: self.fresh_hash(),
        })
    }

    async fn create_commit(&self, request: &CommitRequest) -> ChannelResult<CommitResponse> {
        let n = self.calls.create_commit.fetch_add(1, Ordering::SeqCst) + 1;
        self.commit_requests.lock().unwrap().push(request.clone());
        self.check("create_commit")?;

        let next_revoke_secret_hash = if self.omit_next_revoke_hash.load(Ordering::SeqCst) {
            None
        } else if self.reuse_revoke_hash.load(Ordering::SeqCst) {
            Some(request.revoke_secret_hash.clone())
        } else {
            Some(self.fresh_hash())
        };

        Ok(CommitResponse {
            commit_script: format!("commit-script-{}", n),
            tosign: CommitToSign {
                commit_rawtx: format!("commit-rawtx-{}", n),
                deposit_script: deposit_script_of(&request.state)?.to_string(),
            },
            state: None,
            next_revoke_secret_hash,
        })
    }
}

// ============================================================================
// Chain
// ============================================================================

#[derive(Default)]
pub struct FakeChain {
    pub reject_broadcast: AtomicBool,
    pub broadcasts: Mutex<Vec<String>>,
    pub sends: Mutex<Vec<SendRequest>>,
    pub lookups: AtomicUsize,
}

#[async_trait]
impl ChainAccess for FakeChain {
    async fn get_transaction(&self, txid: &str) -> ChannelResult<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(format!("rawtx-{}", txid))
    }

    async fn broadcast(&self, signed_rawtx: &str) -> ChannelResult<String> {
        if self.reject_broadcast.load(Ordering::SeqCst) {
            return Err(ChannelError::Broadcast("mempool rejected".to_string()));
        }
        self.broadcasts
            .lock()
            .unwrap()
            .push(signed_rawtx.to_string());
        Ok(hex::encode(hash160(signed_rawtx.as_bytes())))
    }

    async fn create_send(&self, request: &SendRequest) -> ChannelResult<String> {
        self.sends.lock().unwrap().push(request.clone());
        Ok(format!("unsigned-send-{}", request.quantity))
    }
}

// ============================================================================
// Signer
// ============================================================================

#[derive(Default)]
pub struct FakeSigner {
    pub fail: AtomicBool,
    pub deposits: AtomicUsize,
    pub commits: AtomicUsize,
}

#[async_trait]
impl Signer for FakeSigner {
    async fn sign_deposit(
        &self,
        chain: &dyn ChainAccess,
        key: &ClientKey,
        unsigned_rawtx: &str,
    ) -> ChannelResult<String> {
        self.deposits.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Signature("injected signing failure".to_string()));
        }
        // Look up the funding transaction like a real signer would
        chain.get_transaction("funding").await?;
        Ok(format!("signed[{}]({})", key.address(), unsigned_rawtx))
    }

    async fn sign_commit(
        &self,
        _chain: &dyn ChainAccess,
        key: &ClientKey,
        unsigned_rawtx: &str,
        deposit_script: &str,
    ) -> ChannelResult<String> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Signature("injected signing failure".to_string()));
        }
        Ok(format!(
            "signed[{}]({};{})",
            key.address(),
            unsigned_rawtx,
            deposit_script
        ))
    }
}

pub fn signed_deposit() -> String {
    format!("signed[{}]({})", CLIENT_ADDRESS, UNSIGNED_DEPOSIT)
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub hub: Arc<FakeHub>,
    pub chain: Arc<FakeChain>,
    pub signer: Arc<FakeSigner>,
}

impl Harness {
    pub fn new(terms: ChannelTerms) -> Self {
        Self {
            hub: Arc::new(FakeHub::new(terms)),
            chain: Arc::new(FakeChain::default()),
            signer: Arc::new(FakeSigner::default()),
        }
    }

    /// Hub with a 1,000,000 deposit limit and a 1024 block timeout limit
    pub fn with_default_terms() -> Self {
        Self::new(ChannelTerms {
            deposit_limit: 1_000_000,
            timeout_limit: 1024,
        })
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            hub: self.hub.clone(),
            chain: self.chain.clone(),
            signer: self.signer.clone(),
        }
    }

    pub fn client(&self) -> Client {
        self.client_with_seed(42)
    }

    pub fn client_with_seed(&self, seed: u64) -> Client {
        Client::new(
            connection(),
            self.collaborators(),
            Box::new(StdRng::seed_from_u64(seed)),
        )
        .unwrap()
    }

    pub fn hub_calls(&self) -> [usize; 4] {
        let calls = &self.hub.calls;
        [
            calls.request_connection.load(Ordering::SeqCst),
            calls.build_deposit.load(Ordering::SeqCst),
            calls.exchange_deposit_scripts.load(Ordering::SeqCst),
            calls.create_commit.load(Ordering::SeqCst),
        ]
    }
}
