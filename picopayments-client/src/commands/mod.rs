//! CLI Commands
//!
//! The CLI works on the persisted client record. Commands that need a
//! transaction signer are library-only, so the CLI client carries a signer
//! that refuses every request.

pub mod get_tx;
pub mod queue;
pub mod status;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::rngs::OsRng;
use std::path::Path;
use std::sync::Arc;

use picopayments_client::{
    storage, ChainAccess, ChannelError, ChannelResult, Client, ClientConfig, ClientKey,
    Collaborators, Signer,
};

/// Signer for a client that must never sign
struct NoSigner;

#[async_trait]
impl Signer for NoSigner {
    async fn sign_deposit(
        &self,
        _chain: &dyn ChainAccess,
        _key: &ClientKey,
        _unsigned_rawtx: &str,
    ) -> ChannelResult<String> {
        Err(ChannelError::Signature(
            "signing is not available from the command line".to_string(),
        ))
    }

    async fn sign_commit(
        &self,
        _chain: &dyn ChainAccess,
        _key: &ClientKey,
        _unsigned_rawtx: &str,
        _deposit_script: &str,
    ) -> ChannelResult<String> {
        Err(ChannelError::Signature(
            "signing is not available from the command line".to_string(),
        ))
    }
}

/// Build a client from the stored record, or a fresh one from the config.
///
/// A stored record carries its own hub connection; the RPC client is built
/// from it once the config has been checked against it.
pub fn open_client(config: &ClientConfig) -> Result<Client> {
    let rng = Box::new(OsRng);

    if storage::exists(&config.state_file) {
        let record = storage::load(&config.state_file)
            .map_err(|e| anyhow!("Failed to load {}: {}", config.state_file.display(), e))?;
        config.check_record(&record)?;
        let collaborators = Collaborators::rpc(&record.hub, Arc::new(NoSigner))?;
        Ok(Client::deserialize(record, collaborators, rng)?)
    } else {
        let connection = config.hub_connection();
        let collaborators = Collaborators::rpc(&connection, Arc::new(NoSigner))?;
        Ok(Client::new(connection, collaborators, rng)?)
    }
}

/// Persist the client record.
pub fn save_client(client: &Client, path: &Path) -> Result<()> {
    storage::save(path, &client.serialize())?;
    Ok(())
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}
