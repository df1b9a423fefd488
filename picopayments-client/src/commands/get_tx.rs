//! Raw transaction lookup command

use anyhow::Result;

use picopayments_client::ClientConfig;

use super::open_client;

/// Run the get-tx command
pub async fn run(config: &ClientConfig, txid: &str) -> Result<()> {
    let client = open_client(config)?;
    let rawtx = client.get_tx(txid).await?;
    println!("{}", rawtx);
    Ok(())
}
