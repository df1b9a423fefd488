//! Payment queue command

use anyhow::Result;

use picopayments_client::{ChannelError, ClientConfig};

use super::{open_client, print_error, print_success, save_client};

/// Run the queue command
pub async fn run(
    config: &ClientConfig,
    payee_handle: &str,
    amount: u64,
    token: Option<String>,
) -> Result<()> {
    let mut client = open_client(config)?;

    let token = match client.queue(payee_handle, amount, token) {
        Ok(token) => token,
        Err(ChannelError::NotConnected) => {
            print_error("No open channel. Connect to a hub first.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    save_client(&client, &config.state_file)?;

    print_success(&format!("Queued {} to {}", amount, payee_handle));
    println!("Token: {}", token);
    Ok(())
}
