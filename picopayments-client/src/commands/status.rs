//! Channel status command

use anyhow::Result;

use picopayments_client::ClientConfig;

use super::{open_client, print_success};

/// Run the status command
pub async fn run(config: &ClientConfig) -> Result<()> {
    let client = open_client(config)?;

    println!("Hub: {}", client.connection().url);
    if let Some(key) = client.key() {
        println!("Address: {}", key.address());
    }

    let Some(channel) = client.channel() else {
        println!();
        println!("Not connected.");
        return Ok(());
    };

    println!();
    print_success(&format!("Connected: {}", channel.handle()));
    println!();

    let terms = channel.channel_terms();
    let limit = |value: u64| {
        if value == 0 {
            "unlimited".to_string()
        } else {
            value.to_string()
        }
    };
    println!("Asset:          {}", channel.asset());
    if terms.is_unlimited() {
        println!("Terms:          unlimited");
    } else {
        println!("Deposit limit:  {}", limit(terms.deposit_limit));
        println!("Timeout limit:  {}", limit(terms.timeout_limit));
    }
    println!(
        "Deposit:        {} (expires after {} blocks)",
        channel.c2h().deposit_quantity,
        channel.c2h().deposit_expire_time
    );
    println!("Commit delay:   {} blocks", channel.c2h().commit_delay_time);
    println!();
    println!("Secrets:        {}", channel.secrets().len());
    println!("Commits issued: {}", channel.c2h().commits_issued.len());
    println!("Payments sent:  {}", channel.payments_sent().len());
    println!("Received:       {}", channel.payments_received().len());
    println!("Queued:         {}", channel.payments_queued().len());

    for (i, payment) in channel.payments_queued().iter().enumerate() {
        println!(
            "  {}. {} to {} ({})",
            i + 1,
            payment.amount,
            payment.payee_handle,
            payment.token
        );
    }

    Ok(())
}
