//! Configuration for the channel client.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::client::{DEFAULT_ASSET, DEFAULT_DELAY_TIME};
use crate::rpc::HubConnection;
use crate::storage::ClientRecord;

/// Hub endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubSection {
    /// JSON-RPC endpoint of the hub
    pub url: String,

    /// Client key in wallet import format
    pub auth_wif: Option<String>,

    /// HTTP basic auth user
    pub username: Option<String>,

    /// HTTP basic auth password
    pub password: Option<String>,

    /// Verify the hub's TLS certificate
    #[serde(default = "default_verify_ssl_cert")]
    pub verify_ssl_cert: bool,
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub hub: HubSection,

    /// Asset for new channels
    #[serde(default = "default_asset")]
    pub asset: String,

    /// Commit delay for new channels, in blocks
    #[serde(default = "default_delay_time")]
    pub delay_time: u64,

    /// Callback URL announced to the hub
    pub own_url: Option<String>,

    /// Where the client record is kept
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_verify_ssl_cert() -> bool {
    true
}

fn default_asset() -> String {
    DEFAULT_ASSET.to_string()
}

fn default_delay_time() -> u64 {
    DEFAULT_DELAY_TIME
}

/// Get the default client record path
pub fn default_state_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".picopayments")
        .join("client.json")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".picopayments")
        .join("config.toml")
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hub.url.is_empty() {
            anyhow::bail!("hub.url must be set");
        }
        let url = url::Url::parse(&self.hub.url)
            .map_err(|e| anyhow::anyhow!("hub.url is not a valid URL: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("hub.url must be http or https, got {}", url.scheme());
        }

        if !self.hub.verify_ssl_cert {
            tracing::warn!("hub TLS certificate verification is disabled");
        }
        if self.hub.password.is_some() && self.hub.username.is_none() {
            anyhow::bail!("hub.password requires hub.username");
        }

        if self.asset.is_empty() {
            anyhow::bail!("asset must not be empty");
        }
        if self.delay_time == 0 {
            anyhow::bail!("delay_time must be at least one block");
        }

        if let Some(own_url) = &self.own_url {
            url::Url::parse(own_url)
                .map_err(|e| anyhow::anyhow!("own_url is not a valid URL: {}", e))?;
        }

        Ok(())
    }

    /// Connection parameters for the hub RPC client.
    pub fn hub_connection(&self) -> HubConnection {
        HubConnection {
            url: self.hub.url.clone(),
            auth_wif: self.hub.auth_wif.clone(),
            username: self.hub.username.clone(),
            password: self.hub.password.clone(),
            verify_ssl_cert: self.hub.verify_ssl_cert,
        }
    }

    /// Check that a stored record belongs to the configured hub and key.
    ///
    /// The record's connection is what the client is rebuilt from, so a
    /// config pointing elsewhere is an error rather than silently ignored.
    pub fn check_record(&self, record: &ClientRecord) -> anyhow::Result<()> {
        if record.hub.url != self.hub.url {
            anyhow::bail!(
                "state file belongs to hub {} but hub.url is {}",
                record.hub.url,
                self.hub.url
            );
        }
        if record.hub.auth_wif != self.hub.auth_wif {
            anyhow::bail!("state file was created with a different hub.auth_wif");
        }
        Ok(())
    }
}
