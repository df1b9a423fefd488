//! Client Record Storage
//!
//! Persists the hub connection parameters and the channel state as a JSON
//! record. Loading is all-or-nothing: a record with any missing key, a field
//! of the wrong type, or a channel state that fails validation is rejected
//! with `CorruptState` instead of being partially restored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ChannelError, ChannelResult};
use crate::rpc::HubConnection;
use crate::state::ChannelState;

/// Current record format version
const RECORD_VERSION: u32 = 1;

/// Deserializer for `Option` fields whose key must be present.
///
/// Serde fills a missing `Option` with `None`; routing the field through a
/// `deserialize_with` function turns a missing key into an error while still
/// accepting an explicit `null`.
pub(crate) mod required {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer)
    }
}

/// Everything needed to resume a client after a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Record format version
    pub version: u32,

    /// Connection parameters for the hub RPC client
    pub hub: HubConnection,

    /// Channel state, `None` while not connected
    #[serde(deserialize_with = "required::deserialize")]
    pub channel: Option<ChannelState>,
}

impl ClientRecord {
    pub fn new(hub: HubConnection, channel: Option<ChannelState>) -> Self {
        Self {
            version: RECORD_VERSION,
            hub,
            channel,
        }
    }

    /// Decode and validate a record from JSON.
    pub fn from_json(json: &str) -> ChannelResult<Self> {
        let record: ClientRecord = serde_json::from_str(json)?;
        record.validate()?;
        Ok(record)
    }

    /// Decode and validate a record from a JSON value.
    pub fn from_value(value: serde_json::Value) -> ChannelResult<Self> {
        let record: ClientRecord = serde_json::from_value(value)?;
        record.validate()?;
        Ok(record)
    }

    pub fn to_json(&self) -> ChannelResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ChannelError::Io(format!("failed to encode record: {}", e)))
    }

    /// Check version, hub url and channel consistency.
    pub fn validate(&self) -> ChannelResult<()> {
        if self.version != RECORD_VERSION {
            return Err(ChannelError::CorruptState(format!(
                "unsupported record version: {} (expected {})",
                self.version, RECORD_VERSION
            )));
        }
        if self.hub.url.is_empty() {
            return Err(ChannelError::CorruptState("empty hub url".to_string()));
        }
        if let Some(channel) = &self.channel {
            channel.validate()?;
        }
        Ok(())
    }
}

/// Save a record to a file.
///
/// Writes a temp file next to `path` and renames it over the old record, so
/// a failed write never leaves a truncated record behind.
pub fn save(path: &Path, record: &ClientRecord) -> ChannelResult<()> {
    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = record.to_json()?;
    let temp_path = path.with_extension("tmp");

    // Secrets and the client key live in this file
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }

    #[cfg(not(unix))]
    {
        fs::write(&temp_path, json)?;
    }

    // Atomic rename
    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Load a record from a file
pub fn load(path: &Path) -> ChannelResult<ClientRecord> {
    let json = fs::read_to_string(path)
        .map_err(|e| ChannelError::Io(format!("failed to read {}: {}", path.display(), e)))?;
    ClientRecord::from_json(&json)
}

/// Check if a record file exists
pub fn exists(path: &Path) -> bool {
    path.exists()
}
