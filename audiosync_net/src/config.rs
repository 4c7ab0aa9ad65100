//! Session configuration.

use core::net::Ipv4Addr;
use serde::{Deserialize, Serialize};

use crate::proto;

/// Which directions of sync traffic a node takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Local audio only, sync traffic is ignored.
    Off,
    /// Audio source: broadcasts its local analysis.
    Send,
    /// Follows another node's audio.
    #[default]
    Receive,
    /// Broadcasts, and listens to everything on the group, its own packets included.
    SendReceive,
}

impl SyncMode {
    #[inline(always)]
    pub const fn is_sending(self) -> bool {
        matches!(self, Self::Send | Self::SendReceive)
    }

    #[inline(always)]
    pub const fn is_receiving(self) -> bool {
        matches!(self, Self::Receive | Self::SendReceive)
    }
}

/// Everything a [`SyncSession`](crate::SyncSession) can be tuned with.
///
/// Missing fields take their default values, so an empty file is a valid config:
///
/// ```toml
/// group = "239.0.0.1"
/// port = 11988
/// mode = "send"
/// agc = true
/// peak_hold_ms = 50
/// receive_timeout_ms = 2500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub group: Ipv4Addr,
    pub port: u16,
    pub mode: SyncMode,
    /// Whether the local sampler runs AGC, selects which values are broadcast.
    pub agc: bool,
    /// Minimum time a peak stays latched, in milliseconds.
    pub peak_hold_ms: u32,
    /// Received audio is dropped to silence after this long without fresh data.
    pub receive_timeout_ms: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            group: proto::MULTICAST_GROUP,
            port: proto::SYNC_PORT,
            mode: SyncMode::default(),
            agc: false,
            peak_hold_ms: proto::peak::DEFAULT_PEAK_HOLD_MS,
            receive_timeout_ms: 2500,
        }
    }
}

impl SyncConfig {
    /// Loads a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    #[inline]
    pub fn from_toml(content: &str) -> Result<Self, crate::ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
