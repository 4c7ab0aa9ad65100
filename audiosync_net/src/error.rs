use std::io;

/// Failures of sync session operations.
///
/// None of these are fatal, the session recovers on its own on the next poll.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Joining the multicast group failed, the session stays disconnected.
    #[error("failed to join the sync group: {0}")]
    Bind(#[source] io::Error),
    /// Transmitting a snapshot failed. It isn't retried, the next send will be.
    #[error("failed to send sync packet: {0}")]
    Send(#[source] io::Error),
    #[error("not connected to the sync group")]
    NotConnected,
}

/// Failures loading a [`SyncConfig`](crate::SyncConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
