//! Network side of the audio sync protocol defined in `audiosync_proto`.
//!
//! This crate provides the runtime machinery needed to broadcast and consume sync
//! snapshots over UDP multicast.
//!
//! ## Scope
//!
//! - [`SyncSession`](session::SyncSession): the poll-driven object owning the
//!   transport and the synchronized state. `read` keeps only the freshest datagram,
//!   `send` broadcasts the local analysis.
//! - [`NetworkLifecycleManager`](lifecycle::NetworkLifecycleManager): joins and
//!   leaves the multicast group as connectivity comes and goes.
//! - The collaborator seams the session is generic over: [`Transport`],
//!   [`Connectivity`] and [`Clock`].
//!
//! Everything here is single threaded and non-blocking. Nothing is ever fatal: all
//! failures degrade to "no fresh sync data", and are retried on the next poll.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod lifecycle;
pub mod session;
pub mod transport;

pub use audiosync_proto as proto;
pub use audiosync_utils as utils;

pub use config::{SyncConfig, SyncMode};
pub use connectivity::Connectivity;
pub use error::{ConfigError, SyncError};
pub use session::SyncSession;
pub use transport::Transport;
pub use utils::Clock;

/// Returns `true` if the given I/O error kind represents a timeout condition.
///
/// This treats both `WouldBlock` and `TimedOut` as timeout-equivalent, which
/// is what non-blocking sockets report when there is nothing to read.
#[inline(always)]
pub(crate) fn io_err_is_timeout(e: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind::*;
    [WouldBlock, TimedOut].contains(&e)
}
