#![no_std]
//! Wire format and shared state model of a small protocol for keeping audio-reactive
//! lighting controllers in sync.
//!
//! ## Roles
//!
//! Every controller on the network shares the same synchronized audio state:
//!
//! - The **audio source** samples audio locally and periodically broadcasts a compact
//!   snapshot of its analysis (volume, frequency bands, dominant frequency, beat/peak).
//! - **Receivers** (the source included, if it wishes) decode the freshest snapshot
//!   and merge it into the state their effects engine renders from.
//!
//! ## Protocol model
//!
//! Snapshots are single, self-contained datagrams. There are no sessions, handshakes
//! or acknowledgements, the most recent snapshot always wins.
//!
//! Two fixed-layout formats exist, see [`packet`]:
//!
//! - **v2**, 44 bytes, tagged `"00002"`. This is the only format ever sent.
//! - **v1**, 83 bytes, tagged `"00001"`. Legacy, still accepted on receive.
//!
//! Formats are discriminated purely by their exact length and 6-byte header.
//! Anything else is foreign traffic and is rejected.
//!
//! Multi-byte fields are in the host's native byte order, as deployed controllers
//! have always been architecturally compatible with each other.
//!
//! ## Peaks
//!
//! A beat, or peak, is a transient event. [`peak::PeakTracker`] latches it for a
//! minimum hold time so that every consumer gets to see it at least once.

pub mod packet;
pub mod peak;
pub mod state;

pub use packet::{DecodedPacket, MalformedPacket, PacketFormat, classify_and_decode, encode};
pub use peak::PeakTracker;
pub use state::{AudioLevels, SyncState};

/// Multicast group all controllers subscribe to.
pub const MULTICAST_GROUP: core::net::Ipv4Addr = core::net::Ipv4Addr::new(239, 0, 0, 1);

/// UDP port of the multicast group.
pub const SYNC_PORT: u16 = 11988;

/// Number of frequency bands carried in every snapshot.
pub const N_BANDS: usize = 16;

/// Any datagram at most this long is not considered part of the protocol, (inclusive).
pub const MIN_PACKET_LEN_EXCLUSIVE: usize = 5;

/// Largest datagram a receiver is willing to buffer.
///
/// Leaves some headroom above the largest known format.
pub const MAX_PACKET_LEN: usize = 88;

/// Milliseconds elapsed from `since` to `now`, on a wrapping 32-bit millisecond clock.
#[inline(always)]
pub const fn elapsed_millis(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}
