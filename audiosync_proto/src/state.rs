//! The synchronized audio state effects are rendered from.

use core::net::{IpAddr, SocketAddr};

use crate::{N_BANDS, packet, peak::PeakTracker};

/// Audio analysis values, either computed locally or received from the network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioLevels {
    pub volume_smth: f32,
    pub volume_raw: f32,
    pub sample_raw: f32,
    pub sample_avg: f32,
    pub sample_agc: f32,
    pub raw_sample_agc: f32,
    pub mult_agc: f32,
    pub fft_result: [u8; N_BANDS],
    pub fft_magnitude: f32,
    /// Dominant frequency, in Hz.
    pub fft_major_peak: f32,
    pub my_magnitude: f32,
}

impl AudioLevels {
    /// No sound at all: every level zeroed, unity gain, and the lowest
    /// valid dominant frequency.
    pub const SILENCE: Self = Self {
        volume_smth: 0.,
        volume_raw: 0.,
        sample_raw: 0.,
        sample_avg: 0.,
        sample_agc: 0.,
        raw_sample_agc: 0.,
        mult_agc: 1.,
        fft_result: [0; N_BANDS],
        fft_magnitude: 0.,
        fft_major_peak: packet::MIN_MAJOR_PEAK,
        my_magnitude: 0.,
    };
}

impl Default for AudioLevels {
    #[inline(always)]
    fn default() -> Self {
        Self::SILENCE
    }
}

/// Everything a controller knows about the shared audio state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SyncState {
    pub levels: AudioLevels,
    pub peak: PeakTracker,
    /// Format of the last accepted packet, `None` if the last candidate was rejected,
    /// or nothing was ever received.
    pub received_format: Option<packet::PacketFormat>,
    /// When the last packet was accepted or sent (milliseconds).
    pub last_packet_time: u32,
    /// Where the last accepted packet came from.
    pub source_ip: Option<IpAddr>,
}

impl SyncState {
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            levels: AudioLevels::SILENCE,
            peak: PeakTracker::new(),
            received_format: None,
            last_packet_time: 0,
            source_ip: None,
        }
    }

    /// Merges an accepted packet, received at `now` from `source`.
    pub fn apply(&mut self, packet: &packet::DecodedPacket, source: SocketAddr, now: u32) {
        self.levels = packet.levels();

        if packet.peak() {
            self.peak.on_peak_observed(now);
        }

        self.received_format = Some(packet.format());
        self.last_packet_time = now;
        self.source_ip = Some(source.ip());
    }

    /// Drops all received audio, leaving provenance and peak state untouched.
    #[inline(always)]
    pub fn silence(&mut self) {
        self.levels = AudioLevels::SILENCE;
    }
}
