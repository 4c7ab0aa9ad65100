//! Fixed-layout wire records and their (de)serialization.
//!
//! Records are read and written field by field at fixed offsets, never by
//! reinterpreting memory, so the layout doesn't depend on any compiler's struct
//! alignment rules.

use core::fmt;

use crate::{N_BANDS, state::AudioLevels, state::SyncState};

pub const HEADER_LEN: usize = 6;

/// Header of the current format, NUL-padded.
pub const V2_HEADER: [u8; HEADER_LEN] = *b"00002\0";
/// Header of the legacy format, NUL-padded.
pub const V1_HEADER: [u8; HEADER_LEN] = *b"00001\0";

pub const V2_PACKET_LEN: usize = 44;
pub const V1_PACKET_LEN: usize = 83;

/// Lowest dominant frequency (Hz) a decoded snapshot may report.
pub const MIN_MAJOR_PEAK: f32 = 1.;
/// Highest dominant frequency (Hz) a decoded snapshot may report.
pub const MAX_MAJOR_PEAK: f32 = 11025.;

// Byte offsets of every v2 field.
mod v2 {
    pub const HEADER: usize = 0;
    // 2 bytes of padding at 6
    pub const SAMPLE_RAW: usize = 8;
    pub const SAMPLE_SMTH: usize = 12;
    pub const SAMPLE_PEAK: usize = 16;
    pub const FRAME_COUNTER: usize = 17;
    pub const FFT_RESULT: usize = 18;
    // 2 bytes of padding at 34
    pub const FFT_MAGNITUDE: usize = 36;
    pub const FFT_MAJOR_PEAK: usize = 40;
}

// Byte offsets of every v1 field.
mod v1 {
    pub const HEADER: usize = 0;
    pub const RESERVED: usize = 6;
    pub const SAMPLE_AGC: usize = 38;
    pub const SAMPLE_RAW: usize = 42;
    pub const SAMPLE_AVG: usize = 46;
    pub const SAMPLE_PEAK: usize = 50;
    pub const FFT_RESULT: usize = 51;
    pub const FFT_MAGNITUDE: usize = 67;
    pub const FFT_MAJOR_PEAK: usize = 75;
}

#[inline(always)]
fn get<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut field = [0; N];
    field.copy_from_slice(&bytes[at..at + N]);
    field
}

#[inline(always)]
fn put<const N: usize>(bytes: &mut [u8], at: usize, field: [u8; N]) {
    bytes[at..at + N].copy_from_slice(&field);
}

#[inline(always)]
fn non_negative(x: f32) -> f32 {
    // f32::max ignores NaN
    x.max(0.)
}

#[inline(always)]
fn clamp_major_peak(x: f32) -> f32 {
    if x.is_nan() {
        MIN_MAJOR_PEAK
    } else {
        x.clamp(MIN_MAJOR_PEAK, MAX_MAJOR_PEAK)
    }
}

/// The known wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PacketFormat {
    V1,
    V2,
}

impl PacketFormat {
    #[inline(always)]
    pub const fn header(self) -> [u8; HEADER_LEN] {
        match self {
            Self::V1 => V1_HEADER,
            Self::V2 => V2_HEADER,
        }
    }

    #[inline(always)]
    pub const fn packet_len(self) -> usize {
        match self {
            Self::V1 => V1_PACKET_LEN,
            Self::V2 => V2_PACKET_LEN,
        }
    }

    /// Identifies the format of `bytes` by exact length and header, checking
    /// the current format first.
    pub fn classify(bytes: &[u8]) -> Result<Self, MalformedPacket> {
        let mut length_matched = false;

        for format in [Self::V2, Self::V1] {
            if bytes.len() != format.packet_len() {
                continue;
            }

            length_matched = true;

            if bytes[..HEADER_LEN] == format.header() {
                return Ok(format);
            }
        }

        Err(if length_matched {
            MalformedPacket::UnknownHeader
        } else {
            MalformedPacket::WrongLength(bytes.len())
        })
    }
}

impl fmt::Display for PacketFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
        }
    }
}

/// Reason a datagram was not accepted as any known format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MalformedPacket {
    /// No known format has this length.
    WrongLength(usize),
    /// The length matched a known format, but not its header.
    UnknownHeader,
}

impl fmt::Display for MalformedPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength(n) => write!(f, "no sync format is {n} bytes long"),
            Self::UnknownHeader => write!(f, "unrecognized sync header"),
        }
    }
}

impl core::error::Error for MalformedPacket {}

/// The current (v2) wire record.
///
/// | field            | type      | offset |
/// |------------------|-----------|--------|
/// | header           | `[u8; 6]` | 0      |
/// | padding          | `[u8; 2]` | 6      |
/// | `sample_raw`     | `f32`     | 8      |
/// | `sample_smth`    | `f32`     | 12     |
/// | `sample_peak`    | `u8`      | 16     |
/// | `frame_counter`  | `u8`      | 17     |
/// | `fft_result`     | `[u8; 16]`| 18     |
/// | padding          | `[u8; 2]` | 34     |
/// | `fft_magnitude`  | `f32`     | 36     |
/// | `fft_major_peak` | `f32`     | 40     |
///
/// The header is not a field: it is always [`V2_HEADER`] when serialized.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioSyncPacket {
    /// Either the raw sample, or the raw AGC sample, depending on the sender's AGC mode.
    pub sample_raw: f32,
    /// Either the smoothed sample, or the AGC sample, depending on the sender's AGC mode.
    pub sample_smth: f32,
    /// `0` is no peak, anything else is a peak.
    pub sample_peak: u8,
    /// Incremented by the sender on every packet, not interpreted by receivers.
    pub frame_counter: u8,
    pub fft_result: [u8; N_BANDS],
    pub fft_magnitude: f32,
    pub fft_major_peak: f32,
}

impl AudioSyncPacket {
    /// Builds the outbound record from the local audio analysis.
    ///
    /// With `agc` set, the AGC'd values are sent instead of the plain ones.
    pub fn from_levels(levels: &AudioLevels, agc: bool, peak: bool, frame_counter: u8) -> Self {
        let (sample_raw, sample_smth) = if agc {
            (levels.raw_sample_agc, levels.sample_agc)
        } else {
            (levels.sample_raw, levels.sample_avg)
        };

        Self {
            sample_raw,
            sample_smth,
            sample_peak: peak.into(),
            frame_counter,
            fft_result: levels.fft_result,
            fft_magnitude: levels.my_magnitude,
            fft_major_peak: levels.fft_major_peak,
        }
    }

    pub fn to_bytes(&self) -> [u8; V2_PACKET_LEN] {
        let mut bytes = [0; V2_PACKET_LEN];

        put(&mut bytes, v2::HEADER, V2_HEADER);
        put(&mut bytes, v2::SAMPLE_RAW, self.sample_raw.to_ne_bytes());
        put(&mut bytes, v2::SAMPLE_SMTH, self.sample_smth.to_ne_bytes());
        put(&mut bytes, v2::SAMPLE_PEAK, [self.sample_peak]);
        put(&mut bytes, v2::FRAME_COUNTER, [self.frame_counter]);
        put(&mut bytes, v2::FFT_RESULT, self.fft_result);
        put(&mut bytes, v2::FFT_MAGNITUDE, self.fft_magnitude.to_ne_bytes());
        put(&mut bytes, v2::FFT_MAJOR_PEAK, self.fft_major_peak.to_ne_bytes());

        bytes
    }

    /// Parses a record, without checking the header.
    ///
    /// Returns `None` if `bytes` isn't exactly [`V2_PACKET_LEN`] bytes long.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != V2_PACKET_LEN {
            return None;
        }

        let [sample_peak] = get::<1>(bytes, v2::SAMPLE_PEAK);
        let [frame_counter] = get::<1>(bytes, v2::FRAME_COUNTER);

        Some(Self {
            sample_raw: f32::from_ne_bytes(get(bytes, v2::SAMPLE_RAW)),
            sample_smth: f32::from_ne_bytes(get(bytes, v2::SAMPLE_SMTH)),
            sample_peak,
            frame_counter,
            fft_result: get(bytes, v2::FFT_RESULT),
            fft_magnitude: f32::from_ne_bytes(get(bytes, v2::FFT_MAGNITUDE)),
            fft_major_peak: f32::from_ne_bytes(get(bytes, v2::FFT_MAJOR_PEAK)),
        })
    }

    pub fn levels(&self) -> AudioLevels {
        let volume_smth = non_negative(self.sample_smth);
        let volume_raw = non_negative(self.sample_raw);
        let fft_magnitude = non_negative(self.fft_magnitude);

        AudioLevels {
            volume_smth,
            volume_raw,
            sample_raw: volume_raw,
            sample_avg: volume_smth,
            sample_agc: volume_smth,
            raw_sample_agc: volume_raw,
            mult_agc: 1.,
            fft_result: self.fft_result,
            fft_magnitude,
            fft_major_peak: clamp_major_peak(self.fft_major_peak),
            my_magnitude: fft_magnitude,
        }
    }
}

/// The legacy (v1) wire record.
///
/// | field            | type       | offset |
/// |------------------|------------|--------|
/// | header           | `[u8; 6]`  | 0      |
/// | `reserved`       | `[u8; 32]` | 6      |
/// | `sample_agc`     | `i32`      | 38     |
/// | `sample_raw`     | `i32`      | 42     |
/// | `sample_avg`     | `f32`      | 46     |
/// | `sample_peak`    | `u8`       | 50     |
/// | `fft_result`     | `[u8; 16]` | 51     |
/// | `fft_magnitude`  | `f64`      | 67     |
/// | `fft_major_peak` | `f64`      | 75     |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSyncPacketV1 {
    pub reserved: [u8; 32],
    pub sample_agc: i32,
    pub sample_raw: i32,
    pub sample_avg: f32,
    pub sample_peak: u8,
    pub fft_result: [u8; N_BANDS],
    pub fft_magnitude: f64,
    pub fft_major_peak: f64,
}

impl Default for AudioSyncPacketV1 {
    fn default() -> Self {
        Self {
            reserved: [0; 32],
            sample_agc: 0,
            sample_raw: 0,
            sample_avg: 0.,
            sample_peak: 0,
            fft_result: [0; N_BANDS],
            fft_magnitude: 0.,
            fft_major_peak: 0.,
        }
    }
}

impl AudioSyncPacketV1 {
    /// Serializes a legacy record.
    ///
    /// Only useful to talk to, or impersonate, old senders. Sessions never send this.
    pub fn to_bytes(&self) -> [u8; V1_PACKET_LEN] {
        let mut bytes = [0; V1_PACKET_LEN];

        put(&mut bytes, v1::HEADER, V1_HEADER);
        put(&mut bytes, v1::RESERVED, self.reserved);
        put(&mut bytes, v1::SAMPLE_AGC, self.sample_agc.to_ne_bytes());
        put(&mut bytes, v1::SAMPLE_RAW, self.sample_raw.to_ne_bytes());
        put(&mut bytes, v1::SAMPLE_AVG, self.sample_avg.to_ne_bytes());
        put(&mut bytes, v1::SAMPLE_PEAK, [self.sample_peak]);
        put(&mut bytes, v1::FFT_RESULT, self.fft_result);
        put(&mut bytes, v1::FFT_MAGNITUDE, self.fft_magnitude.to_ne_bytes());
        put(&mut bytes, v1::FFT_MAJOR_PEAK, self.fft_major_peak.to_ne_bytes());

        bytes
    }

    /// Parses a record, without checking the header.
    ///
    /// Returns `None` if `bytes` isn't exactly [`V1_PACKET_LEN`] bytes long.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != V1_PACKET_LEN {
            return None;
        }

        let [sample_peak] = get::<1>(bytes, v1::SAMPLE_PEAK);

        Some(Self {
            reserved: get(bytes, v1::RESERVED),
            sample_agc: i32::from_ne_bytes(get(bytes, v1::SAMPLE_AGC)),
            sample_raw: i32::from_ne_bytes(get(bytes, v1::SAMPLE_RAW)),
            sample_avg: f32::from_ne_bytes(get(bytes, v1::SAMPLE_AVG)),
            sample_peak,
            fft_result: get(bytes, v1::FFT_RESULT),
            fft_magnitude: f64::from_ne_bytes(get(bytes, v1::FFT_MAGNITUDE)),
            fft_major_peak: f64::from_ne_bytes(get(bytes, v1::FFT_MAJOR_PEAK)),
        })
    }

    pub fn levels(&self) -> AudioLevels {
        // v1 has no separate raw AGC sample
        let volume_smth = non_negative(self.sample_agc as f32);
        let volume_raw = volume_smth;
        let fft_magnitude = non_negative(self.fft_magnitude as f32);

        AudioLevels {
            volume_smth,
            volume_raw,
            sample_raw: non_negative(self.sample_raw as f32),
            sample_avg: non_negative(self.sample_avg),
            sample_agc: volume_smth,
            raw_sample_agc: volume_raw,
            mult_agc: 1.,
            fft_result: self.fft_result,
            fft_magnitude,
            fft_major_peak: clamp_major_peak(self.fft_major_peak as f32),
            my_magnitude: fft_magnitude,
        }
    }
}

/// An accepted inbound record, of either format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodedPacket {
    V1(AudioSyncPacketV1),
    V2(AudioSyncPacket),
}

impl DecodedPacket {
    #[inline(always)]
    pub const fn format(&self) -> PacketFormat {
        match self {
            Self::V1(_) => PacketFormat::V1,
            Self::V2(_) => PacketFormat::V2,
        }
    }

    /// Whether the sender reported a peak.
    #[inline(always)]
    pub const fn peak(&self) -> bool {
        match self {
            Self::V1(p) => p.sample_peak != 0,
            Self::V2(p) => p.sample_peak != 0,
        }
    }

    /// The synchronized values this record maps to, clamped to their valid ranges.
    pub fn levels(&self) -> AudioLevels {
        match self {
            Self::V1(p) => p.levels(),
            Self::V2(p) => p.levels(),
        }
    }
}

/// Encodes `state`'s local analysis as a current-format datagram.
///
/// The peak bit carries the tracker's pending broadcast peak.
pub fn encode(state: &SyncState, agc: bool, frame_counter: u8) -> [u8; V2_PACKET_LEN] {
    AudioSyncPacket::from_levels(
        &state.levels,
        agc,
        state.peak.udp_sample_peak(),
        frame_counter,
    )
    .to_bytes()
}

/// Classifies `bytes` as one of the known formats and decodes it.
///
/// There is no partial decoding, the length must match a format exactly.
pub fn classify_and_decode(bytes: &[u8]) -> Result<DecodedPacket, MalformedPacket> {
    let format = PacketFormat::classify(bytes)?;

    let packet = match format {
        PacketFormat::V1 => AudioSyncPacketV1::parse(bytes).map(DecodedPacket::V1),
        PacketFormat::V2 => AudioSyncPacket::parse(bytes).map(DecodedPacket::V2),
    };

    // classify already checked the length
    packet.ok_or(MalformedPacket::WrongLength(bytes.len()))
}
