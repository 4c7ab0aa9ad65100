//! Ready-to-run sync nodes, wiring a [`SyncSession`] to real multicast sockets.
//!
//! - [`broadcast`]: an audio source, sending a synthetic analysis to the group.
//! - [`listen`]: follows the group, rendering the synchronized state on its own
//!   thread, fed through a [`queue::latest_channel`].

use core::{convert::Infallible, f32::consts::TAU, fmt::Write as _, num, time::Duration};
use std::{ffi::OsString, path::Path, thread};

pub use audiosync_net as net;

use net::{
    ConfigError, SyncConfig, SyncSession,
    connectivity::RouteProbe,
    proto::{self, AudioLevels, N_BANDS, SyncState},
    transport::UdpMulticastTransport,
    utils::{Clock, SystemClock, queue},
};

/// How often a broadcaster sends its analysis.
pub const SEND_PERIOD: Duration = Duration::from_millis(20);
/// How often a listener polls the network.
pub const POLL_PERIOD: Duration = Duration::from_millis(5);
/// How often a listener's render thread redraws.
pub const RENDER_PERIOD: Duration = Duration::from_millis(50);
/// Interval between two synthetic beats.
pub const BEAT_PERIOD_MS: u32 = 500;

const HANDOFF_CAPACITY: num::NonZeroUsize = num::NonZeroUsize::new(64).unwrap();

pub type NodeSession = SyncSession<UdpMulticastTransport, RouteProbe, SystemClock>;

/// Reads the config from the file named by the first argument, if any.
///
/// `args` is expected to start with the program name, like [`std::env::args_os`].
pub fn config_from_args(
    mut args: impl Iterator<Item = OsString>,
) -> Result<SyncConfig, ConfigError> {
    match args.nth(1) {
        Some(path) => {
            log::info!("loading config from {}", Path::new(&path).display());
            SyncConfig::from_file(path)
        }
        None => Ok(SyncConfig::default()),
    }
}

/// A session on the OS's UDP stack.
pub fn session(config: SyncConfig, clock: SystemClock) -> NodeSession {
    let probe = RouteProbe::new(config.group, config.port);
    SyncSession::new(UdpMulticastTransport::default(), probe, clock, config)
}

/// Fake audio analysis: a slow swell, with a beat every [`BEAT_PERIOD_MS`].
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    last_beat: Option<u32>,
}

impl SyntheticSource {
    /// Length of one swell, in milliseconds.
    const SWELL_MS: u32 = 4000;

    #[inline(always)]
    pub const fn new() -> Self {
        Self { last_beat: None }
    }

    pub fn levels(&self, now: u32) -> AudioLevels {
        let phase = (now % Self::SWELL_MS) as f32 / Self::SWELL_MS as f32;
        let swell = 0.5 - 0.5 * (TAU * phase).cos();
        let volume = 255. * swell;

        let mut fft_result = [0; N_BANDS];

        for (i, band) in fft_result.iter_mut().enumerate() {
            let pos = i as f32 / N_BANDS as f32;
            // bass heavy, with a ripple running up the spectrum
            let ripple = 0.5 + 0.5 * (TAU * (4. * phase - pos)).sin();
            *band = (255. * swell * (1. - pos) * ripple) as u8;
        }

        let magnitude = 16. * volume;

        AudioLevels {
            volume_smth: volume,
            volume_raw: volume,
            sample_raw: volume,
            sample_avg: volume,
            sample_agc: volume,
            raw_sample_agc: volume,
            mult_agc: 1.,
            fft_result,
            fft_magnitude: magnitude,
            fft_major_peak: 60. + 1940. * swell,
            my_magnitude: magnitude,
        }
    }

    /// Returns `true` at most once every [`BEAT_PERIOD_MS`].
    pub fn beat(&mut self, now: u32) -> bool {
        match self.last_beat {
            Some(t) if proto::elapsed_millis(now, t) < BEAT_PERIOD_MS => false,
            _ => {
                self.last_beat = Some(now);
                true
            }
        }
    }
}

/// One line summary of a synchronized state.
pub fn describe(state: &SyncState, receiving: bool) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

    let mut line = String::new();

    let _ = match (receiving, state.received_format, state.source_ip) {
        (true, Some(format), Some(ip)) => write!(line, "{format} from {ip:<15} "),
        _ => write!(line, "{:<24}", "no sync"),
    };

    let levels = &state.levels;

    let _ = write!(
        line,
        "vol {:>5.1} {:>7.1} Hz ",
        levels.volume_smth, levels.fft_major_peak
    );

    line.extend(
        levels
            .fft_result
            .iter()
            .map(|&band| BARS[usize::from(band) * BARS.len() / 256]),
    );

    if state.peak.sample_peak() {
        line.push_str(" *");
    }

    line
}

/// Broadcasts a synthetic analysis every [`SEND_PERIOD`], forever.
pub fn broadcast(mut config: SyncConfig) -> anyhow::Result<Infallible> {
    if !config.mode.is_sending() {
        log::warn!("mode {:?} doesn't send, broadcasting anyway", config.mode);
        config.mode = net::SyncMode::Send;
    }

    let clock = SystemClock::new();
    let mut session = session(config, clock);
    let mut source = SyntheticSource::new();

    if let Err(e) = session.begin() {
        log::warn!("{e}, retrying");
    }

    loop {
        // keeps the membership current, and releases expired peaks
        session.read();

        let now = clock.monotonic_millis();

        *session.local_levels_mut() = source.levels(now);

        if source.beat(now) {
            session.report_local_peak();
        }

        if let Err(e) = session.send() {
            log::debug!("{e}");
        }

        thread::sleep(SEND_PERIOD);
    }
}

/// Follows the group, logging the synchronized state every [`RENDER_PERIOD`].
///
/// The network is polled on a dedicated thread, the calling thread renders.
pub fn listen(config: SyncConfig) -> anyhow::Result<()> {
    let (mut tx, mut rx) = queue::latest_channel::<(SyncState, bool)>(HANDOFF_CAPACITY);

    let network = thread::Builder::new()
        .name("audiosync-net".into())
        .spawn(move || {
            let mut session = session(config, SystemClock::new());
            let mut was_receiving = false;

            while !tx.is_abandoned() {
                let fresh = session.read();
                let receiving = session.is_receiving();

                let delivered = if fresh || receiving != was_receiving {
                    tx.publish((*session.state(), receiving))
                } else {
                    tx.flush()
                };

                if !delivered {
                    log::trace!("render thread lagging, holding back a snapshot");
                }

                was_receiving = receiving;
                thread::sleep(POLL_PERIOD);
            }
        })?;

    while !rx.is_abandoned() {
        if rx.refresh() {
            if let Some((state, receiving)) = rx.latest() {
                log::info!("{}", describe(state, *receiving));
            }
        }

        thread::sleep(RENDER_PERIOD);
    }

    network
        .join()
        .map_err(|_| anyhow::anyhow!("network thread panicked"))
}
