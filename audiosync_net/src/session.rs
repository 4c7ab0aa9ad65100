//! The poll-driven sync session.

use core::net::SocketAddr;

use crate::{
    Clock, Connectivity, SyncConfig, SyncError, Transport,
    lifecycle::NetworkLifecycleManager,
    proto::{self, AudioLevels, SyncState, packet},
};

/// Owns a transport and the synchronized state built from it.
///
/// Drive it by calling [`read`](Self::read) periodically (and
/// [`send`](Self::send), if this node is the audio source). Each call runs to
/// completion without blocking.
///
/// ```ignore
/// let mut session = SyncSession::new(
///     UdpMulticastTransport::default(),
///     RouteProbe::new(config.group, config.port),
///     SystemClock::new(),
///     config,
/// );
///
/// loop {
///     if session.read() {
///         render(session.state());
///     }
///     std::thread::sleep(POLL_PERIOD);
/// }
/// ```
#[derive(Debug)]
pub struct SyncSession<T, N, C> {
    transport: T,
    connectivity: N,
    clock: C,
    lifecycle: NetworkLifecycleManager,
    config: SyncConfig,
    state: SyncState,
    frame_counter: u8,
    // unlike state.last_packet_time, sends never move this
    last_accept_time: u32,
    // the latest candidate of the current drain cycle
    scratch: arrayvec::ArrayVec<u8, { proto::MAX_PACKET_LEN }>,
    silenced: bool,
}

impl<T: Transport, N: Connectivity, C: Clock> SyncSession<T, N, C> {
    /// Creates a disconnected session with silent state.
    pub fn new(transport: T, connectivity: N, clock: C, config: SyncConfig) -> Self {
        Self {
            transport,
            connectivity,
            clock,
            lifecycle: NetworkLifecycleManager::new(config.group, config.port),
            config,
            state: SyncState::new(),
            frame_counter: 0,
            last_accept_time: 0,
            scratch: arrayvec::ArrayVec::new_const(),
            silenced: false,
        }
    }

    /// Joins the multicast group right away.
    ///
    /// Optional: [`read`](Self::read) joins on its own once connectivity is observed.
    pub fn begin(&mut self) -> Result<(), SyncError> {
        self.lifecycle.join(&mut self.transport)
    }

    /// Leaves the group. The next [`read`](Self::read) rejoins if the network is up.
    pub fn end(&mut self) {
        self.lifecycle.leave(&mut self.transport);
    }

    #[inline(always)]
    pub fn is_connected(&self) -> bool {
        self.lifecycle.is_connected()
    }

    /// The synchronized state, as the effects engine should see it.
    #[inline(always)]
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    #[inline(always)]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[inline(always)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Where the local audio sampler writes its analysis, before [`send`](Self::send)ing it.
    #[inline(always)]
    pub fn local_levels_mut(&mut self) -> &mut AudioLevels {
        &mut self.state.levels
    }

    /// Reports a peak detected by the local audio sampler.
    ///
    /// Returns `true` if it was latched (no other peak was being held).
    pub fn report_local_peak(&mut self) -> bool {
        let now = self.clock.monotonic_millis();
        self.state.peak.on_local_peak(now)
    }

    /// Whether data was accepted recently enough to be considered live.
    pub fn is_receiving(&self) -> bool {
        let now = self.clock.monotonic_millis();

        self.state.source_ip.is_some()
            && !self.silenced
            && proto::elapsed_millis(now, self.last_accept_time) <= self.config.receive_timeout_ms
    }

    /// Broadcasts the local analysis as a single current-format datagram.
    ///
    /// A pending local peak is sent, and cleared, with it. Failures are not
    /// retried, the next call simply tries again.
    pub fn send(&mut self) -> Result<(), SyncError> {
        if !self.lifecycle.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let bytes = packet::encode(&self.state, self.config.agc, self.frame_counter);
        self.frame_counter = self.frame_counter.wrapping_add(1);

        self.transport
            .send_datagram(&bytes)
            .map_err(SyncError::Send)?;

        self.state.peak.take_udp_peak();
        self.state.last_packet_time = self.clock.monotonic_millis();

        Ok(())
    }

    /// Polls the network, returns `true` if fresh data was accepted.
    ///
    /// In order:
    ///
    /// 1. Reconciles the group membership with connectivity. If disconnected, returns
    ///    `false` right away, without touching any state.
    /// 2. Releases a latched peak whose hold time has elapsed.
    /// 3. Drains every queued datagram, remembering only the last one of a plausible
    ///    size. Older ones are dequeued but never decoded.
    /// 4. Decodes that last one. If it is rejected, the received format is reset.
    ///
    /// Whenever nothing is accepted, received audio that went stale is silenced.
    pub fn read(&mut self) -> bool {
        let link_up = self.connectivity.is_connected();

        if let Err(e) = self.lifecycle.reconcile(link_up, &mut self.transport) {
            log::warn!("{e}, retrying on next poll");
        }

        if !self.lifecycle.is_connected() {
            return false;
        }

        let now = self.clock.monotonic_millis();

        self.state
            .peak
            .tick(now, self.config.peak_hold_ms, self.config.mode.is_sending());

        let Some(source) = self.drain() else {
            self.silence_if_stale(now);
            return false;
        };

        match packet::classify_and_decode(&self.scratch) {
            Ok(packet) => {
                log::trace!("accepted {} packet from {source}", packet.format());
                self.state.apply(&packet, source, now);
                self.last_accept_time = now;
                self.silenced = false;
                true
            }
            Err(e) => {
                log::debug!("rejected packet from {source}: {e}");
                self.state.received_format = None;
                self.silence_if_stale(now);
                false
            }
        }
    }

    /// Empties the transport's queue, leaving the last candidate in `self.scratch`.
    fn drain(&mut self) -> Option<SocketAddr> {
        let mut buf = [0; proto::MAX_PACKET_LEN];
        let mut latest = None;

        while let Some(len) = self.transport.poll_pending() {
            if len <= proto::MIN_PACKET_LEN_EXCLUSIVE || len > proto::MAX_PACKET_LEN {
                log::trace!("dropping {len} byte datagram");
                self.transport.discard_pending();
                continue;
            }

            match self.transport.receive_into(&mut buf) {
                Ok((n, source)) => {
                    self.scratch.clear();
                    // n is at most buf.len(), which is the scratch capacity
                    let _ = self.scratch.try_extend_from_slice(&buf[..n]);
                    latest = Some(source);
                }
                Err(e) if crate::io_err_is_timeout(e.kind()) => break,
                Err(e) => {
                    log::warn!("receiving sync packet failed: {e}");
                    break;
                }
            }
        }

        latest
    }

    fn silence_if_stale(&mut self, now: u32) {
        let timed_out = self.config.mode.is_receiving()
            && !self.silenced
            && self.state.source_ip.is_some()
            && proto::elapsed_millis(now, self.last_accept_time) > self.config.receive_timeout_ms;

        if timed_out {
            log::info!(
                "no sync data for {} ms, falling silent",
                self.config.receive_timeout_ms
            );
            self.state.silence();
            self.silenced = true;
        }
    }
}
