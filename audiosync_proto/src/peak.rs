//! Peak (beat) latching.

use core::mem;

/// Default minimum time, in milliseconds, a peak stays visible once latched.
pub const DEFAULT_PEAK_HOLD_MS: u32 = 50;

/// Latches a transient peak for a minimum hold time.
///
/// Two states: **idle** (`sample_peak() == false`) and **peaking**. A peak
/// report only has an effect when idle, so an effect already animating a peak
/// isn't restarted by a second, possibly older, report. Once the hold time has
/// elapsed, [`tick`](Self::tick) returns the tracker to idle.
///
/// All times are readings of a wrapping 32-bit millisecond clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeakTracker {
    sample_peak: bool,
    time_of_peak: u32,
    // Set by the local sampler, consumed by the broadcaster
    udp_sample_peak: bool,
}

impl PeakTracker {
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            sample_peak: false,
            time_of_peak: 0,
            udp_sample_peak: false,
        }
    }

    /// Whether a peak is currently latched.
    #[inline(always)]
    pub const fn sample_peak(&self) -> bool {
        self.sample_peak
    }

    /// When the currently (or last) latched peak was observed.
    #[inline(always)]
    pub const fn time_of_peak(&self) -> u32 {
        self.time_of_peak
    }

    /// Whether a locally detected peak is waiting to be broadcast.
    #[inline(always)]
    pub const fn udp_sample_peak(&self) -> bool {
        self.udp_sample_peak
    }

    /// Reports a peak, either from an inbound packet or from local sampling.
    ///
    /// Returns `true` if the tracker went from idle to peaking.
    #[inline]
    pub fn on_peak_observed(&mut self, now: u32) -> bool {
        if self.sample_peak {
            return false;
        }

        self.sample_peak = true;
        self.time_of_peak = now;
        true
    }

    /// Reports a peak detected by the local audio sampler.
    ///
    /// In addition to latching it, marks it as pending for the next broadcast.
    #[inline]
    pub fn on_local_peak(&mut self, now: u32) -> bool {
        let triggered = self.on_peak_observed(now);

        if triggered {
            self.udp_sample_peak = true;
        }

        triggered
    }

    /// Releases the latched peak once more than `min_hold_ms` have elapsed since it
    /// was observed.
    ///
    /// The pending broadcast peak is normally cleared by the broadcaster through
    /// [`take_udp_peak`](Self::take_udp_peak). When nothing is `broadcasting`,
    /// it is released here too, alongside the latched peak.
    pub fn tick(&mut self, now: u32, min_hold_ms: u32, broadcasting: bool) {
        if crate::elapsed_millis(now, self.time_of_peak) > min_hold_ms {
            self.sample_peak = false;

            if !broadcasting {
                self.udp_sample_peak = false;
            }
        }
    }

    /// Returns, and clears, the pending broadcast peak.
    #[inline(always)]
    pub fn take_udp_peak(&mut self) -> bool {
        mem::take(&mut self.udp_sample_peak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latches_and_holds() {
        let mut peak = PeakTracker::new();
        let t = 1000;

        assert!(peak.on_peak_observed(t));
        assert!(peak.sample_peak());
        assert_eq!(peak.time_of_peak(), t);

        // a second report within the hold doesn't restart the animation
        assert!(!peak.on_peak_observed(t + 10));
        assert_eq!(peak.time_of_peak(), t);

        peak.tick(t + 50, DEFAULT_PEAK_HOLD_MS, true);
        assert!(peak.sample_peak());

        peak.tick(t + 51, DEFAULT_PEAK_HOLD_MS, true);
        assert!(!peak.sample_peak());

        // and can be triggered again
        assert!(peak.on_peak_observed(t + 60));
        assert_eq!(peak.time_of_peak(), t + 60);
    }

    #[test]
    fn survives_clock_wraparound() {
        let mut peak = PeakTracker::new();
        let t = u32::MAX - 5;

        peak.on_peak_observed(t);

        peak.tick(t.wrapping_add(30), DEFAULT_PEAK_HOLD_MS, true);
        assert!(peak.sample_peak());

        peak.tick(t.wrapping_add(51), DEFAULT_PEAK_HOLD_MS, true);
        assert!(!peak.sample_peak());
    }

    #[test]
    fn broadcaster_owns_udp_peak() {
        let mut peak = PeakTracker::new();

        assert!(peak.on_local_peak(0));
        assert!(peak.udp_sample_peak());

        peak.tick(100, DEFAULT_PEAK_HOLD_MS, true);
        assert!(!peak.sample_peak());
        assert!(peak.udp_sample_peak());

        assert!(peak.take_udp_peak());
        assert!(!peak.udp_sample_peak());
    }

    #[test]
    fn udp_peak_released_without_broadcaster() {
        let mut peak = PeakTracker::new();

        peak.on_local_peak(0);
        peak.tick(20, DEFAULT_PEAK_HOLD_MS, false);
        assert!(peak.udp_sample_peak());

        peak.tick(100, DEFAULT_PEAK_HOLD_MS, false);
        assert!(!peak.udp_sample_peak());
        assert!(!peak.sample_peak());
    }

    #[test]
    fn remote_peak_is_not_rebroadcast() {
        let mut peak = PeakTracker::new();

        assert!(peak.on_peak_observed(0));
        assert!(!peak.udp_sample_peak());

        // already latched, so the local report is ignored entirely
        assert!(!peak.on_local_peak(5));
        assert!(!peak.udp_sample_peak());
    }
}
