//! Small runtime utilities shared by sync nodes.
//!
//! - A monotonic, wrapping millisecond [`Clock`], the only notion of time the
//!   protocol needs.
//! - A lock-free [`queue`] for handing the freshest synchronized state from the
//!   polling thread to a rendering thread.

pub mod queue;

/// A source of monotonic time, in milliseconds.
///
/// Readings wrap around on overflow. Always compare them with wrapping
/// subtraction (see `audiosync_proto::elapsed_millis`), never with `<`.
pub trait Clock {
    fn monotonic_millis(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline(always)]
    fn monotonic_millis(&self) -> u32 {
        (**self).monotonic_millis()
    }
}

/// A [`Clock`] backed by [`std::time::Instant`], counting from its creation.
///
/// ```ignore
/// let clock = SystemClock::new();
///
/// let then = clock.monotonic_millis();
/// // ...
/// let elapsed = clock.monotonic_millis().wrapping_sub(then);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SystemClock(std::time::Instant);

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    #[inline(always)]
    pub fn new() -> Self {
        Self(std::time::Instant::now())
    }
}

impl Clock for SystemClock {
    #[inline(always)]
    fn monotonic_millis(&self) -> u32 {
        // truncation is the wraparound
        self.0.elapsed().as_millis() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();

        let a = clock.monotonic_millis();
        std::thread::sleep(core::time::Duration::from_millis(5));
        let b = clock.monotonic_millis();

        assert!(b.wrapping_sub(a) >= 5);
    }

    #[test]
    fn clock_by_reference() {
        fn read(clock: impl Clock) -> u32 {
            clock.monotonic_millis()
        }

        let clock = SystemClock::new();
        assert!(read(&clock) < 1000);
    }
}
