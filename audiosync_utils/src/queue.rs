//! Latest-value hand-off between two threads.
//!
//! The producer (typically the thread polling the network) publishes snapshots
//! into a bounded ring buffer, the consumer (typically a rendering loop) drains
//! it and only keeps the newest one. Neither side ever blocks.

use core::num;

pub use rtrb;

/// Creates a connected [`StateTx`]/[`StateRx`] pair, buffering up to `capacity`
/// unconsumed snapshots.
#[inline]
pub fn latest_channel<T>(capacity: num::NonZeroUsize) -> (StateTx<T>, StateRx<T>) {
    let (tx, rx) = rtrb::RingBuffer::new(capacity.get());
    (
        StateTx { tx, pending: None },
        StateRx { rx, latest: None },
    )
}

/// Producing half of a [`latest_channel`].
#[derive(Debug)]
pub struct StateTx<T> {
    tx: rtrb::Producer<T>,
    // newest snapshot the ring had no room for
    pending: Option<T>,
}

impl<T> StateTx<T> {
    /// Publishes a snapshot.
    ///
    /// Returns `false` if the consumer is lagging and the buffer is full. `value` is
    /// then held back, and pushed by the next [`flush`](Self::flush) or `publish`,
    /// unless a newer snapshot replaces it first.
    #[inline]
    pub fn publish(&mut self, value: T) -> bool {
        self.pending = Some(value);
        self.flush()
    }

    /// Retries pushing a held back snapshot. Returns `true` if none is left.
    pub fn flush(&mut self) -> bool {
        let Some(value) = self.pending.take() else {
            return true;
        };

        match self.tx.push(value) {
            Ok(()) => true,
            Err(rtrb::PushError::Full(value)) => {
                self.pending = Some(value);
                false
            }
        }
    }

    /// Whether the consuming half was dropped.
    #[inline(always)]
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_abandoned()
    }
}

/// Consuming half of a [`latest_channel`].
#[derive(Debug)]
pub struct StateRx<T> {
    rx: rtrb::Consumer<T>,
    latest: Option<T>,
}

impl<T> StateRx<T> {
    /// Drains every pending snapshot, keeping only the last one.
    ///
    /// Returns `true` if anything new arrived since the previous call.
    #[inline]
    pub fn refresh(&mut self) -> bool {
        let n = self.rx.slots();

        if n == 0 {
            return false;
        }

        // n slots are readable, so this can't fail
        if let Ok(chunk) = self.rx.read_chunk(n) {
            if let Some(last) = chunk.into_iter().last() {
                self.latest = Some(last);
            }
        }

        true
    }

    /// The newest snapshot seen so far, if any.
    #[inline(always)]
    pub fn latest(&self) -> Option<&T> {
        self.latest.as_ref()
    }

    /// Whether the producing half was dropped.
    #[inline(always)]
    pub fn is_abandoned(&self) -> bool {
        self.rx.is_abandoned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_newest() {
        let (mut tx, mut rx) = latest_channel(num::NonZeroUsize::new(4).unwrap());

        assert!(!rx.refresh());
        assert_eq!(rx.latest(), None);

        assert!(tx.publish(1));
        assert!(tx.publish(2));
        assert!(tx.publish(3));

        assert!(rx.refresh());
        assert_eq!(rx.latest(), Some(&3));

        // nothing new, but the last value sticks around
        assert!(!rx.refresh());
        assert_eq!(rx.latest(), Some(&3));
    }

    #[test]
    fn full_buffer_holds_back_the_newest() {
        let (mut tx, mut rx) = latest_channel(num::NonZeroUsize::new(2).unwrap());

        assert!(tx.publish(1));
        assert!(tx.publish(2));
        assert!(!tx.publish(3));

        assert!(rx.refresh());
        assert_eq!(rx.latest(), Some(&2));

        assert!(tx.flush());
        assert!(rx.refresh());
        assert_eq!(rx.latest(), Some(&3));

        // nothing left to push
        assert!(tx.flush());
        assert!(!rx.refresh());
    }

    #[test]
    fn newer_publish_supersedes_held_back_one() {
        let (mut tx, mut rx) = latest_channel(num::NonZeroUsize::MIN);

        assert!(tx.publish('a'));
        assert!(!tx.publish('b'));
        assert!(!tx.publish('c'));

        assert!(rx.refresh());
        assert_eq!(rx.latest(), Some(&'a'));

        assert!(tx.flush());
        assert!(rx.refresh());
        assert_eq!(rx.latest(), Some(&'c'));
        assert!(!rx.refresh());
    }

    #[test]
    fn detects_abandonment() {
        let (tx, rx) = latest_channel::<u8>(num::NonZeroUsize::MIN);

        drop(rx);
        assert!(tx.is_abandoned());
    }

    #[test]
    fn works_across_threads() {
        let (mut tx, mut rx) = latest_channel(num::NonZeroUsize::new(16).unwrap());

        let producer = std::thread::spawn(move || {
            for i in 0..=100u32 {
                while !tx.publish(i) {
                    std::thread::yield_now();
                }
            }
        });

        while rx.latest() != Some(&100) {
            rx.refresh();
            std::thread::yield_now();
        }

        producer.join().unwrap();
        assert!(rx.is_abandoned());
    }
}
