//! ISR-to-task rendezvous for the Slave's receive-interrupt timestamping.
//!
//! The radio's RX-done interrupt fires in interrupt context and has exactly
//! one thing to hand to the frame-advance code: the microsecond timestamp
//! of the just-arrived packet, and whether it should be treated as a fresh
//! sync boundary. Not every interrupt qualifies — up to three packets can
//! arrive in a single frame, but only the first one far enough past the
//! last accepted sync counts as a fresh boundary; the rest are debounced
//! out before they ever reach the latch. A blocking mutex is unnecessary
//! and unwanted here (the writer must never block in interrupt context);
//! this is a single-slot, single-producer single-consumer flag built from
//! atomics with release/acquire ordering, publish-then-signal on the ISR
//! side and snapshot-then-clear on the task side.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// A timestamped sync observation, as read by the frame-advance code.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncSample {
    /// The microsecond timestamp the ISR recorded for the triggering
    /// packet, already biased by [`SyncLatch`]'s `sync_delay`.
    pub timestamp: u32,
    /// Whether this observation should be treated as a fresh frame-boundary
    /// sync, as opposed to a repeat within the same frame.
    pub is_sync_frame: bool,
}

/// Single-slot rendezvous between the receive ISR and the task that
/// advances the frame clock.
///
/// The ISR calls [`SyncLatch::publish`] every time it stamps an incoming
/// packet; the frame-advance code calls [`SyncLatch::take`] once per frame,
/// which snapshots and clears the latch in one pass so a second interrupt
/// racing the read can never be silently merged into the sample already in
/// flight.
///
/// Construct with the Slave's `micros_per_frame` — this derives
/// `sync_delay` (an offset added to every raw timestamp before it is used,
/// compensating for the fixed latency between the radio's interrupt and
/// the ISR actually running) and `half_micros_per_frame` (the debounce
/// window: a publish within half a frame period of the last accepted one
/// is dropped, so roughly one interrupt per frame period is ever treated
/// as a fresh sync boundary, no matter how many packets arrive in it).
#[derive(Debug)]
pub struct SyncLatch {
    timestamp: AtomicU32,
    pending: AtomicBool,
    last_accepted: AtomicU32,
    sync_delay: u32,
    half_micros_per_frame: u32,
}

impl SyncLatch {
    /// Creates an empty latch sized for a Slave running at `micros_per_frame`.
    pub fn new(micros_per_frame: u32) -> Self {
        SyncLatch {
            timestamp: AtomicU32::new(0),
            pending: AtomicBool::new(false),
            last_accepted: AtomicU32::new(0),
            sync_delay: micros_per_frame / 8,
            half_micros_per_frame: micros_per_frame / 2,
        }
    }

    /// Called from interrupt context with the raw receive timestamp.
    ///
    /// Biases it by `sync_delay`, then drops it unless it is at least
    /// `half_micros_per_frame` past the last accepted sync (wrapping
    /// subtraction, so this holds across the 32-bit wrap too) — otherwise
    /// every one of the up-to-three packets/frame would independently
    /// trigger a drift correction instead of just the first. A dropped
    /// publish never sets `pending`, so [`SyncLatch::take`] sees no sync
    /// sample for that interrupt at all.
    pub fn publish(&self, raw_timestamp: u32) {
        let biased = raw_timestamp.wrapping_add(self.sync_delay);
        let last_accepted = self.last_accepted.load(Ordering::Acquire);
        if biased.wrapping_sub(last_accepted) < self.half_micros_per_frame {
            return;
        }

        self.last_accepted.store(biased, Ordering::Release);
        self.timestamp.store(biased, Ordering::Release);
        self.pending.store(true, Ordering::Release);
    }

    /// Called from task context once per frame. Snapshots the latch and
    /// clears the pending flag atomically with respect to the snapshot, so
    /// a sample is never read twice.
    pub fn take(&self) -> SyncSample {
        let is_sync_frame = self.pending.swap(false, Ordering::AcqRel);
        let timestamp = self.timestamp.load(Ordering::Acquire);
        SyncSample { timestamp, is_sync_frame }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_latch_yields_no_sync() {
        let latch = SyncLatch::new(10_000);
        let sample = latch.take();
        assert!(!sample.is_sync_frame);
    }

    #[test]
    fn publish_then_take_round_trips_biased_timestamp() {
        let latch = SyncLatch::new(10_000);
        latch.publish(12_345);
        let sample = latch.take();
        assert!(sample.is_sync_frame);
        // sync_delay = 10_000 / 8 = 1_250.
        assert_eq!(sample.timestamp, 12_345 + 1_250);
    }

    #[test]
    fn take_clears_the_pending_flag() {
        let latch = SyncLatch::new(10_000);
        latch.publish(1_000_000);
        let _ = latch.take();
        let second = latch.take();
        assert!(!second.is_sync_frame);
    }

    #[test]
    fn a_second_publish_within_half_a_frame_is_debounced() {
        // Up to 3 packets can arrive in one frame; only the first far
        // enough past the last accepted sync should count.
        let latch = SyncLatch::new(10_000);
        latch.publish(1_000_000);
        latch.publish(1_000_000 + 1); // well within half_micros_per_frame (5_000)
        let sample = latch.take();
        assert!(sample.is_sync_frame);
        assert_eq!(sample.timestamp, 1_000_000 + 1_250);
    }

    #[test]
    fn a_publish_past_the_debounce_window_is_accepted() {
        let latch = SyncLatch::new(10_000);
        latch.publish(1_000_000);
        let _ = latch.take();
        latch.publish(1_000_000 + 5_000); // exactly half_micros_per_frame later
        let sample = latch.take();
        assert!(sample.is_sync_frame);
        assert_eq!(sample.timestamp, 1_000_000 + 5_000 + 1_250);
    }

    #[test]
    fn debounce_holds_across_the_32_bit_wrap() {
        let latch = SyncLatch::new(10_000);
        latch.publish(u32::MAX - 500);
        let _ = latch.take();
        // Wraps past u32::MAX; still within half_micros_per_frame (5_000)
        // of the last accepted sample once sync_delay and the wrap are
        // accounted for, so this should be debounced.
        latch.publish(u32::MAX - 500 + 1_000);
        let sample = latch.take();
        assert!(!sample.is_sync_frame);
    }
}
