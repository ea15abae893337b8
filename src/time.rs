//! Frame clock: wrap-safe scheduling of frame boundaries over a free-running
//! 32-bit microsecond counter.
//!
//! Both the Master and the Slave keep a `frame_time_end`: the microsecond
//! value at which the current frame ends. Because the counter wraps at
//! 2^32, a frame that straddles the wrap is an "overflow frame", and the
//! comparison against `now` has to be biased by 2^31 on both sides to stay
//! unambiguous while the wrap is in flight.

use crate::sync::SyncSample;

/// Microseconds elapsed since some arbitrary, monotonically increasing
/// epoch. Wraps at 2^32, as the hardware counters this stands in for do.
pub type Micros = u32;

const OVERFLOW_BIAS: u32 = 1 << 31;

/// The Master-side frame clock.
///
/// Advances strictly by `micros_per_frame` each frame; the Slave variant,
/// [`SlaveFrameClock`], additionally nudges this by an observed drift.
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    micros_per_frame: u32,
    frame_time_end: Micros,
    is_overflow_frame: bool,
}

impl FrameClock {
    /// Creates a new frame clock, starting its first frame at `now`.
    pub fn new(micros_per_frame: u32, now: Micros) -> Self {
        let frame_time_end = now.wrapping_add(micros_per_frame);
        FrameClock {
            micros_per_frame,
            frame_time_end,
            is_overflow_frame: frame_time_end < now,
        }
    }

    /// The configured frame period, in microseconds.
    pub fn micros_per_frame(&self) -> u32 {
        self.micros_per_frame
    }

    /// The microsecond value at which the current frame ends.
    pub fn frame_time_end(&self) -> Micros {
        self.frame_time_end
    }

    /// Moves the frame boundary forward by one `micros_per_frame` step.
    pub fn advance(&mut self) {
        let new_end = self.frame_time_end.wrapping_add(self.micros_per_frame);
        self.is_overflow_frame = new_end < self.frame_time_end;
        self.frame_time_end = new_end;
    }

    /// Returns true, and advances to the next frame, if `now` has reached
    /// the current frame boundary.
    pub fn is_frame_ready(&mut self, now: Micros) -> bool {
        let (now, end) = self.biased_comparison(now);
        if now >= end {
            self.advance();
            true
        } else {
            false
        }
    }

    fn biased_comparison(&self, now: Micros) -> (u32, u32) {
        if self.is_overflow_frame {
            (
                now.wrapping_sub(OVERFLOW_BIAS),
                self.frame_time_end.wrapping_sub(OVERFLOW_BIAS),
            )
        } else {
            (now, self.frame_time_end)
        }
    }
}

/// Whether the Slave's frame clock adjusts `micros_per_frame` itself in
/// response to persistent drift, or holds it fixed.
///
/// The first revision of the link this crate is modelled on never adjusts
/// the frame period; a later revision nudges it by one microsecond per
/// correction. Both behaviours are preserved here, selected at
/// construction time; `Fixed` is the default.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DriftAdaptation {
    /// `micros_per_frame` never changes after construction.
    Fixed,
    /// `micros_per_frame` is nudged by +/-1us toward the observed period
    /// every time a drift correction is applied.
    Adaptive,
}

impl Default for DriftAdaptation {
    fn default() -> Self {
        DriftAdaptation::Fixed
    }
}

/// The Slave-side frame clock.
///
/// In addition to the Master's wrap-safe advance, this consumes
/// [`SyncSample`]s published by the receive-interrupt handler and nudges
/// `frame_time_end` toward the Master's actual transmit boundary.
#[derive(Clone, Copy, Debug)]
pub struct SlaveFrameClock {
    inner: FrameClock,
    drift_adaptation: DriftAdaptation,
    min_overflow_protection: u32,
    max_overflow_protection: u32,
    total_adjusted_drift: i64,
}

impl SlaveFrameClock {
    /// Creates a new Slave frame clock.
    pub fn new(micros_per_frame: u32, now: Micros, drift_adaptation: DriftAdaptation) -> Self {
        let guard_band = micros_per_frame.saturating_mul(3);
        SlaveFrameClock {
            inner: FrameClock::new(micros_per_frame, now),
            drift_adaptation,
            min_overflow_protection: guard_band,
            max_overflow_protection: u32::MAX.wrapping_sub(guard_band),
            total_adjusted_drift: 0,
        }
    }

    /// The configured frame period, in microseconds. May change over time
    /// under [`DriftAdaptation::Adaptive`].
    pub fn micros_per_frame(&self) -> u32 {
        self.inner.micros_per_frame
    }

    /// The microsecond value at which the current frame ends.
    pub fn frame_time_end(&self) -> Micros {
        self.inner.frame_time_end
    }

    /// The running sum of signs of every drift correction applied so far.
    /// Useful for diagnosing a persistent fast/slow Master without exposing
    /// the raw per-frame drift.
    pub fn total_adjusted_drift(&self) -> i64 {
        self.total_adjusted_drift
    }

    /// Advances the frame boundary, applying a drift correction from
    /// `sample` if one is pending.
    ///
    /// Mirrors [`FrameClock::advance`] when `sample.is_sync_frame` is
    /// false. When true, the observed interrupt timestamp is used to pull
    /// `frame_time_end` toward the Master's actual transmission instant,
    /// unless the timestamp falls in the wrap-guard band, in which case the
    /// correction is skipped for this frame (see
    /// [`SlaveFrameClock::in_guard_band`]).
    pub fn advance(&mut self, sample: SyncSample) {
        if !sample.is_sync_frame {
            self.inner.advance();
            return;
        }

        if self.in_guard_band(sample.timestamp) {
            self.inner.advance();
            return;
        }

        let frame_time_end = self.inner.frame_time_end;
        let micros_per_frame = self.inner.micros_per_frame;

        let diff_a = (sample.timestamp as i64) - (frame_time_end as i64);
        let diff_b = diff_a + micros_per_frame as i64;
        let drift = if diff_a.abs() < diff_b.abs() { diff_a } else { diff_b };

        let new_end = (frame_time_end as i64) + (micros_per_frame as i64) + drift;
        let new_end = new_end.rem_euclid(1i64 << 32) as u32;
        self.inner.is_overflow_frame = new_end < frame_time_end;
        self.inner.frame_time_end = new_end;

        // The original treats an exact-zero drift as positive (`drift < 0 ?
        // -1 : 1`), not as a no-op; preserved here rather than read as a
        // three-way sign.
        if drift < 0 {
            self.total_adjusted_drift -= 1;
        } else {
            self.total_adjusted_drift += 1;
        }

        if self.drift_adaptation == DriftAdaptation::Adaptive {
            if drift < 0 {
                self.inner.micros_per_frame = self.inner.micros_per_frame.saturating_sub(1);
            } else {
                self.inner.micros_per_frame = self.inner.micros_per_frame.saturating_add(1);
            }
        }
    }

    /// True if `timestamp` falls within 3x `micros_per_frame` of either end
    /// of the 32-bit counter's range, where wraparound would make a drift
    /// computation unreliable.
    pub fn in_guard_band(&self, timestamp: u32) -> bool {
        timestamp > self.max_overflow_protection || timestamp < self.min_overflow_protection
    }

    /// Returns true, and advances to the next frame, if `now` has reached
    /// the current frame boundary. Does not itself apply drift; call
    /// [`SlaveFrameClock::advance`] with the latest [`SyncSample`] first.
    pub fn is_frame_ready(&mut self, now: Micros, sample: SyncSample) -> bool {
        let (biased_now, biased_end) = if self.inner.is_overflow_frame {
            (now.wrapping_sub(OVERFLOW_BIAS), self.inner.frame_time_end.wrapping_sub(OVERFLOW_BIAS))
        } else {
            (now, self.inner.frame_time_end)
        };

        if biased_now >= biased_end {
            self.advance(sample);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_ready_fires_once_per_boundary() {
        let mut clock = FrameClock::new(10_000, 0);
        // First boundary is at 10_000.
        assert!(!clock.is_frame_ready(9_999));
        assert!(clock.is_frame_ready(10_000));
        assert!(!clock.is_frame_ready(10_000));
    }

    #[test]
    fn frame_wraps_past_u32_max() {
        // S2: frame_rate = 100 -> micros_per_frame = 10_000.
        let mut clock = FrameClock::new(10_000, 0xFFFF_F000 - 10_000);
        assert!(clock.is_frame_ready(0xFFFF_F000));
        assert!(clock.is_overflow_frame);
        assert_eq!(clock.frame_time_end(), 0x0000_0000);
        assert!(clock.is_frame_ready(0x0000_0000));
    }

    #[test]
    fn drift_correction_picks_smaller_magnitude_candidate() {
        // S3.
        let mut clock = SlaveFrameClock::new(10_000, 0, DriftAdaptation::Fixed);
        clock.inner.frame_time_end = 1_000_000;
        clock.inner.is_overflow_frame = false;

        clock.advance(SyncSample { timestamp: 999_800, is_sync_frame: true });

        assert_eq!(clock.frame_time_end(), 1_009_800);
    }

    #[test]
    fn exact_zero_drift_still_counts_as_a_positive_correction() {
        // The original accumulates `totalAdjustedDrift += (drift < 0) ? -1 : 1`,
        // so a dead-on-time interrupt (drift == 0) still counts as +1, not
        // as a no-op.
        let mut clock = SlaveFrameClock::new(10_000, 0, DriftAdaptation::Fixed);
        clock.inner.frame_time_end = 1_000_000;
        clock.inner.is_overflow_frame = false;

        clock.advance(SyncSample { timestamp: 1_000_000, is_sync_frame: true });

        assert_eq!(clock.total_adjusted_drift(), 1);
    }

    #[test]
    fn guard_band_suppresses_drift_near_wrap() {
        let mut clock = SlaveFrameClock::new(10_000, 0, DriftAdaptation::Fixed);
        assert!(clock.in_guard_band(10_000));
        assert!(clock.in_guard_band(u32::MAX - 10_000));
        assert!(!clock.in_guard_band(40_000));
    }

    #[test]
    fn adaptive_mode_nudges_micros_per_frame() {
        let mut clock = SlaveFrameClock::new(10_000, 0, DriftAdaptation::Adaptive);
        clock.inner.frame_time_end = 1_000_000;
        clock.inner.is_overflow_frame = false;

        clock.advance(SyncSample { timestamp: 999_800, is_sync_frame: true });
        assert_eq!(clock.micros_per_frame(), 9_999);
    }

    #[test]
    fn fixed_mode_leaves_micros_per_frame_untouched() {
        let mut clock = SlaveFrameClock::new(10_000, 0, DriftAdaptation::Fixed);
        clock.inner.frame_time_end = 1_000_000;
        clock.inner.is_overflow_frame = false;

        clock.advance(SyncSample { timestamp: 999_800, is_sync_frame: true });
        assert_eq!(clock.micros_per_frame(), 10_000);
    }
}
