//! Per-channel peak tracking with hold and decay ballistics.

use std::time::{Duration, Instant};

use crate::sample::MeterFloat;
use crate::scale::{db_to_gain, DEFAULT_MINUS_INFINITY_DB};

/// Default rate at which a displayed level falls back, in decibels per second.
/// Equals 20 dB in 1.7 seconds.
pub const DEFAULT_RETURN_RATE_DB_PER_SECOND: f64 = 11.7;

/// Tracks a level over time, making sure the reported value never falls
/// faster than a configured number of decibels per second. Ideal to ease
/// level meters.
///
/// A tracker accumulates incoming samples through [`PeakValue::update_level`]
/// and commits them on the next read. Reads advance an internal monotonic
/// clock: a tracker never decays on its own, only
/// [`PeakValue::next_level`] (or [`PeakValue::next_level_after`]) moves time
/// forward. Each instance is owned by a single thread; the meter machinery
/// keeps every tracker on the presentation side.
///
/// A "peak" needle and a "peak hold" marker are the same algorithm configured
/// with different hold times.
#[derive(Debug, Clone)]
pub struct PeakValue<T> {
    return_rate_db_per_second: T,
    minus_infinity_db: T,
    highest_level: T,
    returning_level: T,
    peak_hold_time: Duration,
    peak_hold_time_left: Duration,
    previous_time: Option<Instant>,
}

impl<T: MeterFloat> Default for PeakValue<T> {
    fn default() -> Self {
        Self::new(T::from_f64(DEFAULT_MINUS_INFINITY_DB))
    }
}

impl<T: MeterFloat> PeakValue<T> {
    /// Creates a tracker with the given minus-infinity floor, the default
    /// return rate and no hold time.
    pub fn new(minus_infinity_db: T) -> Self {
        Self {
            return_rate_db_per_second: T::from_f64(DEFAULT_RETURN_RATE_DB_PER_SECOND),
            minus_infinity_db,
            highest_level: T::ZERO,
            returning_level: T::ZERO,
            peak_hold_time: Duration::ZERO,
            peak_hold_time_left: Duration::ZERO,
            previous_time: None,
        }
    }

    /// Sets the return rate in decibels per second, effective on subsequent
    /// reads.
    pub fn set_return_rate(&mut self, return_rate_db_per_second: T) {
        self.return_rate_db_per_second = return_rate_db_per_second;
    }

    /// Sets the level in decibels which equals zero gain.
    pub fn set_minus_infinity_db(&mut self, minus_infinity_db: T) {
        self.minus_infinity_db = minus_infinity_db;
    }

    /// Sets the amount of time the value is held at its highest level before
    /// it starts to decline.
    pub fn set_peak_hold_time(&mut self, peak_hold_time: Duration) {
        self.peak_hold_time = peak_hold_time;
    }

    /// Offers a new level. Only a level above the currently pending highest
    /// changes anything; a level that also exceeds the displayed value
    /// restarts the hold window. May be called many times between reads, in
    /// which case the samples aggregate to their maximum.
    pub fn update_level(&mut self, level: T) {
        if level > self.highest_level {
            self.highest_level = level;

            if self.highest_level > self.returning_level {
                self.peak_hold_time_left = self.peak_hold_time;
            }
        }
    }

    /// Returns the level to show for this point in time, measured with a
    /// monotonic system clock.
    pub fn next_level(&mut self) -> T {
        let now = Instant::now();
        let elapsed = match self.previous_time.replace(now) {
            Some(previous) => now.duration_since(previous),
            None => Duration::ZERO,
        };
        self.next_level_after(elapsed)
    }

    /// Advances the tracker by an explicit elapsed time and returns the
    /// resulting level. Useful when driving the tracker from a clock of your
    /// own; [`PeakValue::next_level`] is this with wall-clock elapsed time.
    ///
    /// The hold timer is consumed first, floored at zero. Once it has run out
    /// the displayed level declines exponentially at the configured return
    /// rate; it is never clamped, so it approaches zero asymptotically. A
    /// pending higher level then replaces the declined value immediately.
    pub fn next_level_after(&mut self, elapsed: Duration) -> T {
        let decline_db = T::from_f64(elapsed.as_secs_f64()) * self.return_rate_db_per_second;
        let decline_gain = db_to_gain(-decline_db, self.minus_infinity_db);

        self.peak_hold_time_left = self.peak_hold_time_left.saturating_sub(elapsed);
        if self.peak_hold_time_left.is_zero() {
            self.returning_level *= decline_gain;
        }

        if self.highest_level > self.returning_level {
            self.returning_level = self.highest_level;
            self.highest_level = T::ZERO;
        }

        self.returning_level
    }

    /// Resets all dynamic state to zero. The configured return rate, floor and
    /// hold time are kept.
    pub fn reset(&mut self) {
        self.highest_level = T::ZERO;
        self.returning_level = T::ZERO;
        self.peak_hold_time_left = Duration::ZERO;
        self.previous_time = None;
    }
}
