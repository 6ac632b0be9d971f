//! Reusable per-subscriber channel state: peak trackers and overload flags.

use std::sync::Arc;
use std::time::Duration;

use crate::meter::Measurement;
use crate::peak::{PeakValue, DEFAULT_RETURN_RATE_DB_PER_SECOND};
use crate::scale::Scale;
use crate::ticker::DEFAULT_REFRESH_RATE_HZ;
use crate::Subscriber;

/// Level at or above which a measurement marks its channel as overloaded.
pub const DEFAULT_OVERLOAD_TRIGGER_LEVEL: f64 = 1.001;

/// Amount of time the peak hold marker stays at its highest level before
/// declining.
pub const DEFAULT_PEAK_HOLD_TIME: Duration = Duration::from_millis(2000);

/// Measurement data held for a single channel.
#[derive(Debug, Clone)]
struct ChannelData {
    peak_level: PeakValue<f64>,
    peak_hold_level: PeakValue<f64>,
    overloaded: bool,
}

/// Per-channel metering state for one subscriber.
///
/// Holds, per channel, a fast "needle" tracker whose hold time matches one
/// refresh interval, a slow peak-hold tracker with a long hold, and a sticky
/// overload flag. Feed it exclusively from a meter's drain step — it is itself
/// a [`Subscriber`], so simple consumers can register an
/// `Rc<RefCell<ChannelLevels>>` directly, while widgets typically embed one
/// and delegate.
///
/// All reads are cheap, allocation-free and presentation-thread only.
pub struct ChannelLevels {
    scale: Arc<Scale>,
    channels: Vec<ChannelData>,
    max_channels: usize,
    return_rate_db_per_second: f64,
    overload_trigger_level: f64,
    peak_hold_time: Duration,
    refresh_rate_hz: u32,
}

impl ChannelLevels {
    /// Creates channel state using the given scale, folding into a single
    /// mono channel whenever the meter is prepared for more than
    /// `max_channels` channels.
    pub fn new(scale: Arc<Scale>, max_channels: usize) -> Self {
        Self {
            scale,
            channels: Vec::new(),
            max_channels,
            return_rate_db_per_second: DEFAULT_RETURN_RATE_DB_PER_SECOND,
            overload_trigger_level: DEFAULT_OVERLOAD_TRIGGER_LEVEL,
            peak_hold_time: DEFAULT_PEAK_HOLD_TIME,
            refresh_rate_hz: DEFAULT_REFRESH_RATE_HZ,
        }
    }

    /// Rebuilds the channel array for `num_channels` channels, discarding all
    /// previous per-channel state. A channel count above the configured
    /// maximum collapses to a single channel which aggregates every incoming
    /// index.
    pub fn prepare_to_play(&mut self, num_channels: usize) {
        let num_channels = if num_channels > self.max_channels {
            // Makes update_with_measurement() fold all channels into mono.
            1
        } else {
            num_channels
        };

        let refresh_interval = Duration::from_millis(1000 / u64::from(self.refresh_rate_hz));
        self.channels.clear();
        for _ in 0..num_channels {
            let mut peak_level = PeakValue::new(self.scale.minus_infinity_db());
            peak_level.set_peak_hold_time(refresh_interval);
            peak_level.set_return_rate(self.return_rate_db_per_second);

            let mut peak_hold_level = PeakValue::new(self.scale.minus_infinity_db());
            peak_hold_level.set_peak_hold_time(self.peak_hold_time);
            peak_hold_level.set_return_rate(self.return_rate_db_per_second);

            self.channels.push(ChannelData {
                peak_level,
                peak_hold_level,
                overloaded: false,
            });
        }
    }

    /// Applies a measurement to the matching channel.
    ///
    /// An out-of-range channel index folds into channel 0 when this state was
    /// collapsed to mono; otherwise the measurement is dropped with a
    /// diagnostic, which usually means the meter was prepared with the wrong
    /// channel count.
    pub fn update_with_measurement(&mut self, measurement: &Measurement) {
        let num_channels = self.channels.len();
        let mut channel_index = measurement.channel_index;
        if channel_index >= num_channels {
            if num_channels == 1 {
                // Fold every channel into mono, aggregating all values.
                channel_index = 0;
            } else {
                log::error!(channel_index = measurement.channel_index, num_channels;
                    "Measurement for unprepared channel dropped");
                return;
            }
        }

        let channel = &mut self.channels[channel_index];
        channel.peak_level.update_level(measurement.peak_level);
        channel.peak_hold_level.update_level(measurement.peak_level);
        if measurement.peak_level >= self.overload_trigger_level {
            channel.overloaded = true;
        }
    }

    /// The current peak value for the given channel, advanced to this point
    /// in time. Returns 0.0 for an out-of-range channel.
    pub fn peak_value(&mut self, channel_index: usize) -> f64 {
        match self.channels.get_mut(channel_index) {
            Some(channel) => channel.peak_level.next_level(),
            None => 0.0,
        }
    }

    /// The current peak hold value for the given channel, advanced to this
    /// point in time. Returns 0.0 for an out-of-range channel.
    pub fn peak_hold_value(&mut self, channel_index: usize) -> f64 {
        match self.channels.get_mut(channel_index) {
            Some(channel) => channel.peak_hold_level.next_level(),
            None => 0.0,
        }
    }

    /// True if the signal on the given channel exceeded the overload trigger
    /// level at some point. Sticky until [`ChannelLevels::reset_overloaded`].
    pub fn is_overloaded(&self, channel_index: usize) -> bool {
        self.channels
            .get(channel_index)
            .is_some_and(|channel| channel.overloaded)
    }

    /// Clears the overload flag on every channel.
    pub fn reset_overloaded(&mut self) {
        for channel in &mut self.channels {
            channel.overloaded = false;
        }
    }

    /// Resets every channel to silence and clears overload flags. The channel
    /// layout and configuration are kept.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.peak_level.reset();
            channel.peak_hold_level.reset();
            channel.overloaded = false;
        }
    }

    /// The scale shared by this subscriber.
    pub fn scale(&self) -> &Arc<Scale> {
        &self.scale
    }

    /// The number of channels currently prepared.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Sets the return rate of both trackers of every channel, in decibels
    /// per second.
    pub fn set_return_rate(&mut self, return_rate_db_per_second: f64) {
        self.return_rate_db_per_second = return_rate_db_per_second;
        for channel in &mut self.channels {
            channel.peak_level.set_return_rate(return_rate_db_per_second);
            channel.peak_hold_level.set_return_rate(return_rate_db_per_second);
        }
    }

    /// Sets the level at which measurements mark a channel as overloaded.
    pub fn set_overload_trigger_level(&mut self, level: f64) {
        self.overload_trigger_level = level;
    }

    /// Sets the peak hold duration; effective on the next prepare.
    pub fn set_peak_hold_time(&mut self, peak_hold_time: Duration) {
        self.peak_hold_time = peak_hold_time;
    }

    /// Sets the refresh rate the fast tracker's hold time is derived from;
    /// effective on the next prepare.
    pub fn set_refresh_rate(&mut self, refresh_rate_hz: u32) {
        self.refresh_rate_hz = refresh_rate_hz.max(1);
    }
}

impl Subscriber for ChannelLevels {
    fn prepare_to_play(&mut self, num_channels: usize) {
        ChannelLevels::prepare_to_play(self, num_channels);
    }

    fn update_with_measurement(&mut self, measurement: &Measurement) {
        ChannelLevels::update_with_measurement(self, measurement);
    }
}
