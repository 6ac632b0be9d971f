//! Shared periodic drive for any number of level meters.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::meter::MeterInner;
use crate::subscription::{SubscriberList, Subscription};

/// Default refresh rate for meter ticks.
pub const DEFAULT_REFRESH_RATE_HZ: u32 = 30;

/// A registry which drives the ticks of all attached meters together, keeping
/// their displayed values in step.
///
/// The ticker does not own a timer: an external scheduler on the presentation
/// thread polls [`MeterTicker::is_running`] and calls [`MeterTicker::tick`] at
/// [`MeterTicker::interval`], never concurrently with itself. The ticker
/// reports running from the moment the first meter attaches; once a tick
/// finds no live meters left it reports stopped again.
pub struct MeterTicker {
    meters: SubscriberList<MeterInner>,
    refresh_rate_hz: u32,
    running: Cell<bool>,
}

impl Default for MeterTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterTicker {
    /// Creates a ticker at the default refresh rate.
    pub fn new() -> Self {
        Self::with_refresh_rate(DEFAULT_REFRESH_RATE_HZ)
    }

    /// Creates a ticker at the given refresh rate.
    pub fn with_refresh_rate(refresh_rate_hz: u32) -> Self {
        Self {
            meters: SubscriberList::new(),
            refresh_rate_hz: refresh_rate_hz.max(1),
            running: Cell::new(false),
        }
    }

    pub(crate) fn attach(&self, meter: &Rc<RefCell<MeterInner>>) -> Subscription {
        // Mark ourselves running when the first meter attaches.
        if self.meters.is_empty() && !self.running.get() {
            self.running.set(true);
            log::debug!(refresh_rate_hz = self.refresh_rate_hz; "Meter ticker started");
        }
        self.meters.subscribe(meter)
    }

    /// Ticks every attached meter once, in attachment order.
    pub fn tick(&self) {
        if self.meters.is_empty() && self.running.get() {
            self.running.set(false);
            log::debug!("Meter ticker stopped");
        }

        self.meters.call(|meter| meter.tick());
    }

    /// Whether the external scheduler should keep invoking
    /// [`MeterTicker::tick`].
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// The interval between ticks the external scheduler should aim for.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.refresh_rate_hz))
    }

    /// The configured refresh rate.
    pub fn refresh_rate_hz(&self) -> u32 {
        self.refresh_rate_hz
    }

    /// Number of currently attached meters.
    pub fn num_meters(&self) -> usize {
        self.meters.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::levels::ChannelLevels;
    use crate::meter::{LevelMeter, Measurement};
    use crate::scale::Scale;
    use std::cell::RefCell;
    use std::sync::Arc;

    #[test]
    fn test_interval_from_refresh_rate() {
        assert_eq!(Duration::from_millis(33), MeterTicker::new().interval());
        assert_eq!(
            Duration::from_millis(10),
            MeterTicker::with_refresh_rate(100).interval()
        );
    }

    #[test]
    fn test_runs_while_meters_attached() {
        let ticker = MeterTicker::new();
        assert!(!ticker.is_running());

        let (mut meter, _input) = LevelMeter::new();
        meter.attach(&ticker);
        assert!(ticker.is_running());
        assert_eq!(1, ticker.num_meters());

        ticker.tick();
        assert!(ticker.is_running());

        drop(meter);
        assert_eq!(0, ticker.num_meters());
        // The tick that finds no meters left reports stopped.
        ticker.tick();
        assert!(!ticker.is_running());
    }

    #[test]
    fn test_restarts_on_new_attachment() {
        let ticker = MeterTicker::new();
        let (mut meter, _input) = LevelMeter::new();
        meter.attach(&ticker);
        drop(meter);
        ticker.tick();
        assert!(!ticker.is_running());

        let (mut meter, _input) = LevelMeter::new();
        meter.attach(&ticker);
        assert!(ticker.is_running());
    }

    #[test]
    fn test_reattach_replaces_previous_registration() {
        let ticker = MeterTicker::new();
        let (mut meter, _input) = LevelMeter::new();
        meter.attach(&ticker);
        meter.attach(&ticker);
        assert_eq!(1, ticker.num_meters());
    }

    #[test]
    fn test_tick_drains_attached_meters() {
        let ticker = MeterTicker::new();
        let (mut meter, mut input) = LevelMeter::new();
        meter.prepare_to_play(1);
        meter.attach(&ticker);

        let levels = Rc::new(RefCell::new(ChannelLevels::new(
            Arc::new(Scale::default()),
            8,
        )));
        let _subscription = meter.subscribe(&levels);

        input.push_measurement(Measurement {
            channel_index: 0,
            peak_level: 0.5,
        });
        ticker.tick();
        assert_eq!(0.5, levels.borrow_mut().peak_value(0));
    }
}
