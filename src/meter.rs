//! The level meter hub and its real-time producer handle.

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::ArrayView2;

use crate::sample::MeterFloat;
use crate::subscription::{SubscriberList, Subscription};
use crate::ticker::MeterTicker;
use crate::Subscriber;

/// Default number of measurements the queue between the audio and the
/// presentation thread can hold.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// A unit of measurement for a specific channel.
///
/// Transient: created once per audio block per channel on the producing
/// thread, consumed once on the presentation thread, then discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Index of the measured channel.
    pub channel_index: usize,
    /// Highest absolute sample value of the block, as linear gain. Can exceed
    /// 1.0 on overload.
    pub peak_level: f64,
}

/// A level meter which can be fed measurements from a realtime audio thread
/// and be read from another (presentation) thread.
///
/// Constructing a meter yields the hub itself plus a [`MeterInput`] handle.
/// The handle moves to the audio thread and produces one [`Measurement`] per
/// channel per block; the hub stays on the presentation thread, where its
/// [`LevelMeter::tick`] drains all pending measurements and fans them out to
/// registered [`Subscriber`]s. Ticks are usually driven for all meters at once
/// by attaching to a shared [`MeterTicker`].
///
/// Subscriber callbacks must not call back into the meter that is notifying
/// them.
pub struct LevelMeter {
    inner: Rc<RefCell<MeterInner>>,
    ticker_subscription: Subscription,
}

pub(crate) struct MeterInner {
    consumer: rtrb::Consumer<Measurement>,
    subscribers: SubscriberList<dyn Subscriber>,
    num_channels: usize,
}

impl LevelMeter {
    /// Creates a meter and its producer handle with the default queue
    /// capacity.
    pub fn new() -> (Self, MeterInput) {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a meter and its producer handle with a measurement queue of
    /// the given capacity. The capacity bounds how many measurements can pile
    /// up between two ticks before new ones get dropped.
    pub fn with_capacity(capacity: usize) -> (Self, MeterInput) {
        let (producer, consumer) = rtrb::RingBuffer::new(capacity);
        let meter = Self {
            inner: Rc::new(RefCell::new(MeterInner {
                consumer,
                subscribers: SubscriberList::new(),
                num_channels: 0,
            })),
            ticker_subscription: Subscription::default(),
        };
        (meter, MeterInput { producer })
    }

    /// Prepares the meter for the given amount of channels.
    ///
    /// Idempotent: an unchanged channel count is a no-op. A changed count
    /// re-prepares every subscriber (discarding their per-channel state) and
    /// flushes measurements still queued for the previous layout.
    pub fn prepare_to_play(&mut self, num_channels: usize) {
        self.inner.borrow_mut().prepare_to_play(num_channels);
    }

    /// Registers a subscriber with this meter.
    ///
    /// The subscriber is immediately prepared with the meter's current
    /// channel count so it starts out consistent. The meter keeps only a weak
    /// reference; dropping the returned [`Subscription`] unregisters the
    /// subscriber, and remains safe after the meter itself is gone.
    pub fn subscribe<S: Subscriber + 'static>(&self, subscriber: &Rc<RefCell<S>>) -> Subscription {
        let inner = self.inner.borrow();
        subscriber.borrow_mut().prepare_to_play(inner.num_channels);
        let subscriber: Rc<RefCell<dyn Subscriber>> = subscriber.clone();
        inner.subscribers.subscribe(&subscriber)
    }

    /// Drains all queued measurements in FIFO order, fanning each out to
    /// every subscriber in registration order, then notifies every subscriber
    /// exactly once that this round of updates is finished — also when
    /// nothing was queued.
    pub fn tick(&mut self) {
        self.inner.borrow_mut().tick();
    }

    /// Attaches this meter to a shared ticker, which will drive
    /// [`LevelMeter::tick`] in place of manual calls. A previous attachment
    /// is revoked first.
    pub fn attach(&mut self, ticker: &MeterTicker) {
        self.ticker_subscription.reset();
        self.ticker_subscription = ticker.attach(&self.inner);
    }

    /// The channel count from the last prepare, zero initially.
    pub fn num_channels(&self) -> usize {
        self.inner.borrow().num_channels
    }
}

impl MeterInner {
    fn prepare_to_play(&mut self, num_channels: usize) {
        if std::mem::replace(&mut self.num_channels, num_channels) == num_channels {
            return;
        }

        log::debug!(num_channels; "Level meter prepared");
        self.subscribers.call(|s| s.prepare_to_play(num_channels));

        // Measurements are only popped here on the presentation side, so the
        // now-stale queue contents can be flushed without racing the drain.
        while self.consumer.pop().is_ok() {}
    }

    pub(crate) fn tick(&mut self) {
        while let Ok(measurement) = self.consumer.pop() {
            self.subscribers.call(|s| s.update_with_measurement(&measurement));
        }

        self.subscribers.call(|s| s.measurement_updates_finished());
    }
}

/// Real-time producer handle paired with a [`LevelMeter`].
///
/// The handle is `Send` and meant to move to the audio thread. All its
/// methods are realtime safe as long as they are called from a single thread:
/// they never block, allocate or log, and when the queue is full the
/// measurement is lost instead.
pub struct MeterInput {
    producer: rtrb::Producer<Measurement>,
}

impl MeterInput {
    /// Measures a block of audio given as one sample slice per channel and
    /// queues one measurement per channel, carrying the block's highest
    /// absolute sample value.
    pub fn measure_block<T: MeterFloat>(&mut self, channels: &[impl AsRef<[T]>]) {
        for (channel_index, samples) in channels.iter().enumerate() {
            let peak = samples
                .as_ref()
                .iter()
                .fold(T::ZERO, |peak, &sample| peak.max(sample.abs()));
            self.push_measurement(Measurement {
                channel_index,
                peak_level: peak.to_f64(),
            });
        }
    }

    /// Measures a block of audio given as a 2-D view with channels as rows
    /// and samples as columns, and queues one measurement per channel.
    pub fn measure_buffer<T: MeterFloat>(&mut self, buffer: ArrayView2<T>) {
        for (channel_index, channel) in buffer.rows().into_iter().enumerate() {
            let peak = channel
                .iter()
                .fold(T::ZERO, |peak, &sample| peak.max(sample.abs()));
            self.push_measurement(Measurement {
                channel_index,
                peak_level: peak.to_f64(),
            });
        }
    }

    /// Queues a single measurement. When the queue is full the measurement is
    /// silently dropped; stale data is worse than blocking the audio thread.
    pub fn push_measurement(&mut self, measurement: Measurement) {
        let _ = self.producer.push(measurement);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::levels::ChannelLevels;
    use crate::scale::Scale;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        prepared: Vec<usize>,
        measurements: Vec<Measurement>,
        finished: u32,
    }

    impl Subscriber for Recorder {
        fn prepare_to_play(&mut self, num_channels: usize) {
            self.prepared.push(num_channels);
        }

        fn update_with_measurement(&mut self, measurement: &Measurement) {
            self.measurements.push(*measurement);
        }

        fn measurement_updates_finished(&mut self) {
            self.finished += 1;
        }
    }

    fn recorder() -> Rc<RefCell<Recorder>> {
        Rc::new(RefCell::new(Recorder::default()))
    }

    #[test]
    fn test_block_peak_reaches_subscriber() {
        let (mut meter, mut input) = LevelMeter::new();
        meter.prepare_to_play(2);
        let levels = Rc::new(RefCell::new(ChannelLevels::new(
            Arc::new(Scale::default()),
            8,
        )));
        let _subscription = meter.subscribe(&levels);

        input.measure_block(&[&[0.5f64, -0.8, 0.25][..], &[0.1, -0.1, 0.0][..]]);
        meter.tick();

        assert_eq!(0.8, levels.borrow_mut().peak_value(0));
        assert_eq!(0.1, levels.borrow_mut().peak_value(1));
    }

    #[test]
    fn test_measure_buffer_matches_measure_block() {
        let (mut meter, mut input) = LevelMeter::new();
        meter.prepare_to_play(2);
        let recorder = recorder();
        let _subscription = meter.subscribe(&recorder);

        let frames =
            ndarray::arr2(&[[0.25f32, -0.5, 0.125], [0.0, 0.75, -0.25]]);
        input.measure_buffer(frames.view());
        meter.tick();

        let recorder = recorder.borrow();
        assert_eq!(2, recorder.measurements.len());
        assert_eq!(0, recorder.measurements[0].channel_index);
        assert_eq!(0.5, recorder.measurements[0].peak_level);
        assert_eq!(0.75, recorder.measurements[1].peak_level);
    }

    #[test]
    fn test_updates_finished_once_per_tick() {
        let (mut meter, mut input) = LevelMeter::new();
        meter.prepare_to_play(1);
        let recorder = recorder();
        let _subscription = meter.subscribe(&recorder);

        // An empty tick still notifies.
        meter.tick();
        assert_eq!(1, recorder.borrow().finished);

        // A busy tick notifies exactly once regardless of drain size.
        for _ in 0..5 {
            input.push_measurement(Measurement {
                channel_index: 0,
                peak_level: 0.5,
            });
        }
        meter.tick();
        let recorder = recorder.borrow();
        assert_eq!(5, recorder.measurements.len());
        assert_eq!(2, recorder.finished);
    }

    #[test]
    fn test_fanout_in_registration_order() {
        let (mut meter, mut input) = LevelMeter::new();
        meter.prepare_to_play(1);

        let order = Rc::new(RefCell::new(Vec::new()));
        struct Tagged(u32, Rc<RefCell<Vec<u32>>>);
        impl Subscriber for Tagged {
            fn prepare_to_play(&mut self, _num_channels: usize) {}
            fn update_with_measurement(&mut self, _measurement: &Measurement) {
                self.1.borrow_mut().push(self.0);
            }
        }

        let first = Rc::new(RefCell::new(Tagged(1, order.clone())));
        let second = Rc::new(RefCell::new(Tagged(2, order.clone())));
        let _sub_a = meter.subscribe(&first);
        let _sub_b = meter.subscribe(&second);

        input.push_measurement(Measurement {
            channel_index: 0,
            peak_level: 0.5,
        });
        meter.tick();

        assert_eq!(vec![1, 2], *order.borrow());
    }

    #[test]
    fn test_queue_overflow_drops_newest() {
        let (mut meter, mut input) = LevelMeter::with_capacity(4);
        meter.prepare_to_play(1);
        let recorder = recorder();
        let _subscription = meter.subscribe(&recorder);

        for i in 0..10 {
            input.push_measurement(Measurement {
                channel_index: 0,
                peak_level: i as f64 / 10.0,
            });
        }
        meter.tick();

        // The first four made it in FIFO order; the rest were dropped.
        let recorder = recorder.borrow();
        assert_eq!(4, recorder.measurements.len());
        assert_eq!(0.0, recorder.measurements[0].peak_level);
        assert_eq!(0.3, recorder.measurements[3].peak_level);
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let (mut meter, _input) = LevelMeter::new();
        meter.prepare_to_play(2);
        let recorder = recorder();
        let _subscription = meter.subscribe(&recorder);
        assert_eq!(vec![2], recorder.borrow().prepared);

        meter.prepare_to_play(2);
        assert_eq!(vec![2], recorder.borrow().prepared);

        meter.prepare_to_play(4);
        assert_eq!(vec![2, 4], recorder.borrow().prepared);
    }

    #[test]
    fn test_reconfiguration_flushes_stale_measurements() {
        let (mut meter, mut input) = LevelMeter::new();
        meter.prepare_to_play(2);
        let recorder = recorder();
        let _subscription = meter.subscribe(&recorder);

        input.measure_block(&[&[1.0f64][..], &[1.0][..]]);
        meter.prepare_to_play(1);
        meter.tick();

        let recorder = recorder.borrow();
        assert!(recorder.measurements.is_empty(), "stale measurements leaked");
        assert_eq!(1, recorder.finished);
    }

    #[test]
    fn test_dropped_subscription_stops_updates() {
        let (mut meter, mut input) = LevelMeter::new();
        meter.prepare_to_play(1);
        let recorder = recorder();
        let subscription = meter.subscribe(&recorder);
        drop(subscription);

        input.push_measurement(Measurement {
            channel_index: 0,
            peak_level: 0.5,
        });
        meter.tick();
        assert!(recorder.borrow().measurements.is_empty());
        assert_eq!(0, recorder.borrow().finished);
    }

    #[test]
    fn test_subscription_outliving_meter_is_safe() {
        let (meter, _input) = LevelMeter::new();
        let recorder = recorder();
        let subscription = meter.subscribe(&recorder);
        drop(meter);
        drop(subscription); // Must not panic.
    }

    #[test]
    fn test_producer_handle_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<MeterInput>();
        assert_send::<Measurement>();
    }
}
