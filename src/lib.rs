#![warn(missing_docs)]
//! Cross-thread audio level metering.
//!
//! A [`meter::LevelMeter`] is fed per-block peak measurements from a real-time
//! audio thread through its paired [`meter::MeterInput`] handle, and fans them
//! out to registered [`Subscriber`]s on the presentation thread whenever its
//! tick runs. The transport between the two threads is a bounded lock-free
//! ring buffer: producing never blocks or allocates, and a full ring drops the
//! newest measurement rather than stall the audio callback.
//!
//! Subscribers usually embed a [`levels::ChannelLevels`], which keeps a pair
//! of decaying [`peak::PeakValue`] trackers and a sticky overload flag per
//! channel, and map the resulting linear gains onto a display range with a
//! [`scale::Scale`].

pub mod levels;
pub mod meter;
pub mod peak;
pub mod prelude;
pub mod sample;
pub mod scale;
pub mod subscription;
pub mod ticker;

use crate::meter::Measurement;

/// Capability set of a level meter listener.
///
/// All methods run on the presentation thread, driven by the owning meter's
/// tick. Implementations typically delegate the bookkeeping to an embedded
/// [`levels::ChannelLevels`] and use [`Subscriber::measurement_updates_finished`]
/// to schedule a single repaint per tick.
pub trait Subscriber {
    /// Called when the meter is (re)configured for `num_channels` channels.
    /// Any per-channel state must be rebuilt for the new layout.
    fn prepare_to_play(&mut self, num_channels: usize);

    /// Called once per drained measurement, in FIFO order.
    fn update_with_measurement(&mut self, measurement: &Measurement);

    /// Called exactly once per tick after the measurement queue has been
    /// drained, including ticks that drained nothing.
    fn measurement_updates_finished(&mut self) {}
}
