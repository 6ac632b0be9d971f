//! Prelude module for `levelflow`. Use as a star-import.

pub use crate::levels::ChannelLevels;
pub use crate::meter::{LevelMeter, Measurement, MeterInput};
pub use crate::peak::PeakValue;
pub use crate::sample::MeterFloat;
pub use crate::scale::{db_to_gain, gain_to_db, Scale, ScaleError};
pub use crate::subscription::{SubscriberList, Subscription};
pub use crate::ticker::MeterTicker;
pub use crate::Subscriber;
