//! Decibel conversions and the piecewise-linear display scale.

use thiserror::Error;

use crate::sample::MeterFloat;

/// Default level in decibels which is treated as zero gain.
pub const DEFAULT_MINUS_INFINITY_DB: f64 = -100.0;

/// Converts a linear gain to decibels, returning `minus_infinity_db` for zero
/// or negative gains and never returning a value below it.
pub fn gain_to_db<T: MeterFloat>(gain: T, minus_infinity_db: T) -> T {
    if gain > T::ZERO {
        minus_infinity_db.max(T::from_f64(20.0) * gain.log10())
    } else {
        minus_infinity_db
    }
}

/// Converts decibels to a linear gain, returning zero at or below
/// `minus_infinity_db`.
pub fn db_to_gain<T: MeterFloat>(db: T, minus_infinity_db: T) -> T {
    if db > minus_infinity_db {
        T::from_f64(10.0).powf(db * T::from_f64(0.05))
    } else {
        T::ZERO
    }
}

/// Error raised when constructing a [`Scale`] from an invalid division table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScaleError {
    /// The division table was empty.
    #[error("a scale requires at least one division")]
    EmptyDivisions,
    /// The division table was not strictly increasing.
    #[error("scale divisions must be strictly increasing")]
    UnsortedDivisions,
}

/// A scale mapping between linear gain, decibels, and a normalized \[0, 1\]
/// display proportion.
///
/// The scale is defined by an ascending table of division points in decibels.
/// The first and last divisions map to proportions 0.0 and 1.0; every division
/// pair owns an equal-width slice of the proportion range, inside which the
/// mapping is linear in decibels. Divisions are therefore evenly spaced on a
/// drawn meter even though they are not evenly spaced in decibels.
///
/// Immutable after construction, so a single instance can be shared between a
/// meter, its scale drawing, and any sliders bound to the same range.
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    minus_infinity_db: f64,
    divisions: Vec<f64>,
}

impl Scale {
    /// Creates a scale from a minus-infinity floor and an ascending division
    /// table.
    pub fn new(
        minus_infinity_db: f64,
        divisions: impl Into<Vec<f64>>,
    ) -> Result<Self, ScaleError> {
        let divisions = divisions.into();
        if divisions.is_empty() {
            return Err(ScaleError::EmptyDivisions);
        }
        if divisions.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(ScaleError::UnsortedDivisions);
        }
        Ok(Self {
            minus_infinity_db,
            divisions,
        })
    }

    /// The division points in decibels, ascending.
    pub fn divisions(&self) -> &[f64] {
        &self.divisions
    }

    /// The configured minus-infinity floor in decibels.
    pub fn minus_infinity_db(&self) -> f64 {
        self.minus_infinity_db
    }

    /// Calculates the proportion \[0.0, 1.0\] for a linear gain, using this
    /// scale's minus-infinity floor for the decibel conversion.
    pub fn proportion_for_level(&self, level: f64) -> f64 {
        self.proportion_for_level_db(gain_to_db(level, self.minus_infinity_db))
    }

    /// Calculates the proportion \[0.0, 1.0\] for a level in decibels.
    ///
    /// Levels at or below the first division map to 0.0, at or above the last
    /// to 1.0. In between, the level is interpolated linearly within the
    /// enclosing division pair's slice of the proportion range.
    pub fn proportion_for_level_db(&self, level_db: f64) -> f64 {
        if level_db <= self.divisions[0] {
            return 0.0;
        }
        if level_db >= self.divisions[self.divisions.len() - 1] {
            return 1.0;
        }

        let proportion_per_division = 1.0 / (self.divisions.len() - 1) as f64;
        for (i, &division) in self.divisions.iter().enumerate() {
            if level_db <= division {
                // The early returns above guarantee i >= 1 here.
                let lower = self.divisions[i - 1];
                let division_proportion = (level_db - lower) / (division - lower);
                return (i - 1) as f64 * proportion_per_division
                    + proportion_per_division * division_proportion;
            }
        }

        1.0
    }

    /// Calculates the level in decibels for a proportion; the exact inverse of
    /// [`Scale::proportion_for_level_db`] within the division range.
    pub fn level_db_for_proportion(&self, proportion: f64) -> f64 {
        if proportion <= 0.0 {
            return self.divisions[0];
        }
        if proportion >= 1.0 {
            return self.divisions[self.divisions.len() - 1];
        }

        let proportion_per_division = 1.0 / (self.divisions.len() - 1) as f64;
        let index = (proportion / proportion_per_division) as usize;
        debug_assert!(index + 1 < self.divisions.len());

        let remainder = proportion - index as f64 * proportion_per_division;
        let lower = self.divisions[index];
        let span_db = self.divisions[index + 1] - lower;
        lower + (remainder / proportion_per_division) * span_db
    }
}

impl Default for Scale {
    /// The default meter scale: a −100 dB floor with divisions at
    /// −100, −80, −60, −40, −30, −24, −20, −16, −12, −9, −6, −3 and 0 dB.
    fn default() -> Self {
        Self {
            minus_infinity_db: DEFAULT_MINUS_INFINITY_DB,
            divisions: vec![
                DEFAULT_MINUS_INFINITY_DB,
                -80.0,
                -60.0,
                -40.0,
                -30.0,
                -24.0,
                -20.0,
                -16.0,
                -12.0,
                -9.0,
                -6.0,
                -3.0,
                0.0,
            ],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_gain_db_conversions() {
        assert_eq!(-100.0, gain_to_db(0.0, -100.0));
        assert_eq!(-100.0, gain_to_db(-0.5, -100.0));
        assert!(gain_to_db(1.0, -100.0).abs() < EPSILON);
        assert!((gain_to_db(0.5, -100.0) + 6.020599913279624).abs() < EPSILON);

        assert_eq!(0.0, db_to_gain(-100.0, -100.0));
        assert_eq!(0.0, db_to_gain(-120.0, -100.0));
        assert!((db_to_gain(0.0, -100.0) - 1.0).abs() < EPSILON);
        assert!((db_to_gain(-6.0, -100.0) - 0.5011872336272722).abs() < EPSILON);
    }

    #[test]
    fn test_rejects_bad_division_tables() {
        assert_eq!(Err(ScaleError::EmptyDivisions), Scale::new(-100.0, []));
        assert_eq!(
            Err(ScaleError::UnsortedDivisions),
            Scale::new(-100.0, [-60.0, -60.0, 0.0])
        );
        assert_eq!(
            Err(ScaleError::UnsortedDivisions),
            Scale::new(-100.0, [0.0, -60.0])
        );
        assert!(Scale::new(-100.0, [-100.0, 0.0]).is_ok());
    }

    #[test]
    fn test_proportion_clamps_at_extremes() {
        let scale = Scale::default();
        assert_eq!(0.0, scale.proportion_for_level_db(-100.0));
        assert_eq!(0.0, scale.proportion_for_level_db(-140.0));
        assert_eq!(1.0, scale.proportion_for_level_db(0.0));
        assert_eq!(1.0, scale.proportion_for_level_db(6.0));
    }

    #[test]
    fn test_proportion_at_divisions() {
        let scale = Scale::default();
        let count = scale.divisions().len();
        // Each division sits at its slice boundary; -6 dB is division 10 of 12
        // slices in the default table.
        for (i, &db) in scale.divisions().iter().enumerate().skip(1) {
            let expected = i as f64 / (count - 1) as f64;
            assert!(
                (scale.proportion_for_level_db(db) - expected).abs() < EPSILON,
                "division {db} dB should map to {expected}"
            );
        }
        assert!((scale.proportion_for_level_db(-6.0) - 10.0 / 12.0).abs() < EPSILON);
    }

    #[test]
    fn test_proportion_is_non_decreasing() {
        let scale = Scale::default();
        let mut previous = 0.0;
        let mut db = -110.0;
        while db <= 10.0 {
            let proportion = scale.proportion_for_level_db(db);
            assert!(
                proportion >= previous,
                "proportion decreased at {db} dB: {proportion} < {previous}"
            );
            previous = proportion;
            db += 0.25;
        }
    }

    #[test]
    fn test_round_trip_at_division_boundaries() {
        let scale = Scale::default();
        for &db in scale.divisions() {
            let proportion = scale.proportion_for_level_db(db);
            let db_back = scale.level_db_for_proportion(proportion);
            let proportion_back = scale.proportion_for_level_db(db_back);
            assert!((proportion - proportion_back).abs() < EPSILON);
            if db > scale.divisions()[0] {
                assert!((db - db_back).abs() < EPSILON, "{db} round-tripped to {db_back}");
            }
        }
    }

    #[test]
    fn test_round_trip_between_divisions() {
        let scale = Scale::default();
        for db in [-90.0, -50.0, -27.0, -13.5, -7.5, -1.0] {
            let db_back = scale.level_db_for_proportion(scale.proportion_for_level_db(db));
            assert!((db - db_back).abs() < 1e-6, "{db} round-tripped to {db_back}");
        }
    }

    #[test]
    fn test_proportion_for_linear_gain() {
        let scale = Scale::default();
        assert_eq!(0.0, scale.proportion_for_level(0.0));
        assert_eq!(1.0, scale.proportion_for_level(1.0));
        // 0.5 gain is a hair above -6.03 dB, just below the -6 dB division.
        let proportion = scale.proportion_for_level(0.5);
        assert!(proportion < 10.0 / 12.0);
        assert!(proportion > 9.0 / 12.0);
    }
}
