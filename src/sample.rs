//! Floating-point sample abstraction used by the metering algorithms.

use std::ops::{Mul, MulAssign, Neg};

/// Trait of floating-point types the metering math is generic over.
///
/// Implemented for [`f32`] and [`f64`]; measurements carried across the thread
/// boundary are always widened to `f64`.
pub trait MeterFloat:
    Copy + PartialOrd + Neg<Output = Self> + Mul<Output = Self> + MulAssign + Send + 'static
{
    /// The additive identity.
    const ZERO: Self;

    /// Lossy conversion from `f64`.
    fn from_f64(v: f64) -> Self;

    /// Widening conversion to `f64`.
    fn to_f64(self) -> f64;

    /// Absolute value.
    fn abs(self) -> Self;

    /// Maximum of `self` and `other`.
    fn max(self, other: Self) -> Self;

    /// Base-10 logarithm.
    fn log10(self) -> Self;

    /// `self` raised to the power `exponent`.
    fn powf(self, exponent: Self) -> Self;
}

#[duplicate::duplicate_item(
    ty;
    [f32];
    [f64];
)]
impl MeterFloat for ty {
    const ZERO: Self = 0.0;

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as ty
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn abs(self) -> Self {
        ty::abs(self)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        ty::max(self, other)
    }

    #[inline]
    fn log10(self) -> Self {
        ty::log10(self)
    }

    #[inline]
    fn powf(self, exponent: Self) -> Self {
        ty::powf(self, exponent)
    }
}
