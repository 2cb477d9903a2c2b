//! Scalar type bounds for the ATAX kernels.

use std::fmt::Debug;
use std::ops::AddAssign;

use num_traits::{Float, FromPrimitive};

/// Floating-point element type accepted by every ATAX strategy.
///
/// Implemented for `f32` and `f64`. Besides the arithmetic bounds, a scalar
/// must survive a lossless round trip through a `u64` bit pattern: the racy
/// strategy keeps its shared accumulator in `AtomicU64` cells.
pub trait Scalar:
    Float + FromPrimitive + AddAssign + Send + Sync + Debug + Default + 'static
{
    /// Short type name used in logs and benchmark labels.
    const NAME: &'static str;

    /// Relative tolerance for comparing two summation orders of the same
    /// reduction at this precision.
    const RELATIVE_TOLERANCE: f64;

    /// Bit pattern of `self`, zero-extended to 64 bits.
    fn to_raw_bits(self) -> u64;

    /// Inverse of [`Scalar::to_raw_bits`].
    fn from_raw_bits(bits: u64) -> Self;
}

impl Scalar for f64 {
    const NAME: &'static str = "f64";
    const RELATIVE_TOLERANCE: f64 = 1e-9;

    #[inline(always)]
    fn to_raw_bits(self) -> u64 {
        self.to_bits()
    }

    #[inline(always)]
    fn from_raw_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

impl Scalar for f32 {
    const NAME: &'static str = "f32";
    const RELATIVE_TOLERANCE: f64 = 1e-4;

    #[inline(always)]
    fn to_raw_bits(self) -> u64 {
        u64::from(self.to_bits())
    }

    #[inline(always)]
    fn from_raw_bits(bits: u64) -> Self {
        // Upper half is always zero for values produced by `to_raw_bits`.
        f32::from_bits(bits as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_scalar<T: Scalar>() {}

    #[test]
    fn test_standard_types() {
        assert_scalar::<f32>();
        assert_scalar::<f64>();
        assert_eq!(<f64 as Scalar>::NAME, "f64");
        assert_eq!(<f32 as Scalar>::NAME, "f32");
    }

    #[test]
    fn test_raw_bits_round_trip() {
        for v in [0.0f64, -0.0, 1.5, -3.25e-300, f64::MAX, f64::INFINITY] {
            let back = f64::from_raw_bits(v.to_raw_bits());
            assert_eq!(back.to_bits(), v.to_bits());
        }
        for v in [0.0f32, -0.0, 1.5, -3.25e-30, f32::MAX, f32::NEG_INFINITY] {
            let bits = v.to_raw_bits();
            assert_eq!(bits >> 32, 0);
            assert_eq!(f32::from_raw_bits(bits).to_bits(), v.to_bits());
        }
    }

    #[test]
    fn test_nan_bits_survive() {
        let nan = f64::NAN;
        assert!(f64::from_raw_bits(nan.to_raw_bits()).is_nan());
        assert!(f32::from_raw_bits(f32::NAN.to_raw_bits()).is_nan());
    }

    #[test]
    fn test_tolerance_tracks_precision() {
        assert!(<f32 as Scalar>::RELATIVE_TOLERANCE > <f64 as Scalar>::RELATIVE_TOLERANCE);
        assert!(<f64 as Scalar>::RELATIVE_TOLERANCE > f64::EPSILON);
        assert!(<f32 as Scalar>::RELATIVE_TOLERANCE > f64::from(f32::EPSILON));
    }
}
