//! Numeric-equivalence checks between strategies.
//!
//! Strategies sum in different orders, so results are compared with a
//! tolerance relative to the largest magnitude in the expected vector rather
//! than element by element. That keeps a near-zero `y[j]` produced by
//! cancellation from failing a check that the vector as a whole passes.

use atax_traits::Scalar;

use crate::simd::KernelScalar;
use crate::strategy::{compute_with, Strategy};
use crate::{KernelConfig, Result};

/// Textbook two-pass ATAX: `tmp = A x`, then `y = Aᵗ tmp`, each in plain
/// index order. Returns `(tmp, y)`.
pub fn reference_atax<T: Scalar>(
    nx: usize,
    ny: usize,
    a: &[T],
    x: &[T],
) -> Result<(Vec<T>, Vec<T>)> {
    KernelConfig::new(nx, ny).validate_buffers(a.len(), x.len(), nx, ny)?;

    let mut tmp = vec![T::zero(); nx];
    for (i, t) in tmp.iter_mut().enumerate() {
        for j in 0..ny {
            *t += a[i * ny + j] * x[j];
        }
    }

    let mut y = vec![T::zero(); ny];
    for (i, &t) in tmp.iter().enumerate() {
        for j in 0..ny {
            y[j] += a[i * ny + j] * t;
        }
    }
    Ok((tmp, y))
}

/// Largest difference between two vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deviation {
    /// Largest absolute elementwise difference.
    pub max_abs: f64,
    /// `max_abs` divided by the infinity norm of the expected vector.
    pub max_rel: f64,
    /// Where `max_abs` occurs; `None` when the vectors are identical.
    pub index: Option<usize>,
}

impl Deviation {
    pub fn within(&self, tolerance: f64) -> bool {
        self.max_rel <= tolerance
    }
}

/// Compare `actual` against `expected`.
///
/// A NaN in either vector or a length mismatch counts as an infinite
/// deviation.
pub fn deviation<T: Scalar>(expected: &[T], actual: &[T]) -> Deviation {
    if expected.len() != actual.len() {
        return Deviation {
            max_abs: f64::INFINITY,
            max_rel: f64::INFINITY,
            index: Some(expected.len().min(actual.len())),
        };
    }

    let as_f64 = |v: T| v.to_f64().unwrap_or(f64::NAN);
    let norm = expected
        .iter()
        .map(|&e| as_f64(e).abs())
        .fold(0.0, f64::max);

    let mut max_abs = 0.0;
    let mut index = None;
    for (k, (&e, &a)) in expected.iter().zip(actual).enumerate() {
        let mut diff = (as_f64(a) - as_f64(e)).abs();
        if diff.is_nan() {
            diff = f64::INFINITY;
        }
        if diff > max_abs {
            max_abs = diff;
            index = Some(k);
        }
    }

    let max_rel = if max_abs == 0.0 {
        0.0
    } else {
        max_abs / norm.max(f64::MIN_POSITIVE)
    };
    Deviation {
        max_abs,
        max_rel,
        index,
    }
}

/// Outcome of one strategy in [`compare_strategies`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyReport {
    pub strategy: Strategy,
    pub tmp: Deviation,
    pub y: Deviation,
}

impl StrategyReport {
    pub fn within(&self, tolerance: f64) -> bool {
        self.tmp.within(tolerance) && self.y.within(tolerance)
    }
}

/// Run every strategy in `strategies` on fresh NaN-filled `tmp`/`y` and
/// measure it against [`Strategy::Sequential`] on the same input.
pub fn compare_strategies<T, I>(
    config: &KernelConfig,
    a: &[T],
    x: &[T],
    strategies: I,
) -> Result<Vec<StrategyReport>>
where
    T: KernelScalar,
    I: IntoIterator<Item = Strategy>,
{
    let (nx, ny) = (config.nx, config.ny);
    let mut tmp_ref = vec![T::nan(); nx];
    let mut y_ref = vec![T::nan(); ny];
    compute_with(config, a, x, &mut tmp_ref, &mut y_ref, Strategy::Sequential)?;

    let mut reports = Vec::new();
    for strategy in strategies {
        let mut tmp = vec![T::nan(); nx];
        let mut y = vec![T::nan(); ny];
        compute_with(config, a, x, &mut tmp, &mut y, strategy)?;

        let report = StrategyReport {
            strategy,
            tmp: deviation(&tmp_ref, &tmp),
            y: deviation(&y_ref, &y),
        };
        log::debug!(
            "{strategy}: tmp rel {:.3e}, y rel {:.3e}",
            report.tmp.max_rel,
            report.y.max_rel
        );
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_reference_small() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let (tmp, y) = reference_atax(3, 2, &a, &[1.0, 1.0]).unwrap();
        assert_eq!(tmp, vec![3.0, 7.0, 11.0]);
        assert_eq!(y, vec![79.0, 100.0]);
    }

    #[test]
    fn test_reference_rejects_bad_shape() {
        assert!(reference_atax(2, 2, &[1.0f64; 3], &[1.0; 2]).is_err());
    }

    #[test]
    fn test_deviation_identical() {
        let d = deviation(&[1.0f64, -2.0], &[1.0, -2.0]);
        assert_eq!(d.max_abs, 0.0);
        assert_eq!(d.index, None);
        assert!(d.within(0.0));
    }

    #[test]
    fn test_deviation_scaled_by_norm() {
        // The tiny entry is off by 100% of itself but 1e-10 of the vector.
        let d = deviation(&[1e6f64, 1e-4], &[1e6, 2e-4]);
        assert_eq!(d.index, Some(1));
        assert!(d.within(1e-9));
        assert!(!d.within(1e-11));
    }

    #[test]
    fn test_deviation_nan_is_infinite() {
        let d = deviation(&[1.0f64, 2.0], &[1.0, f64::NAN]);
        assert!(d.max_abs.is_infinite());
        assert_eq!(d.index, Some(1));
        assert!(!d.within(1e9));
    }

    #[test]
    fn test_deviation_length_mismatch() {
        let d = deviation(&[1.0f32, 2.0], &[1.0]);
        assert!(!d.within(f64::MAX));
    }

    #[test]
    fn test_compare_race_free() {
        let (nx, ny) = (40, 33);
        let mut rng = StdRng::seed_from_u64(7);
        let a: Vec<f64> = (0..nx * ny).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let x: Vec<f64> = (0..ny).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let config = KernelConfig::new(nx, ny).with_min_task_len(16);

        let reports = compare_strategies(&config, &a, &x, Strategy::race_free()).unwrap();
        assert_eq!(reports.len(), 7);
        for report in reports {
            assert!(report.within(<f64 as Scalar>::RELATIVE_TOLERANCE), "{report:?}");
        }
    }
}
