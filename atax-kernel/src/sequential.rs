//! Single-threaded reference strategy.

use crate::simd::KernelScalar;
use crate::strategy::AtaxKernel;
use crate::{KernelConfig, Result};

/// Row loop computing `tmp[i]` and immediately folding row `i` into `y`.
///
/// Every other strategy is checked against this one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl<T: KernelScalar> AtaxKernel<T> for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn run(
        &self,
        config: &KernelConfig,
        a: &[T],
        x: &[T],
        tmp: &mut [T],
        y: &mut [T],
    ) -> Result<()> {
        for (row, t) in a.chunks_exact(config.ny).zip(tmp.iter_mut()) {
            let mut acc = T::zero();
            for (&aij, &xj) in row.iter().zip(x.iter()) {
                acc += aij * xj;
            }
            *t = acc;

            for (yj, &aij) in y.iter_mut().zip(row.iter()) {
                *yj += aij * acc;
            }
        }
        Ok(())
    }
}
