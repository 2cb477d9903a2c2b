//! Row-parallel strategies: the racy baseline and its race-free repair.
//!
//! Both split rows of `A` across workers. Pass 1 is identical and safe since
//! each worker owns a disjoint block of `tmp`. They differ only in how pass 2
//! accumulates the shared `y`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::simd::KernelScalar;
use crate::strategy::AtaxKernel;
use crate::threading::{for_each_block, for_each_block_mut, SplitPlan};
use crate::{KernelConfig, Result};

/// Pass 1 over static row blocks: `tmp[i] = row_dot(A[i], x)`.
///
/// Returns once every block has been written (the join is the barrier
/// before pass 2).
pub(crate) fn parallel_row_dots<T: KernelScalar>(
    config: &KernelConfig,
    a: &[T],
    x: &[T],
    tmp: &mut [T],
    row_dot: fn(&[T], &[T]) -> T,
) {
    let ny = config.ny;
    let plan = SplitPlan::new(config, ny);
    for_each_block_mut(tmp, plan, &|start, block| {
        for (k, t) in block.iter_mut().enumerate() {
            let i = start + k;
            *t = row_dot(&a[i * ny..(i + 1) * ny], x);
        }
    });
}

/// Plain accumulation loop, left for the compiler to vectorize or not.
pub(crate) fn scalar_dot<T: KernelScalar>(row: &[T], x: &[T]) -> T {
    let mut acc = T::zero();
    for (&aij, &xj) in row.iter().zip(x.iter()) {
        acc += aij * xj;
    }
    acc
}

/// Rows split across workers; every worker adds its rows straight into one
/// shared `y` with no synchronisation.
///
/// The read-modify-write on `y[j]` is a load followed by a separate store, so
/// a concurrent store between them is overwritten and that contribution is
/// lost. Relaxed atomics keep this a logic race rather than undefined
/// behaviour. Results vary between runs once more than one worker is active.
#[derive(Debug, Clone, Copy, Default)]
pub struct RacyParallel;

impl<T: KernelScalar> AtaxKernel<T> for RacyParallel {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn run(
        &self,
        config: &KernelConfig,
        a: &[T],
        x: &[T],
        tmp: &mut [T],
        y: &mut [T],
    ) -> Result<()> {
        log::warn!("racy parallel strategy selected: y is not deterministic");
        let ny = config.ny;
        parallel_row_dots(config, a, x, tmp, scalar_dot);
        let tmp: &[T] = tmp;

        let shared: Vec<AtomicU64> = y
            .iter()
            .map(|&v| AtomicU64::new(v.to_raw_bits()))
            .collect();

        let plan = SplitPlan::new(config, ny);
        for_each_block(0..config.nx, plan, &|rows, _| {
            for i in rows {
                let row = &a[i * ny..(i + 1) * ny];
                let t = tmp[i];
                for (cell, &aij) in shared.iter().zip(row.iter()) {
                    let current = T::from_raw_bits(cell.load(Ordering::Relaxed));
                    cell.store((current + aij * t).to_raw_bits(), Ordering::Relaxed);
                }
            }
        });

        for (yj, cell) in y.iter_mut().zip(shared) {
            *yj = T::from_raw_bits(cell.into_inner());
        }
        Ok(())
    }
}

/// Rows split across workers; each worker accumulates into a private
/// full-length `y` and then adds it to the shared `y` inside a critical
/// section.
///
/// The merge is serialised by the lock: with `p` workers it costs
/// `p * ny` additions on a single thread at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RaceFreeParallel;

impl<T: KernelScalar> AtaxKernel<T> for RaceFreeParallel {
    fn name(&self) -> &'static str {
        "parallel-race-free"
    }

    fn run(
        &self,
        config: &KernelConfig,
        a: &[T],
        x: &[T],
        tmp: &mut [T],
        y: &mut [T],
    ) -> Result<()> {
        let ny = config.ny;
        parallel_row_dots(config, a, x, tmp, scalar_dot);
        let tmp: &[T] = tmp;

        let merged = Mutex::new(y);
        let plan = SplitPlan::new(config, ny);
        for_each_block(0..config.nx, plan, &|rows, task| {
            let mut private = vec![T::zero(); ny];
            for i in rows {
                let row = &a[i * ny..(i + 1) * ny];
                let t = tmp[i];
                for (p, &aij) in private.iter_mut().zip(row.iter()) {
                    *p += aij * t;
                }
            }

            // A panicking sibling cannot leave `y` half-merged in a way we
            // could repair, so keep merging.
            let mut y = merged.lock().unwrap_or_else(PoisonError::into_inner);
            for (yj, &p) in y.iter_mut().zip(private.iter()) {
                *yj += p;
            }
            log::trace!("task {task} merged its private y");
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::compute_with_kernel;
    use approx::assert_relative_eq;

    fn problem(nx: usize, ny: usize) -> (Vec<f64>, Vec<f64>) {
        let a = (0..nx * ny).map(|k| ((k % 17) as f64 - 8.0) * 0.125).collect();
        let x = (0..ny).map(|j| 1.0 + (j % 5) as f64 * 0.5).collect();
        (a, x)
    }

    #[test]
    fn test_row_dots_split_matches_scalar() {
        let (nx, ny) = (37, 19);
        let (a, x) = problem(nx, ny);
        let config = KernelConfig::new(nx, ny).with_min_task_len(1);
        let mut tmp = vec![f64::NAN; nx];
        parallel_row_dots(&config, &a, &x, &mut tmp, scalar_dot);
        for i in 0..nx {
            let expected = scalar_dot(&a[i * ny..(i + 1) * ny], &x);
            assert_eq!(tmp[i], expected);
        }
    }

    #[test]
    fn test_race_free_matches_sequential() {
        let (nx, ny) = (64, 40);
        let (a, x) = problem(nx, ny);
        let config = KernelConfig::new(nx, ny)
            .with_min_task_len(1)
            .with_num_threads(4);

        let mut tmp_ref = vec![0.0; nx];
        let mut y_ref = vec![0.0; ny];
        compute_with_kernel(
            &crate::Sequential,
            &config,
            &a,
            &x,
            &mut tmp_ref,
            &mut y_ref,
        )
        .unwrap();

        let mut tmp = vec![0.0; nx];
        let mut y = vec![7.0; ny];
        compute_with_kernel(&RaceFreeParallel, &config, &a, &x, &mut tmp, &mut y).unwrap();
        assert_eq!(tmp, tmp_ref);
        for (got, want) in y.iter().zip(&y_ref) {
            assert_relative_eq!(*got, *want, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_racy_single_worker_is_exact() {
        let (nx, ny) = (16, 8);
        let (a, x) = problem(nx, ny);
        let config = KernelConfig::new(nx, ny).with_num_threads(1);

        let mut tmp_ref = vec![0.0; nx];
        let mut y_ref = vec![0.0; ny];
        compute_with_kernel(
            &crate::Sequential,
            &config,
            &a,
            &x,
            &mut tmp_ref,
            &mut y_ref,
        )
        .unwrap();

        let mut tmp = vec![0.0; nx];
        let mut y = vec![0.0; ny];
        compute_with_kernel(&RacyParallel, &config, &a, &x, &mut tmp, &mut y).unwrap();
        assert_eq!(y, y_ref);
    }
}
