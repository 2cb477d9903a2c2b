//! Reduction-based strategies.
//!
//! [`Reduction`] hands private-copy creation and merging to rayon's
//! `fold`/`reduce`; [`Collapsed`] flattens the `(i, j)` iteration space into
//! one range so work is split by matrix element rather than by row.

use std::ops::Range;

use crate::parallel::scalar_dot;
use crate::simd::{add_assign, KernelScalar};
use crate::strategy::AtaxKernel;
use crate::threading::{reduce_blocks, SplitPlan};
use crate::{KernelConfig, Result};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Row-parallel passes whose reductions are run by the thread pool.
///
/// Pass 2 folds rows into per-split `y` copies that rayon creates, zeroes and
/// merges itself; neither the number of copies nor the merge order is fixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reduction;

impl<T: KernelScalar> AtaxKernel<T> for Reduction {
    fn name(&self) -> &'static str {
        "reduction"
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
        let min_rows = (config.min_task_len / ny).max(1);

        #[cfg(feature = "parallel")]
        let partial = {
            tmp.par_iter_mut()
                .zip(a.par_chunks_exact(ny))
                .with_min_len(min_rows)
                .for_each(|(t, row)| *t = scalar_dot(row, x));
            let tmp: &[T] = tmp;

            a.par_chunks_exact(ny)
                .zip(tmp.par_iter())
                .with_min_len(min_rows)
                .fold(
                    || vec![T::zero(); ny],
                    |mut acc, (row, &t)| {
                        accumulate_row(&mut acc, row, t);
                        acc
                    },
                )
                .reduce(
                    || vec![T::zero(); ny],
                    |mut l, r| {
                        add_assign(&mut l, &r);
                        l
                    },
                )
        };

        #[cfg(not(feature = "parallel"))]
        let partial = {
            let _ = min_rows;
            for (t, row) in tmp.iter_mut().zip(a.chunks_exact(ny)) {
                *t = scalar_dot(row, x);
            }
            a.chunks_exact(ny)
                .zip(tmp.iter())
                .fold(vec![T::zero(); ny], |mut acc, (row, &t)| {
                    accumulate_row(&mut acc, row, t);
                    acc
                })
        };

        add_assign(y, &partial);
        Ok(())
    }
}

#[inline]
fn accumulate_row<T: KernelScalar>(acc: &mut [T], row: &[T], t: T) {
    for (p, &aij) in acc.iter_mut().zip(row.iter()) {
        *p += aij * t;
    }
}

/// Both passes iterate the flattened range `0..nx*ny`, split into contiguous
/// element blocks that may start and end mid-row.
///
/// Pass 1 reduces into partial row sums that are stitched together where
/// two blocks share a row; pass 2 reduces into private `y` copies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collapsed;

impl<T: KernelScalar> AtaxKernel<T> for Collapsed {
    fn name(&self) -> &'static str {
        "collapsed"
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
        let total = a.len();
        let plan = SplitPlan::new(config, 1);

        let sums = reduce_blocks(
            0..total,
            plan,
            &|flat, _| {
                let first = flat.start / ny;
                let last = (flat.end - 1) / ny;
                let mut sums = vec![T::zero(); last - first + 1];
                for seg in RowSegments::new(flat, ny) {
                    sums[seg.row - first] += scalar_dot(&a[seg.flat], &x[seg.cols]);
                }
                RowSums { first, sums }
            },
            &RowSums::stitch,
        );
        debug_assert_eq!(sums.first, 0);
        tmp.copy_from_slice(&sums.sums);
        let tmp: &[T] = tmp;

        let partial = reduce_blocks(
            0..total,
            plan,
            &|flat, _| {
                let mut private = vec![T::zero(); ny];
                for seg in RowSegments::new(flat, ny) {
                    accumulate_row(&mut private[seg.cols], &a[seg.flat], tmp[seg.row]);
                }
                private
            },
            &|mut l, r| {
                add_assign(&mut l, &r);
                l
            },
        );
        add_assign(y, &partial);
        Ok(())
    }
}

/// Partial `tmp` values for the consecutive rows `first..first + sums.len()`.
struct RowSums<T> {
    first: usize,
    sums: Vec<T>,
}

impl<T: KernelScalar> RowSums<T> {
    /// Join the sums of two adjacent blocks; a row cut by the block
    /// boundary appears in both and is added.
    fn stitch(mut left: Self, right: Self) -> Self {
        let shared_row = right.first < left.first + left.sums.len();
        let mut rest = right.sums.into_iter();
        if shared_row {
            if let (Some(slot), Some(v)) = (left.sums.last_mut(), rest.next()) {
                *slot += v;
            }
        }
        left.sums.extend(rest);
        left
    }
}

/// Piece of a flat block lying within a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RowSegment {
    row: usize,
    cols: Range<usize>,
    flat: Range<usize>,
}

/// Cuts a flat element range into per-row segments.
struct RowSegments {
    next: usize,
    end: usize,
    ny: usize,
}

impl RowSegments {
    fn new(flat: Range<usize>, ny: usize) -> Self {
        Self {
            next: flat.start,
            end: flat.end,
            ny,
        }
    }
}

impl Iterator for RowSegments {
    type Item = RowSegment;

    fn next(&mut self) -> Option<RowSegment> {
        if self.next >= self.end {
            return None;
        }
        let row = self.next / self.ny;
        let col = self.next % self.ny;
        let stop = ((row + 1) * self.ny).min(self.end);
        let seg = RowSegment {
            row,
            cols: col..col + (stop - self.next),
            flat: self.next..stop,
        };
        self.next = stop;
        Some(seg)
    }
}
