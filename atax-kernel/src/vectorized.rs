//! SIMD strategies with static row scheduling.

use crate::parallel::parallel_row_dots;
use crate::simd::{self, add_assign, axpy, KernelScalar};
use crate::strategy::AtaxKernel;
use crate::threading::{reduce_blocks, SplitPlan};
use crate::{KernelConfig, Result};

/// Lane-parallel row kernels over contiguous row blocks.
///
/// Pass 1 is one SIMD dot product per row. Pass 2 keeps `tmp[i]` in a
/// register and streams each row into a private `y` with SIMD axpy; the
/// private copies are combined pairwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vectorized;

impl<T: KernelScalar> AtaxKernel<T> for Vectorized {
    fn name(&self) -> &'static str {
        "vectorized"
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
        parallel_row_dots(config, a, x, tmp, simd::dot);
        let tmp: &[T] = tmp;

        let partial = reduce_blocks(
            0..config.nx,
            SplitPlan::new(config, ny),
            &|rows, _| {
                let mut private = vec![T::zero(); ny];
                for i in rows {
                    axpy(&mut private, &a[i * ny..(i + 1) * ny], tmp[i]);
                }
                private
            },
            &merge,
        );
        add_assign(y, &partial);
        Ok(())
    }
}

/// [`Vectorized`] with pass 2 blocked into column tiles of
/// `config.tile_size` elements.
///
/// For each tile, every row of the block is streamed into the same slice of
/// the private accumulator, so that slice stays in cache while the rows pass
/// through it. Each `y[j]` still sees the rows in the same order, so the
/// tile size changes memory traffic, not the sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tiled;

impl<T: KernelScalar> AtaxKernel<T> for Tiled {
    fn name(&self) -> &'static str {
        "tiled"
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
        let tile = config.tile_size;
        parallel_row_dots(config, a, x, tmp, simd::dot);
        let tmp: &[T] = tmp;

        let partial = reduce_blocks(
            0..config.nx,
            SplitPlan::new(config, ny),
            &|rows, _| {
                let mut private = vec![T::zero(); ny];
                for jj in (0..ny).step_by(tile) {
                    let jmax = (jj + tile).min(ny);
                    let acc = &mut private[jj..jmax];
                    for i in rows.clone() {
                        let base = i * ny;
                        axpy(acc, &a[base + jj..base + jmax], tmp[i]);
                    }
                }
                private
            },
            &merge,
        );
        add_assign(y, &partial);
        Ok(())
    }
}

fn merge<T: KernelScalar>(mut left: Vec<T>, right: Vec<T>) -> Vec<T> {
    add_assign(&mut left, &right);
    left
}
