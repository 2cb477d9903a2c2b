//! Strategy selection and the single `compute` entry point.

use std::fmt;
use std::str::FromStr;

use crate::device::HostDevice;
use crate::offload::OffloadKernel;
use crate::parallel::{RaceFreeParallel, RacyParallel};
use crate::reduction::{Collapsed, Reduction};
use crate::sequential::Sequential;
use crate::simd::KernelScalar;
use crate::threading::install;
use crate::vectorized::{Tiled, Vectorized};
use crate::{KernelConfig, Result};

/// One way of executing `y = Aᵗ(Ax)`.
///
/// Implementors run pass 1 (`tmp = A x`) to completion before pass 2 reads
/// `tmp`. When [`AtaxKernel::zeroes_on_host`] is true the dispatcher has
/// already zeroed `y` and `run` only accumulates into it.
pub trait AtaxKernel<T: KernelScalar>: Sync {
    fn name(&self) -> &'static str;

    /// Whether `y` must be zero-filled on the host before `run`.
    fn zeroes_on_host(&self) -> bool {
        true
    }

    /// Execute both passes. Buffers have already been validated against `config`.
    fn run(
        &self,
        config: &KernelConfig,
        a: &[T],
        x: &[T],
        tmp: &mut [T],
        y: &mut [T],
    ) -> Result<()>;
}

/// Runtime-selectable execution strategy.
///
/// Ordered from correctness-first to performance-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Single-threaded reference.
    Sequential,
    /// Rows split across workers, all accumulating into one shared `y`
    /// without synchronisation. Output is not deterministic.
    Parallel,
    /// Private `y` per worker, merged under a lock.
    ParallelRaceFree,
    /// Private copies and merge delegated to rayon's `fold`/`reduce`.
    Reduction,
    /// The `(i, j)` space flattened into one range and reduced.
    Collapsed,
    /// SIMD row kernels with static row blocks.
    Vectorized,
    /// [`Strategy::Vectorized`] with pass 2 blocked into column tiles.
    Tiled,
    /// Copy to an accelerator, run three kernels there, copy back.
    Offload,
}

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::Sequential,
        Strategy::Parallel,
        Strategy::ParallelRaceFree,
        Strategy::Reduction,
        Strategy::Collapsed,
        Strategy::Vectorized,
        Strategy::Tiled,
        Strategy::Offload,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::Parallel => "parallel",
            Strategy::ParallelRaceFree => "parallel-race-free",
            Strategy::Reduction => "reduction",
            Strategy::Collapsed => "collapsed",
            Strategy::Vectorized => "vectorized",
            Strategy::Tiled => "tiled",
            Strategy::Offload => "offload",
        }
    }

    /// False only for [`Strategy::Parallel`], whose output may differ run to run.
    pub fn is_race_free(self) -> bool {
        !matches!(self, Strategy::Parallel)
    }

    /// Every strategy whose result is guaranteed to match the reference.
    pub fn race_free() -> impl Iterator<Item = Strategy> {
        Self::ALL.into_iter().filter(|s| s.is_race_free())
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a strategy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy `{0}`")]
pub struct ParseStrategyError(String);

impl FromStr for Strategy {
    type Err = ParseStrategyError;

    /// Accepts the kebab-case names and the historical build-flag names
    /// (`SEQUENTIAL`, `PARALLEL_NORACE`, `COLLAPSE`, `OPTIMIZED_TILING`, `TARGET`, ...).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('_', "-");
        let strategy = match norm.as_str() {
            "sequential" => Strategy::Sequential,
            "parallel" | "racy" => Strategy::Parallel,
            "parallel-race-free" | "parallel-norace" | "race-free" => Strategy::ParallelRaceFree,
            "reduction" => Strategy::Reduction,
            "collapsed" | "collapse" => Strategy::Collapsed,
            "vectorized" | "optimized" => Strategy::Vectorized,
            "tiled" | "optimized-tiling" => Strategy::Tiled,
            "offload" | "target" => Strategy::Offload,
            _ => return Err(ParseStrategyError(s.to_string())),
        };
        Ok(strategy)
    }
}

/// Compute `y = Aᵗ(Ax)` for a row-major `nx × ny` matrix with default settings.
///
/// `tmp` receives `A x`; neither `tmp` nor `y` needs to be initialised.
///
/// # Example
///
/// ```rust
/// use atax_kernel::{compute, Strategy};
///
/// // A = [[1, 2], [3, 4], [5, 6]], x = [1, 1]
/// let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
/// let x = [1.0, 1.0];
/// let mut tmp = [0.0; 3];
/// let mut y = [0.0; 2];
/// compute(3, 2, &a, &x, &mut tmp, &mut y, Strategy::Tiled).unwrap();
/// assert_eq!(tmp, [3.0, 7.0, 11.0]);
/// assert_eq!(y, [79.0, 100.0]);
/// ```
pub fn compute<T: KernelScalar>(
    nx: usize,
    ny: usize,
    a: &[T],
    x: &[T],
    tmp: &mut [T],
    y: &mut [T],
    strategy: Strategy,
) -> Result<()> {
    compute_with(&KernelConfig::new(nx, ny), a, x, tmp, y, strategy)
}

/// [`compute`] with an explicit configuration.
///
/// [`Strategy::Offload`] brings up a fresh [`HostDevice`] and its worker pool
/// on every call. To reuse one device across calls, pass an
/// [`OffloadKernel`] over it to [`compute_with_kernel`].
pub fn compute_with<T: KernelScalar>(
    config: &KernelConfig,
    a: &[T],
    x: &[T],
    tmp: &mut [T],
    y: &mut [T],
    strategy: Strategy,
) -> Result<()> {
    match strategy {
        Strategy::Sequential => compute_with_kernel(&Sequential, config, a, x, tmp, y),
        Strategy::Parallel => compute_with_kernel(&RacyParallel, config, a, x, tmp, y),
        Strategy::ParallelRaceFree => compute_with_kernel(&RaceFreeParallel, config, a, x, tmp, y),
        Strategy::Reduction => compute_with_kernel(&Reduction, config, a, x, tmp, y),
        Strategy::Collapsed => compute_with_kernel(&Collapsed, config, a, x, tmp, y),
        Strategy::Vectorized => compute_with_kernel(&Vectorized, config, a, x, tmp, y),
        Strategy::Tiled => compute_with_kernel(&Tiled, config, a, x, tmp, y),
        Strategy::Offload => {
            // Reject bad shapes before paying for a device.
            config.validate_buffers(a.len(), x.len(), tmp.len(), y.len())?;
            let device = HostDevice::new(&config.device)?;
            compute_with_kernel(&OffloadKernel::new(&device), config, a, x, tmp, y)
        }
    }
}

/// Validate buffers, then run `kernel` on the configured worker pool.
pub fn compute_with_kernel<T, K>(
    kernel: &K,
    config: &KernelConfig,
    a: &[T],
    x: &[T],
    tmp: &mut [T],
    y: &mut [T],
) -> Result<()>
where
    T: KernelScalar,
    K: AtaxKernel<T>,
{
    config.validate_buffers(a.len(), x.len(), tmp.len(), y.len())?;
    log::debug!(
        "atax {}: nx={} ny={} dtype={} threads={:?}",
        kernel.name(),
        config.nx,
        config.ny,
        T::NAME,
        config.num_threads,
    );

    install(config, || {
        if kernel.zeroes_on_host() {
            zero_fill(y);
        }
        kernel.run(config, a, x, tmp, y)
    })?
}

/// The one zero-initialisation step for `y` shared by every strategy.
#[inline]
pub(crate) fn zero_fill<T: KernelScalar>(y: &mut [T]) {
    y.fill(T::zero());
}
