//! Strategy-selectable ATAX (`y = Aᵗ(Ax)`) kernels with benchmark setup.
//!
//! This crate re-exports the kernel API from `atax-kernel` and adds the
//! pieces needed to run the polybench ATAX benchmark around it:
//!
//! - [`Dataset`]: the standard problem sizes, selectable via `ATAX_DATASET`
//! - [`Problem`]: owned buffers, the benchmark's input initialisation and
//!   its `y` report format
//!
//! # Example
//!
//! ```rust
//! use atax_rs::{Problem, Strategy};
//!
//! let mut problem = Problem::<f64>::polybench(32, 32).unwrap();
//! let config = problem.config();
//! for strategy in Strategy::race_free() {
//!     problem.run(strategy, &config).unwrap();
//! }
//! let mut report = Vec::new();
//! problem.write_output(&mut report).unwrap();
//! assert!(!report.is_empty());
//! ```

mod dataset;
mod problem;

pub use dataset::{Dataset, ParseDatasetError};
pub use problem::Problem;

pub use atax_kernel::verify;
pub use atax_kernel::{
    compute, compute_with, compute_with_kernel, Accelerator, AtaxError, AtaxKernel, Collapsed,
    DeviceBuffer, DeviceConfig, ErrorKind, HostDevice, KernelConfig, KernelScalar, MaybeSimdOps,
    OffloadKernel, ParseStrategyError, RaceFreeParallel, RacyParallel, Reduction, Result,
    Sequential, Strategy, Tiled, Vectorized, DEFAULT_DEVICE_MEMORY, DEFAULT_MIN_TASK_LEN,
    DEFAULT_TILE_SIZE,
};
pub use atax_traits::Scalar;
