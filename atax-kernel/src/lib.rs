//! Interchangeable execution strategies for the ATAX kernel `y = Aᵗ(Ax)`.
//!
//! `A` is a row-major `nx × ny` matrix, `x` and `y` have `ny` entries and the
//! intermediate `tmp = A x` has `nx`. Every strategy runs the same two
//! passes, pass 1 completing before pass 2 reads `tmp`, and differs only in
//! how the work is split and how concurrent updates of `y` are kept apart.
//!
//! # Strategies
//!
//! | [`Strategy`] | Kernel | How `y` is protected |
//! |---|---|---|
//! | `Sequential` | [`Sequential`] | single thread |
//! | `Parallel` | [`RacyParallel`] | not at all (updates can be lost) |
//! | `ParallelRaceFree` | [`RaceFreeParallel`] | private copy, merged under a lock |
//! | `Reduction` | [`Reduction`] | rayon `fold`/`reduce` |
//! | `Collapsed` | [`Collapsed`] | private copies over a flattened `(i, j)` range |
//! | `Vectorized` | [`Vectorized`] | private copies, SIMD rows |
//! | `Tiled` | [`Tiled`] | private copies, SIMD column tiles |
//! | `Offload` | [`OffloadKernel`] | loop order inverted on the device |
//!
//! # Example
//!
//! ```rust
//! use atax_kernel::{compute_with, KernelConfig, Strategy};
//!
//! let (nx, ny) = (4, 3);
//! let a: Vec<f64> = (0..nx * ny).map(|k| k as f64).collect();
//! let x = vec![1.0, 0.0, -1.0];
//! let mut tmp = vec![0.0; nx];
//! let mut y = vec![0.0; ny];
//!
//! let config = KernelConfig::new(nx, ny).with_num_threads(2);
//! compute_with(&config, &a, &x, &mut tmp, &mut y, Strategy::ParallelRaceFree).unwrap();
//! assert_eq!(tmp, [-2.0, -2.0, -2.0, -2.0]);
//! assert_eq!(y, [-36.0, -44.0, -52.0]);
//! ```
//!
//! # Features
//!
//! - `parallel` (default): fork-join regions run on rayon.
//! - `simd`: pulp kernels for the `f32`/`f64` dot products and axpy updates.

mod config;
mod device;
mod error;
mod offload;
mod parallel;
mod reduction;
mod sequential;
mod simd;
mod strategy;
mod threading;
mod vectorized;
pub mod verify;

// ============================================================================
// Configuration and errors
// ============================================================================
pub use config::{
    DeviceConfig, KernelConfig, DEFAULT_DEVICE_MEMORY, DEFAULT_MIN_TASK_LEN, DEFAULT_TILE_SIZE,
};
pub use error::{AtaxError, ErrorKind, Result};

// ============================================================================
// Dispatch
// ============================================================================
pub use strategy::{
    compute, compute_with, compute_with_kernel, AtaxKernel, ParseStrategyError, Strategy,
};

// ============================================================================
// Strategy kernels
// ============================================================================
pub use offload::OffloadKernel;
pub use parallel::{RaceFreeParallel, RacyParallel};
pub use reduction::{Collapsed, Reduction};
pub use sequential::Sequential;
pub use vectorized::{Tiled, Vectorized};

// ============================================================================
// Device
// ============================================================================
pub use device::{Accelerator, DeviceBuffer, HostDevice};

// ============================================================================
// Element types
// ============================================================================
pub use atax_traits::Scalar;
pub use simd::{KernelScalar, MaybeSimdOps};
