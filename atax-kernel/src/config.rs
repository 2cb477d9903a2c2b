//! Runtime configuration for a kernel call.
//!
//! The problem shape, tile size and worker count are ordinary runtime values
//! here; nothing about the kernel is fixed at build time except the optional
//! `parallel` and `simd` features.

use std::str::FromStr;

use crate::{AtaxError, Result};

/// Tile width (in elements) used by the tiled strategy.
///
/// 256 doubles = 2KB, which keeps one tile of the private `y` accumulator and
/// the matching slice of a row of `A` resident in L1.
pub const DEFAULT_TILE_SIZE: usize = 256;

/// Minimum number of work units (matrix elements) a fork-join leaf should
/// process before it is worth splitting further.
pub const DEFAULT_MIN_TASK_LEN: usize = 1 << 12;

/// Default memory budget of the emulated accelerator.
pub const DEFAULT_DEVICE_MEMORY: usize = 1 << 30;

/// Shape and execution parameters for one `compute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Rows of `A` (length of `tmp`).
    pub nx: usize,
    /// Columns of `A` (length of `x` and `y`).
    pub ny: usize,
    /// Column tile width for [`crate::Strategy::Tiled`].
    pub tile_size: usize,
    /// Dedicated worker count; `None` uses the ambient rayon pool. A
    /// dedicated pool is built for each call.
    pub num_threads: Option<usize>,
    /// Work units below which a parallel region stays on one thread.
    pub min_task_len: usize,
    /// Parameters of the emulated accelerator used by the offload strategy.
    pub device: DeviceConfig,
}

impl KernelConfig {
    pub fn new(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            tile_size: DEFAULT_TILE_SIZE,
            num_threads: None,
            min_task_len: DEFAULT_MIN_TASK_LEN,
            device: DeviceConfig::default(),
        }
    }

    /// Defaults overridden by `ATAX_TILE_SIZE`, `ATAX_NUM_THREADS`,
    /// `ATAX_MIN_TASK_LEN` and `ATAX_DEVICE_MEMORY` when they parse.
    pub fn from_env(nx: usize, ny: usize) -> Self {
        let mut config = Self::new(nx, ny);
        if let Some(tile) = env_override("ATAX_TILE_SIZE") {
            config.tile_size = tile;
        }
        if let Some(threads) = env_override("ATAX_NUM_THREADS") {
            config.num_threads = Some(threads);
        }
        if let Some(len) = env_override("ATAX_MIN_TASK_LEN") {
            config.min_task_len = len;
        }
        if let Some(bytes) = env_override("ATAX_DEVICE_MEMORY") {
            config.device.memory_bytes = bytes;
        }
        config
    }

    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_min_task_len(mut self, min_task_len: usize) -> Self {
        self.min_task_len = min_task_len;
        self
    }

    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Number of elements of `A` (`nx * ny`).
    pub fn matrix_len(&self) -> Result<usize> {
        self.nx
            .checked_mul(self.ny)
            .ok_or(AtaxError::DimensionOverflow {
                nx: self.nx,
                ny: self.ny,
            })
    }

    /// Check the configuration itself, independent of any buffers.
    pub fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(AtaxError::ZeroDimension {
                nx: self.nx,
                ny: self.ny,
            });
        }
        self.matrix_len()?;
        if self.tile_size == 0 {
            return Err(AtaxError::InvalidTileSize(self.tile_size));
        }
        if self.num_threads == Some(0) {
            return Err(AtaxError::InvalidThreadCount(0));
        }
        Ok(())
    }

    /// Check the configuration and the four buffer lengths against it.
    pub fn validate_buffers(&self, a: usize, x: usize, tmp: usize, y: usize) -> Result<()> {
        self.validate()?;
        let expected = [
            ("A", self.matrix_len()?, a),
            ("x", self.ny, x),
            ("tmp", self.nx, tmp),
            ("y", self.ny, y),
        ];
        for (buffer, expected, got) in expected {
            if expected != got {
                return Err(AtaxError::LengthMismatch {
                    buffer,
                    expected,
                    got,
                });
            }
        }
        Ok(())
    }
}

/// Shape of the emulated accelerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Number of teams, i.e. workers in the device pool.
    pub teams: usize,
    /// Work items each team splits its share into.
    pub threads_per_team: usize,
    /// Bytes of device memory available for mapped buffers.
    pub memory_bytes: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let teams = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            teams,
            threads_per_team: 1,
            memory_bytes: DEFAULT_DEVICE_MEMORY,
        }
    }
}

impl DeviceConfig {
    pub fn with_memory_bytes(mut self, memory_bytes: usize) -> Self {
        self.memory_bytes = memory_bytes;
        self
    }

    pub fn with_teams(mut self, teams: usize, threads_per_team: usize) -> Self {
        self.teams = teams;
        self.threads_per_team = threads_per_team;
        self
    }
}

fn env_override<V: FromStr>(key: &str) -> Option<V> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}
