//! Accelerator abstraction for the offload strategy.
//!
//! An [`Accelerator`] owns a memory budget and runs data-parallel kernels
//! with one work item per output index. [`DeviceBuffer`] is the host handle
//! to a mapped allocation: it reserves device memory on creation and gives it
//! back when dropped, so every exit path of an offloaded call releases what
//! it mapped.
//!
//! [`HostDevice`] emulates a device on the host with a dedicated rayon pool
//! of `teams` workers and a byte budget; its buffers live in separate host
//! allocations, so data only reaches them through explicit copies.

use std::any::Any;
use std::fmt;
use std::mem::size_of;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use atax_traits::Scalar;

use crate::config::DeviceConfig;
use crate::threading::{for_each_block_mut, SplitPlan};
use crate::{AtaxError, Result};

/// Execution context with its own memory and work-item scheduler.
pub trait Accelerator: Sync {
    fn name(&self) -> &str;

    /// Bytes that can still be reserved.
    fn available_bytes(&self) -> usize;

    /// Reserve `bytes` of device memory or fail with
    /// [`AtaxError::AllocationFailure`] without reserving anything.
    fn reserve(&self, bytes: usize) -> Result<()>;

    /// Return `bytes` previously obtained from [`Accelerator::reserve`].
    fn release(&self, bytes: usize);

    /// Run `kernel` with one work item per element of `out`, setting
    /// `out[i] = f(i)`. Returns after every work item has finished.
    fn launch<T, F>(&self, kernel: &'static str, out: &mut [T], f: F) -> Result<()>
    where
        T: Scalar,
        F: Fn(usize) -> T + Sync;
}

/// Emulated accelerator backed by a private worker pool.
pub struct HostDevice {
    config: DeviceConfig,
    used: AtomicUsize,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl HostDevice {
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        if config.teams == 0 || config.threads_per_team == 0 {
            return Err(AtaxError::DeviceUnavailable(format!(
                "{} teams x {} threads is not a launchable grid",
                config.teams, config.threads_per_team
            )));
        }

        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.teams)
            .thread_name(|i| format!("atax-device-{i}"))
            .build()
            .map_err(|e| AtaxError::DeviceUnavailable(e.to_string()))?;

        log::debug!(
            "host device up: {} teams x {} threads, {} bytes",
            config.teams,
            config.threads_per_team,
            config.memory_bytes
        );
        Ok(Self {
            config: config.clone(),
            used: AtomicUsize::new(0),
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    /// Bytes currently reserved by live buffers.
    pub fn used_bytes(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn grid(&self) -> SplitPlan {
        SplitPlan {
            nthreads: self.config.teams.saturating_mul(self.config.threads_per_team),
            unit_cost: 1,
            min_task_len: 0,
        }
    }
}

impl Accelerator for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn available_bytes(&self) -> usize {
        self.config.memory_bytes.saturating_sub(self.used_bytes())
    }

    fn reserve(&self, bytes: usize) -> Result<()> {
        let capacity = self.config.memory_bytes;
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= capacity)
            })
            .map(|_| ())
            .map_err(|used| AtaxError::AllocationFailure {
                requested: bytes,
                available: capacity.saturating_sub(used),
            })
    }

    fn release(&self, bytes: usize) {
        let prev = self.used.fetch_sub(bytes, Ordering::AcqRel);
        debug_assert!(prev >= bytes, "released more than was reserved");
    }

    fn launch<T, F>(&self, kernel: &'static str, out: &mut [T], f: F) -> Result<()>
    where
        T: Scalar,
        F: Fn(usize) -> T + Sync,
    {
        log::debug!("launch {kernel}: {} work items", out.len());
        let grid = self.grid();
        let body = |start: usize, block: &mut [T]| {
            for (k, slot) in block.iter_mut().enumerate() {
                *slot = f(start + k);
            }
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            #[cfg(feature = "parallel")]
            {
                self.pool.install(|| for_each_block_mut(out, grid, &body));
            }
            #[cfg(not(feature = "parallel"))]
            {
                for_each_block_mut(out, grid, &body);
            }
        }));
        outcome.map_err(|payload| AtaxError::LaunchFailure {
            kernel,
            reason: panic_message(payload.as_ref()),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "work item panicked".to_string()
    }
}

/// Device-resident array of `T`, released on drop.
pub struct DeviceBuffer<'d, T: Scalar, D: Accelerator> {
    device: &'d D,
    data: Vec<T>,
    bytes: usize,
}

impl<'d, T: Scalar, D: Accelerator> DeviceBuffer<'d, T, D> {
    /// Reserve room for `len` elements. Contents are unspecified (NaN) until
    /// written by a copy or a kernel.
    pub fn alloc(device: &'d D, len: usize) -> Result<Self> {
        let bytes = len
            .checked_mul(size_of::<T>())
            .ok_or_else(|| AtaxError::AllocationFailure {
                requested: usize::MAX,
                available: device.available_bytes(),
            })?;
        device.reserve(bytes)?;
        log::debug!("{}: alloc {len} x {} ({bytes} bytes)", device.name(), T::NAME);
        Ok(Self {
            device,
            data: vec![T::nan(); len],
            bytes,
        })
    }

    /// Allocate a buffer and copy `src` into it.
    pub fn from_host(device: &'d D, src: &[T]) -> Result<Self> {
        let mut buf = Self::alloc(device, src.len())?;
        buf.copy_from_host(src)?;
        Ok(buf)
    }

    pub fn copy_from_host(&mut self, src: &[T]) -> Result<()> {
        check_len(self.data.len(), src.len())?;
        self.data.copy_from_slice(src);
        log::debug!("{}: host -> device {} bytes", self.device.name(), self.bytes);
        Ok(())
    }

    pub fn copy_to_host(&self, dst: &mut [T]) -> Result<()> {
        check_len(self.data.len(), dst.len())?;
        dst.copy_from_slice(&self.data);
        log::debug!("{}: device -> host {} bytes", self.device.name(), self.bytes);
        Ok(())
    }

    /// Run `kernel` on the owning device with this buffer as output.
    pub fn launch<F>(&mut self, kernel: &'static str, f: F) -> Result<()>
    where
        F: Fn(usize) -> T + Sync,
    {
        self.device.launch(kernel, &mut self.data, f)
    }

    /// Device-side view, for reading inside another buffer's kernel.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: Scalar, D: Accelerator> fmt::Debug for DeviceBuffer<'_, T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("device", &self.device.name())
            .field("dtype", &T::NAME)
            .field("len", &self.data.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl<T: Scalar, D: Accelerator> Drop for DeviceBuffer<'_, T, D> {
    fn drop(&mut self) {
        self.device.release(self.bytes);
        log::debug!("{}: release {} bytes", self.device.name(), self.bytes);
    }
}

fn check_len(device: usize, host: usize) -> Result<()> {
    if device == host {
        Ok(())
    } else {
        Err(AtaxError::LengthMismatch {
            buffer: "device",
            expected: device,
            got: host,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn device(memory_bytes: usize) -> HostDevice {
        let config = DeviceConfig::default()
            .with_teams(3, 2)
            .with_memory_bytes(memory_bytes);
        HostDevice::new(&config).unwrap()
    }

    #[test]
    fn test_reserve_and_release() {
        let dev = device(100);
        dev.reserve(60).unwrap();
        assert_eq!(dev.available_bytes(), 40);
        let err = dev.reserve(41).unwrap_err();
        assert!(matches!(
            err,
            AtaxError::AllocationFailure {
                requested: 41,
                available: 40
            }
        ));
        // A failed reservation takes nothing.
        assert_eq!(dev.used_bytes(), 60);
        dev.release(60);
        assert_eq!(dev.used_bytes(), 0);
    }

    #[test]
    fn test_buffer_drop_releases() {
        let dev = device(1 << 10);
        {
            let a = DeviceBuffer::<f64, _>::alloc(&dev, 16).unwrap();
            let b = DeviceBuffer::from_host(&dev, &[1.0f64, 2.0]).unwrap();
            assert_eq!(a.len(), 16);
            assert_eq!(b.as_slice(), &[1.0, 2.0]);
            assert_eq!(dev.used_bytes(), 18 * 8);
        }
        assert_eq!(dev.used_bytes(), 0);
    }

    #[test]
    fn test_alloc_is_nan_filled() {
        let dev = device(1 << 10);
        let buf = DeviceBuffer::<f32, _>::alloc(&dev, 5).unwrap();
        assert!(buf.as_slice().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_alloc_over_budget() {
        let dev = device(64);
        let err = DeviceBuffer::<f64, _>::alloc(&dev, 9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllocationFailure);
        assert_eq!(dev.used_bytes(), 0);
    }

    #[test]
    fn test_buffer_debug_omits_contents() {
        let dev = device(1 << 10);
        let buf = DeviceBuffer::<f32, _>::alloc(&dev, 3).unwrap();
        let text = format!("{buf:?}");
        assert!(text.starts_with("DeviceBuffer {"), "{text}");
        assert!(text.contains("len: 3"), "{text}");
        assert!(text.contains("bytes: 12"), "{text}");
        assert!(!text.contains("NaN"), "{text}");
    }

    #[test]
    fn test_launch_covers_every_index() {
        let dev = device(1 << 12);
        let mut buf = DeviceBuffer::<f64, _>::alloc(&dev, 101).unwrap();
        buf.launch("iota", |i| i as f64).unwrap();
        let mut host = vec![0.0; 101];
        buf.copy_to_host(&mut host).unwrap();
        assert_eq!(host, (0..101).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_launch_panic_becomes_error() {
        let dev = device(1 << 12);
        let mut buf = DeviceBuffer::<f64, _>::alloc(&dev, 8).unwrap();
        let err = buf
            .launch("boom", |i| {
                if i == 5 {
                    panic!("bad work item {i}");
                }
                0.0
            })
            .unwrap_err();
        match err {
            AtaxError::LaunchFailure { kernel, reason } => {
                assert_eq!(kernel, "boom");
                assert!(reason.contains("bad work item 5"), "{reason}");
            }
            other => panic!("unexpected error {other}"),
        }
        drop(buf);
        assert_eq!(dev.used_bytes(), 0);
    }

    #[test]
    fn test_copy_length_checked() {
        let dev = device(1 << 10);
        let buf = DeviceBuffer::<f64, _>::alloc(&dev, 4).unwrap();
        let mut host = [0.0; 3];
        let err = buf.copy_to_host(&mut host).unwrap_err();
        assert!(matches!(err, AtaxError::LengthMismatch { buffer: "device", .. }));
    }

    #[test]
    fn test_empty_grid_unavailable() {
        let config = DeviceConfig::default().with_teams(0, 1);
        let err = HostDevice::new(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
    }
}
