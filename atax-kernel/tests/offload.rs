use std::sync::atomic::{AtomicUsize, Ordering};

use atax_kernel::{
    compute_with, compute_with_kernel, Accelerator, AtaxError, DeviceConfig, ErrorKind,
    HostDevice, KernelConfig, OffloadKernel, Result, Scalar, Strategy,
};

/// Delegates to a [`HostDevice`] but refuses to run one named kernel.
struct FailingDevice {
    inner: HostDevice,
    fail_on: &'static str,
    launches: AtomicUsize,
}

impl FailingDevice {
    fn new(fail_on: &'static str) -> Self {
        Self {
            inner: HostDevice::new(&DeviceConfig::default().with_teams(2, 4)).unwrap(),
            fail_on,
            launches: AtomicUsize::new(0),
        }
    }
}

impl Accelerator for FailingDevice {
    fn name(&self) -> &str {
        "failing"
    }

    fn available_bytes(&self) -> usize {
        self.inner.available_bytes()
    }

    fn reserve(&self, bytes: usize) -> Result<()> {
        self.inner.reserve(bytes)
    }

    fn release(&self, bytes: usize) {
        self.inner.release(bytes)
    }

    fn launch<T, F>(&self, kernel: &'static str, out: &mut [T], f: F) -> Result<()>
    where
        T: Scalar,
        F: Fn(usize) -> T + Sync,
    {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if kernel == self.fail_on {
            return Err(AtaxError::LaunchFailure {
                kernel,
                reason: "injected".into(),
            });
        }
        self.inner.launch(kernel, out, f)
    }
}

fn inputs(nx: usize, ny: usize) -> (Vec<f64>, Vec<f64>) {
    let a = (0..nx * ny).map(|k| (k % 9) as f64 - 4.0).collect();
    let x = (0..ny).map(|j| (j % 4) as f64).collect();
    (a, x)
}

#[test]
fn test_launch_failure_releases_device_memory() {
    let (nx, ny) = (12, 10);
    let (a, x) = inputs(nx, ny);
    let config = KernelConfig::new(nx, ny);

    for kernel in ["atax_zero_y", "atax_tmp", "atax_y"] {
        let device = FailingDevice::new(kernel);
        let mut tmp = vec![0.0; nx];
        let mut y = vec![-7.0; ny];
        let err = compute_with_kernel(
            &OffloadKernel::new(&device),
            &config,
            &a,
            &x,
            &mut tmp,
            &mut y,
        )
        .unwrap_err();

        assert!(matches!(err, AtaxError::LaunchFailure { kernel: k, .. } if k == kernel));
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert_eq!(device.inner.used_bytes(), 0, "{kernel} leaked");
        // Nothing was copied back.
        assert_eq!(y, vec![-7.0; ny]);
    }
}

#[test]
fn test_three_kernels_per_call() {
    let (nx, ny) = (5, 6);
    let (a, x) = inputs(nx, ny);
    let config = KernelConfig::new(nx, ny);
    let device = FailingDevice::new("none");
    let kernel = OffloadKernel::new(&device);

    for call in 1..=3 {
        let mut tmp = vec![0.0; nx];
        let mut y = vec![0.0; ny];
        compute_with_kernel(&kernel, &config, &a, &x, &mut tmp, &mut y).unwrap();
        assert_eq!(device.launches.load(Ordering::SeqCst), 3 * call);
        assert_eq!(device.inner.used_bytes(), 0);
    }
}

#[test]
fn test_allocation_failure_before_any_y_write() {
    let (nx, ny) = (64, 64);
    let (a, x) = inputs(nx, ny);
    let device = DeviceConfig::default().with_memory_bytes(1024);
    let config = KernelConfig::new(nx, ny).with_device(device);

    let mut tmp = vec![0.0; nx];
    let mut y = vec![3.5; ny];
    let err = compute_with(&config, &a, &x, &mut tmp, &mut y, Strategy::Offload).unwrap_err();
    assert!(matches!(
        err,
        AtaxError::AllocationFailure {
            available: 1024,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::AllocationFailure);
    assert_eq!(y, vec![3.5; ny]);
}

#[test]
fn test_sentinel_fully_overwritten() {
    let (nx, ny) = (9, 17);
    let (a, x) = inputs(nx, ny);
    let config = KernelConfig::new(nx, ny);

    let mut tmp = vec![f64::NAN; nx];
    let mut y = vec![f64::MAX; ny];
    compute_with(&config, &a, &x, &mut tmp, &mut y, Strategy::Offload).unwrap();

    let (tmp_ref, y_ref) = atax_kernel::verify::reference_atax(nx, ny, &a, &x).unwrap();
    assert_eq!(tmp, tmp_ref);
    assert_eq!(y, y_ref);
}

#[test]
fn test_offload_f32() {
    let (nx, ny) = (7, 3);
    let a: Vec<f32> = (0..nx * ny).map(|k| k as f32).collect();
    let x = vec![1.0f32, 2.0, 3.0];
    let config = KernelConfig::new(nx, ny);
    let mut tmp = vec![0.0f32; nx];
    let mut y = vec![0.0f32; ny];
    compute_with(&config, &a, &x, &mut tmp, &mut y, Strategy::Offload).unwrap();

    let (tmp_ref, y_ref) = atax_kernel::verify::reference_atax(nx, ny, &a, &x).unwrap();
    assert_eq!(tmp, tmp_ref);
    assert_eq!(y, y_ref);
}
