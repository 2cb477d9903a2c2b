//! Offloaded ATAX: copy in, three device kernels, copy out.

use crate::device::{Accelerator, DeviceBuffer};
use crate::simd::{self, KernelScalar};
use crate::strategy::AtaxKernel;
use crate::{KernelConfig, Result};

/// Runs the computation on an [`Accelerator`].
///
/// `A` and `x` are copied to the device once; `tmp` and `y` are allocated
/// there. The device then runs `atax_zero_y`, `atax_tmp` (one work item per
/// row) and `atax_y`, where the loop order is inverted so each work item
/// owns one `y[j]` and sums down column `j`. Both results are copied back,
/// after which every device buffer is released, including when a copy or
/// launch fails.
///
/// `y` is zeroed on the device, so an allocation failure on the way in
/// leaves the host `y` untouched.
pub struct OffloadKernel<'d, D: Accelerator> {
    device: &'d D,
}

impl<'d, D: Accelerator> OffloadKernel<'d, D> {
    pub fn new(device: &'d D) -> Self {
        Self { device }
    }
}

impl<T: KernelScalar, D: Accelerator> AtaxKernel<T> for OffloadKernel<'_, D> {
    fn name(&self) -> &'static str {
        "offload"
    }

    fn zeroes_on_host(&self) -> bool {
        false
    }

    fn run(
        &self,
        config: &KernelConfig,
        a: &[T],
        x: &[T],
        tmp: &mut [T],
        y: &mut [T],
    ) -> Result<()> {
        let (nx, ny) = (config.nx, config.ny);
        log::debug!(
            "offload to {}: {} bytes available",
            self.device.name(),
            self.device.available_bytes()
        );

        let d_a = DeviceBuffer::from_host(self.device, a)?;
        let d_x = DeviceBuffer::from_host(self.device, x)?;
        let mut d_tmp = DeviceBuffer::alloc(self.device, nx)?;
        let mut d_y = DeviceBuffer::alloc(self.device, ny)?;

        d_y.launch("atax_zero_y", |_| T::zero())?;

        let (da, dx) = (d_a.as_slice(), d_x.as_slice());
        d_tmp.launch("atax_tmp", |i| simd::dot(&da[i * ny..(i + 1) * ny], dx))?;

        let dt = d_tmp.as_slice();
        d_y.launch("atax_y", |j| {
            let mut acc = T::zero();
            for (i, &t) in dt.iter().enumerate() {
                acc += da[i * ny + j] * t;
            }
            acc
        })?;

        d_tmp.copy_to_host(tmp)?;
        d_y.copy_to_host(y)
    }
}
