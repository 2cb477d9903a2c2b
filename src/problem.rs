//! Owned problem instance: inputs, outputs and result reporting.

use std::io::{self, Write};

use atax_kernel::{
    compute_with, compute_with_kernel, AtaxKernel, KernelConfig, KernelScalar, Result, Strategy,
};

/// The four ATAX buffers for one `nx × ny` problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem<T> {
    nx: usize,
    ny: usize,
    a: Vec<T>,
    x: Vec<T>,
    tmp: Vec<T>,
    y: Vec<T>,
}

impl<T: KernelScalar> Problem<T> {
    /// The benchmark's deterministic input: `x[j] = j·π` and
    /// `A[i][j] = i·(j + 1) / nx`. `tmp` and `y` start zeroed.
    pub fn polybench(nx: usize, ny: usize) -> Result<Self> {
        let config = KernelConfig::new(nx, ny);
        config.validate()?;
        let len = config.matrix_len()?;
        let cast = |v: usize| T::from_usize(v).unwrap_or_else(T::nan);
        let pi = T::from_f64(std::f64::consts::PI).unwrap_or_else(T::nan);
        let nx_t = cast(nx);

        let x = (0..ny).map(|j| cast(j) * pi).collect();
        let mut a = Vec::with_capacity(len);
        for i in 0..nx {
            let ti = cast(i);
            a.extend((0..ny).map(|j| ti * cast(j + 1) / nx_t));
        }
        Ok(Self::zeroed(nx, ny, a, x))
    }

    /// Wrap caller-provided inputs after checking their lengths.
    pub fn from_parts(nx: usize, ny: usize, a: Vec<T>, x: Vec<T>) -> Result<Self> {
        KernelConfig::new(nx, ny).validate_buffers(a.len(), x.len(), nx, ny)?;
        Ok(Self::zeroed(nx, ny, a, x))
    }

    fn zeroed(nx: usize, ny: usize, a: Vec<T>, x: Vec<T>) -> Self {
        Self {
            nx,
            ny,
            a,
            x,
            tmp: vec![T::zero(); nx],
            y: vec![T::zero(); ny],
        }
    }

    /// Default configuration for this shape, with environment overrides.
    pub fn config(&self) -> KernelConfig {
        KernelConfig::from_env(self.nx, self.ny)
    }

    /// Run `strategy` once, overwriting `tmp` and `y`.
    ///
    /// `config` must describe the same shape as the problem.
    pub fn run(&mut self, strategy: Strategy, config: &KernelConfig) -> Result<()> {
        compute_with(config, &self.a, &self.x, &mut self.tmp, &mut self.y, strategy)
    }

    /// Run a specific kernel once, e.g. an
    /// [`OffloadKernel`](atax_kernel::OffloadKernel) over a device that
    /// outlives the call.
    pub fn run_kernel<K>(&mut self, kernel: &K, config: &KernelConfig) -> Result<()>
    where
        K: AtaxKernel<T>,
    {
        compute_with_kernel(kernel, config, &self.a, &self.x, &mut self.tmp, &mut self.y)
    }

    /// Print `y` as `%0.2f ` values, breaking the line after index 0 and
    /// every 20th index after it, followed by a final newline.
    pub fn write_output<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (i, v) in self.y.iter().enumerate() {
            write!(out, "{:.2} ", v.to_f64().unwrap_or(f64::NAN))?;
            if i % 20 == 0 {
                writeln!(out)?;
            }
        }
        writeln!(out)
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn a(&self) -> &[T] {
        &self.a
    }

    pub fn x(&self) -> &[T] {
        &self.x
    }

    pub fn tmp(&self) -> &[T] {
        &self.tmp
    }

    pub fn y(&self) -> &[T] {
        &self.y
    }
}
