//! Lane-parallel inner loops for the vectorized, tiled and offload strategies.
//!
//! With the `simd` feature, `f32`/`f64` dot products and axpy updates use
//! pulp's runtime-dispatched SIMD kernels. Otherwise the scalar loops run
//! inside [`dispatch_if_large`] so LLVM can still auto-vectorize them.

use atax_traits::Scalar;

#[inline(always)]
pub(crate) fn dispatch<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(feature = "simd")]
    {
        pulp::Arch::new().dispatch(f)
    }
    #[cfg(not(feature = "simd"))]
    {
        f()
    }
}

#[inline(always)]
pub(crate) fn dispatch_if_large<R>(len: usize, f: impl FnOnce() -> R) -> R {
    // Runtime dispatch costs more than it saves on short rows.
    if len >= 64 {
        dispatch(f)
    } else {
        f()
    }
}

/// Types that may have SIMD-accelerated dot/axpy kernels.
///
/// Default implementations report that no SIMD path exists.
pub trait MaybeSimdOps: Copy + Sized {
    fn try_simd_dot(_a: &[Self], _b: &[Self]) -> Option<Self> {
        None
    }

    /// `dst[k] += alpha * src[k]`; returns `false` if nothing was done.
    fn try_simd_axpy(_dst: &mut [Self], _src: &[Self], _alpha: Self) -> bool {
        false
    }
}

/// Element type accepted by the kernels: a [`Scalar`] with optional SIMD paths.
pub trait KernelScalar: Scalar + MaybeSimdOps {}

impl<T: Scalar + MaybeSimdOps> KernelScalar for T {}

/// `Σ_k a[k] * b[k]`.
#[inline]
pub(crate) fn dot<T: KernelScalar>(a: &[T], b: &[T]) -> T {
    debug_assert_eq!(a.len(), b.len());
    if let Some(v) = T::try_simd_dot(a, b) {
        return v;
    }
    dispatch_if_large(a.len(), || {
        let mut acc = T::zero();
        for (&l, &r) in a.iter().zip(b.iter()) {
            acc += l * r;
        }
        acc
    })
}

/// `dst[k] += alpha * src[k]`.
#[inline]
pub(crate) fn axpy<T: KernelScalar>(dst: &mut [T], src: &[T], alpha: T) {
    debug_assert_eq!(dst.len(), src.len());
    if T::try_simd_axpy(dst, src, alpha) {
        return;
    }
    dispatch_if_large(dst.len(), || {
        for (d, &s) in dst.iter_mut().zip(src.iter()) {
            *d += s * alpha;
        }
    })
}

/// `dst[k] += src[k]`, used to merge private accumulators.
#[inline]
pub(crate) fn add_assign<T: KernelScalar>(dst: &mut [T], src: &[T]) {
    debug_assert_eq!(dst.len(), src.len());
    dispatch_if_large(dst.len(), || {
        for (d, &s) in dst.iter_mut().zip(src.iter()) {
            *d += s;
        }
    })
}

#[cfg(not(feature = "simd"))]
impl MaybeSimdOps for f32 {}

#[cfg(not(feature = "simd"))]
impl MaybeSimdOps for f64 {}

#[cfg(feature = "simd")]
mod simd_impls {
    use super::MaybeSimdOps;
    use pulp::{Simd, WithSimd};

    macro_rules! impl_simd_ops {
        ($t:ty, $as_simd:ident, $as_mut_simd:ident, $splat:ident, $add:ident, $mul_add:ident, $reduce:ident) => {
            impl MaybeSimdOps for $t {
                fn try_simd_dot(a: &[$t], b: &[$t]) -> Option<$t> {
                    struct Dot<'a> {
                        a: &'a [$t],
                        b: &'a [$t],
                    }
                    impl<'a> WithSimd for Dot<'a> {
                        type Output = $t;

                        #[inline(always)]
                        fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
                            let (a_head, a_tail) = S::$as_simd(self.a);
                            let (b_head, b_tail) = S::$as_simd(self.b);

                            // Even and odd vectors feed separate accumulators.
                            let a_pairs = a_head.chunks_exact(2);
                            let b_pairs = b_head.chunks_exact(2);
                            let (a_last, b_last) = (a_pairs.remainder(), b_pairs.remainder());
                            let zero = simd.$splat(0.0);
                            let (mut even, mut odd) = (zero, zero);
                            for (pa, pb) in a_pairs.zip(b_pairs) {
                                even = simd.$mul_add(pa[0], pb[0], even);
                                odd = simd.$mul_add(pa[1], pb[1], odd);
                            }
                            for (&va, &vb) in a_last.iter().zip(b_last) {
                                even = simd.$mul_add(va, vb, even);
                            }

                            let mut sum = simd.$reduce(simd.$add(even, odd));
                            for (&x, &y) in a_tail.iter().zip(b_tail) {
                                sum += x * y;
                            }
                            sum
                        }
                    }

                    if a.len() != b.len() {
                        return None;
                    }
                    Some(pulp::Arch::new().dispatch(Dot { a, b }))
                }

                fn try_simd_axpy(dst: &mut [$t], src: &[$t], alpha: $t) -> bool {
                    struct Axpy<'a> {
                        dst: &'a mut [$t],
                        src: &'a [$t],
                        alpha: $t,
                    }
                    impl<'a> WithSimd for Axpy<'a> {
                        type Output = ();

                        #[inline(always)]
                        fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
                            let (d_head, d_tail) = S::$as_mut_simd(self.dst);
                            let (s_head, s_tail) = S::$as_simd(self.src);
                            let alpha = simd.$splat(self.alpha);
                            for (d, &s) in d_head.iter_mut().zip(s_head.iter()) {
                                *d = simd.$mul_add(s, alpha, *d);
                            }
                            for (d, &s) in d_tail.iter_mut().zip(s_tail.iter()) {
                                *d += s * self.alpha;
                            }
                        }
                    }

                    if dst.len() != src.len() {
                        return false;
                    }
                    pulp::Arch::new().dispatch(Axpy { dst, src, alpha });
                    true
                }
            }
        };
    }

    impl_simd_ops!(
        f32,
        as_simd_f32s,
        as_mut_simd_f32s,
        splat_f32s,
        add_f32s,
        mul_add_f32s,
        reduce_sum_f32s
    );
    impl_simd_ops!(
        f64,
        as_simd_f64s,
        as_mut_simd_f64s,
        splat_f64s,
        add_f64s,
        mul_add_f64s,
        reduce_sum_f64s
    );
}
