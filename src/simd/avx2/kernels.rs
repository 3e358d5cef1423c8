//! AVX2 + FMA micro-kernel.
//!
//! The kernel keeps one 8-lane accumulator per output row, so an 8×8 block
//! of C lives entirely in 8 YMM registers for the whole depth loop:
//!
//! ```text
//! for k in 0..kc:
//!     b_k = B[k][0..8]                       (one vector load)
//!     for i in 0..8:
//!         c_i += broadcast(A[i][k]) * b_k    (one FMA)
//! ```
//!
//! The depth loop is unrolled by 4 with a scalar-step remainder, and the
//! rows of A and B four to eight steps ahead are prefetched.

use crate::simd::avx2::f32x8::{prefetch, F32x8, LANE_COUNT};
use crate::simd::traits::MicroKernel;

/// Rows of C per kernel call.
pub const MR: usize = 8;
/// Columns of C per kernel call (one vector).
pub const NR: usize = LANE_COUNT;

/// Depth-loop unroll factor.
const UNROLL: usize = 4;

/// Handle to the AVX2 + FMA kernels.
///
/// Can only be obtained through [`Avx2Fma::try_new`], which checks the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Avx2Fma {
    _detected: (),
}

impl Avx2Fma {
    /// Returns a handle if the running CPU supports AVX2 and FMA.
    pub fn try_new() -> Option<Self> {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            Some(Self { _detected: () })
        } else {
            None
        }
    }
}

/// One depth step: `acc[i] += A[i][k] * B[k][..]` for all 8 rows.
#[inline(always)]
unsafe fn rank1_update(acc: &mut [F32x8; MR], a: *const f32, lda: usize, b_row: *const f32, k: usize) {
    let b = F32x8::load(b_row);
    for (i, c) in acc.iter_mut().enumerate() {
        *c = c.fmadd(F32x8::broadcast(a.add(i * lda + k)), b);
    }
}

#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn kernel_8x8(
    kc: usize,
    a: *const f32,
    lda: usize,
    b: *const f32,
    ldb: usize,
    c: *mut f32,
    ldc: usize,
) {
    let mut acc = [F32x8::splat(0.0); MR];
    for (i, row) in acc.iter_mut().enumerate() {
        *row = F32x8::load_unaligned(c.add(i * ldc));
    }

    let mut k = 0;
    while k + UNROLL <= kc {
        prefetch(b.wrapping_add((k + 8) * ldb));
        prefetch(a.wrapping_add(k + 32));

        rank1_update(&mut acc, a, lda, b.add(k * ldb), k);
        rank1_update(&mut acc, a, lda, b.add((k + 1) * ldb), k + 1);
        rank1_update(&mut acc, a, lda, b.add((k + 2) * ldb), k + 2);
        rank1_update(&mut acc, a, lda, b.add((k + 3) * ldb), k + 3);
        k += UNROLL;
    }
    while k < kc {
        rank1_update(&mut acc, a, lda, b.add(k * ldb), k);
        k += 1;
    }

    for (i, row) in acc.iter().enumerate() {
        row.store_unaligned_at(c.add(i * ldc));
    }
}

#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn axpy_avx2(alpha: f32, x: &[f32], y: &mut [f32]) {
    let len = x.len().min(y.len());
    let (x, y) = (&x[..len], &mut y[..len]);
    let a = F32x8::splat(alpha);

    let body = len - len % LANE_COUNT;
    let mut j = 0;
    while j < body {
        let yv = F32x8::load(y.as_ptr().add(j));
        let xv = F32x8::load(x.as_ptr().add(j));
        yv.fmadd(a, xv).store_unaligned_at(y.as_mut_ptr().add(j));
        j += LANE_COUNT;
    }
    for (yj, &xj) in y[body..].iter_mut().zip(&x[body..]) {
        *yj = alpha.mul_add(xj, *yj);
    }
}

impl MicroKernel for Avx2Fma {
    const MR: usize = MR;
    const NR: usize = NR;

    fn name(self) -> &'static str {
        "avx2+fma"
    }

    #[inline]
    unsafe fn kernel_packed(
        self,
        kc: usize,
        a: *const f32,
        lda: usize,
        b: *const f32,
        c: *mut f32,
        ldc: usize,
    ) {
        kernel_8x8(kc, a, lda, b, NR, c, ldc)
    }

    #[inline]
    unsafe fn kernel_strided(
        self,
        kc: usize,
        a: *const f32,
        lda: usize,
        b: *const f32,
        ldb: usize,
        c: *mut f32,
        ldc: usize,
    ) {
        debug_assert!(ldb >= NR);
        kernel_8x8(kc, a, lda, b, ldb, c, ldc)
    }

    #[inline]
    fn axpy(self, alpha: f32, x: &[f32], y: &mut [f32]) {
        // SAFETY: the handle exists only when AVX2 and FMA were detected.
        unsafe { axpy_avx2(alpha, x, y) }
    }
}
