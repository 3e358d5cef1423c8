//! Portable 8×8 micro-kernel.
//!
//! Same register-blocking scheme as the AVX2 kernel, written over
//! `[f32; 8]` lane arrays so it builds on every target. The fixed-size inner
//! loops are what the autovectorizer needs to turn each row update into
//! vector code where the target has any.

use crate::simd::traits::MicroKernel;

const MR: usize = 8;
const NR: usize = 8;
const UNROLL: usize = 4;

/// The always-available kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Portable;

#[inline(always)]
unsafe fn rank1_update(acc: &mut [[f32; NR]; MR], a: *const f32, lda: usize, b_row: *const f32, k: usize) {
    let b: [f32; NR] = std::ptr::read_unaligned(b_row.cast::<[f32; NR]>());
    for (i, row) in acc.iter_mut().enumerate() {
        let aik = *a.add(i * lda + k);
        for (c, &bj) in row.iter_mut().zip(&b) {
            *c += aik * bj;
        }
    }
}

#[allow(clippy::too_many_arguments)]
unsafe fn kernel_8x8(kc: usize, a: *const f32, lda: usize, b: *const f32, ldb: usize, c: *mut f32, ldc: usize) {
    let mut acc = [[0.0f32; NR]; MR];
    for (i, row) in acc.iter_mut().enumerate() {
        *row = std::ptr::read_unaligned(c.add(i * ldc).cast::<[f32; NR]>());
    }

    let mut k = 0;
    while k + UNROLL <= kc {
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
        std::ptr::write_unaligned(c.add(i * ldc).cast::<[f32; NR]>(), *row);
    }
}

impl MicroKernel for Portable {
    const MR: usize = MR;
    const NR: usize = NR;

    fn name(self) -> &'static str {
        "portable"
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
        for (yj, &xj) in y.iter_mut().zip(x) {
            *yj += alpha * xj;
        }
    }
}
