//! AVX2 8-lane f32 vector.
//!
//! `F32x8` wraps an `__m256` register with the handful of operations the
//! GEMM kernels need: loads, stores, broadcasts, fused multiply-add and a
//! prefetch hint.
//!
//! Every method is `#[inline(always)]` and carries no `target_feature`
//! attribute of its own. The methods are only ever called from functions
//! compiled with `#[target_feature(enable = "avx2", enable = "fma")]`, into
//! which they are inlined.

#[cfg(target_arch = "x86")]
use std::arch::x86::*;

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use std::fmt;

/// AVX2 memory alignment requirement in bytes.
pub(crate) const AVX_ALIGNMENT: usize = 32;

/// Number of f32 elements that fit in an AVX2 256-bit vector.
pub(crate) const LANE_COUNT: usize = 8;

/// AVX2 SIMD vector containing 8 packed f32 values.
#[derive(Copy, Clone)]
pub struct F32x8 {
    /// AVX2 256-bit vector register containing 8 packed f32 values
    pub elements: __m256,
}

impl F32x8 {
    /// Checks if a pointer is 32-byte aligned.
    #[inline(always)]
    pub fn is_aligned(ptr: *const f32) -> bool {
        (ptr as usize) % AVX_ALIGNMENT == 0
    }

    /// All lanes set to `value`.
    ///
    /// # Safety
    ///
    /// Requires AVX.
    #[inline(always)]
    pub unsafe fn splat(value: f32) -> Self {
        Self {
            elements: _mm256_set1_ps(value),
        }
    }

    /// Broadcasts the scalar at `ptr` to all lanes.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for one read. Requires AVX.
    #[inline(always)]
    pub unsafe fn broadcast(ptr: *const f32) -> Self {
        Self {
            elements: _mm256_broadcast_ss(&*ptr),
        }
    }

    /// Loads 8 elements from 32-byte aligned memory.
    ///
    /// # Safety
    ///
    /// Pointer must be 32-byte aligned and point to at least 8 valid f32 values.
    #[inline(always)]
    pub unsafe fn load_aligned(ptr: *const f32) -> Self {
        debug_assert!(Self::is_aligned(ptr));
        Self {
            elements: _mm256_load_ps(ptr),
        }
    }

    /// Loads 8 elements from unaligned memory.
    ///
    /// # Safety
    ///
    /// Pointer must point to at least 8 valid f32 values.
    #[inline(always)]
    pub unsafe fn load_unaligned(ptr: *const f32) -> Self {
        Self {
            elements: _mm256_loadu_ps(ptr),
        }
    }

    /// Picks the aligned or unaligned load based on the pointer.
    ///
    /// # Safety
    ///
    /// Pointer must point to at least 8 valid f32 values.
    #[inline(always)]
    pub unsafe fn load(ptr: *const f32) -> Self {
        debug_assert!(!ptr.is_null(), "Pointer must not be null");

        match Self::is_aligned(ptr) {
            true => Self::load_aligned(ptr),
            false => Self::load_unaligned(ptr),
        }
    }

    /// Stores all 8 lanes to unaligned memory.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for 8 writes.
    #[inline(always)]
    pub unsafe fn store_unaligned_at(&self, ptr: *mut f32) {
        _mm256_storeu_ps(ptr, self.elements)
    }

    /// Returns `self + a * b`, rounded once.
    ///
    /// # Safety
    ///
    /// Requires FMA.
    #[inline(always)]
    pub unsafe fn fmadd(&self, a: Self, b: Self) -> Self {
        Self {
            elements: _mm256_fmadd_ps(a.elements, b.elements, self.elements),
        }
    }

    /// Copies the lanes out. A plain bit reinterpretation, so no CPU
    /// feature is required.
    #[inline(always)]
    pub fn to_array(self) -> [f32; LANE_COUNT] {
        // SAFETY: `__m256` and `[f32; 8]` have the same size and every bit
        // pattern is a valid `f32`.
        unsafe { std::mem::transmute::<__m256, [f32; LANE_COUNT]>(self.elements) }
    }
}

/// Hints the cache line holding `ptr` into L1.
///
/// The pointer is never dereferenced, so it may point past the end of a
/// buffer.
///
/// # Safety
///
/// Requires SSE.
#[inline(always)]
pub unsafe fn prefetch(ptr: *const f32) {
    _mm_prefetch::<_MM_HINT_T0>(ptr.cast::<i8>());
}

impl fmt::Debug for F32x8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("F32x8").field(&self.to_array()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_avx2_fma() -> bool {
        is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
    }

    #[target_feature(enable = "avx2", enable = "fma")]
    unsafe fn fmadd_lanes(acc: &[f32; 8], a: f32, b: &[f32; 8]) -> [f32; 8] {
        let acc = F32x8::load(acc.as_ptr());
        let b = F32x8::load_unaligned(b.as_ptr());
        acc.fmadd(F32x8::splat(a), b).to_array()
    }

    #[test]
    fn test_to_array_and_debug_need_no_cpu_feature() {
        let lanes = [0.5f32, -1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let v = F32x8 {
            elements: unsafe { std::mem::transmute::<[f32; 8], __m256>(lanes) },
        };
        assert_eq!(v.to_array(), lanes);
        assert_eq!(format!("{v:?}"), format!("F32x8({lanes:?})"));
    }

    #[test]
    fn test_fmadd() {
        if !has_avx2_fma() {
            eprintln!("skipping: AVX2/FMA not available");
            return;
        }
        let acc = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let b = [1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0];
        let out = unsafe { fmadd_lanes(&acc, 2.0, &b) };
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[target_feature(enable = "avx2")]
    unsafe fn broadcast_then_store(value: f32) -> [f32; 8] {
        let mut out = [0.0f32; 8];
        F32x8::broadcast(&value).store_unaligned_at(out.as_mut_ptr());
        out
    }

    #[test]
    fn test_broadcast_store() {
        if !has_avx2_fma() {
            return;
        }
        assert_eq!(unsafe { broadcast_then_store(2.5) }, [2.5; 8]);
    }
}
