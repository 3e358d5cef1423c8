use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::error::{allocation_error, layout_error, Result};

/// Alignment of every scratch and benchmark buffer, in bytes.
///
/// 64 bytes covers a full cache line and any vector register width the
/// kernels use, so aligned loads are always legal on packed data.
pub const BUFFER_ALIGNMENT: usize = 64;

/// An owned, zero-initialized `f32` buffer with [`BUFFER_ALIGNMENT`] alignment.
///
/// The buffer is released in `Drop`, so a worker that bails out of its tile
/// loop early (for example on an error from a later step) never leaks its
/// panels.
///
/// # Memory Safety
///
/// - Uses `std::alloc::alloc_zeroed()` for allocation and `std::alloc::dealloc()` for cleanup
/// - Contents are always initialized (zero bytes are a valid `f32`)
/// - Allocation failure is reported as an error instead of aborting
pub struct AlignedVec {
    ptr: NonNull<f32>,
    len: usize,
    layout: Layout,
}

// SAFETY: `AlignedVec` uniquely owns its allocation, like `Vec<f32>`.
unsafe impl Send for AlignedVec {}
unsafe impl Sync for AlignedVec {}

impl AlignedVec {
    /// Allocates `len` zeroed elements.
    ///
    /// # Errors
    ///
    /// - [`GemmError::LayoutError`](crate::error::GemmError::LayoutError) if the byte size overflows
    /// - [`GemmError::AllocationError`](crate::error::GemmError::AllocationError) if the allocator returns null
    pub fn zeroed(len: usize) -> Result<Self> {
        let size = len.checked_mul(mem::size_of::<f32>()).ok_or_else(|| {
            layout_error(
                usize::MAX,
                BUFFER_ALIGNMENT,
                format!("byte size of {len} f32 elements overflows usize"),
            )
        })?;

        let layout = Layout::from_size_align(size, BUFFER_ALIGNMENT)
            .map_err(|e| layout_error(size, BUFFER_ALIGNMENT, e.to_string()))?;

        if size == 0 {
            return Ok(AlignedVec {
                ptr: NonNull::dangling(),
                len: 0,
                layout,
            });
        }

        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };

        let ptr = NonNull::new(raw.cast::<f32>())
            .ok_or_else(|| allocation_error(size, BUFFER_ALIGNMENT, "aligned buffer"))?;

        Ok(AlignedVec { ptr, len, layout })
    }

    /// Number of `f32` elements.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sets every element to zero.
    pub fn fill_zero(&mut self) {
        self.fill(0.0);
    }
}

impl Drop for AlignedVec {
    fn drop(&mut self) {
        // Deallocating with a zero-sized layout is undefined behavior.
        if self.layout.size() > 0 {
            unsafe {
                dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout);
            }
        }
    }
}

impl Deref for AlignedVec {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedVec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl std::fmt::Debug for AlignedVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedVec")
            .field("len", &self.len)
            .field("align", &self.layout.align())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_is_aligned_and_zero() {
        let buf = AlignedVec::zeroed(1000).unwrap();
        assert_eq!(buf.len(), 1000);
        assert_eq!(buf.as_ptr() as usize % BUFFER_ALIGNMENT, 0);
        assert!(buf.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_empty_buffer() {
        let buf = AlignedVec::zeroed(0).unwrap();
        assert!(buf.is_empty());
        assert_eq!(&buf[..], &[] as &[f32]);
    }

    #[test]
    fn test_write_then_clear() {
        let mut buf = AlignedVec::zeroed(17).unwrap();
        for (i, x) in buf.iter_mut().enumerate() {
            *x = i as f32;
        }
        assert_eq!(buf[16], 16.0);
        buf.fill_zero();
        assert!(buf.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_overflowing_size_is_layout_error() {
        let err = AlignedVec::zeroed(usize::MAX).unwrap_err();
        assert!(matches!(err, crate::error::GemmError::LayoutError { .. }));
    }
}
