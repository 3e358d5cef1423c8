//! Panel packing.
//!
//! A panel is a dense row-major copy of one tile's depth-chunk of A or B.
//! Packing is a pure copy: the kernels read the panel with a fixed pitch
//! (`depth` for A, `cols` for B) instead of the caller's stride, and one
//! packing pass is amortized over every 8×8 block of the tile.
//!
//! Layouts:
//!
//! ```text
//! A panel (rows × depth):   dst[i * depth + k] = A[row0 + i][k0 + k]
//! B panel (depth × cols):   dst[k * cols + j]  = B[k0 + k][col0 + j]
//! ```

use crate::config::BlockConfig;
use crate::error::Result;
use crate::matrix::MatRef;
use crate::utils::AlignedVec;

/// Copies the `rows × cols` sub-block of `src` starting at `(r0, c0)` into
/// `dst` with pitch `cols`.
///
/// # Panics
///
/// Panics if the sub-block leaves `src` or `dst` is shorter than `rows * cols`.
#[inline]
pub fn pack_block(src: &MatRef<'_>, r0: usize, c0: usize, rows: usize, cols: usize, dst: &mut [f32]) {
    assert!(r0 + rows <= src.rows() && c0 + cols <= src.cols());
    assert!(dst.len() >= rows * cols);

    if cols == 0 {
        return;
    }
    for (i, out) in dst[..rows * cols].chunks_exact_mut(cols).enumerate() {
        out.copy_from_slice(&src.row(r0 + i)[c0..c0 + cols]);
    }
}

/// Packs `rows × depth` of A starting at `(row0, k0)`. Pitch is `depth`.
#[inline]
pub fn pack_a(a: &MatRef<'_>, row0: usize, k0: usize, rows: usize, depth: usize, dst: &mut [f32]) {
    pack_block(a, row0, k0, rows, depth, dst);
}

/// Packs `depth × cols` of B starting at `(k0, col0)`. Pitch is `cols`.
#[inline]
pub fn pack_b(b: &MatRef<'_>, k0: usize, col0: usize, depth: usize, cols: usize, dst: &mut [f32]) {
    pack_block(b, k0, col0, depth, cols, dst);
}

/// Thread-private scratch holding one A panel and one B panel.
///
/// Sized for the largest tile of a block configuration, allocated once per
/// worker and reused for every tile and depth-chunk that worker handles.
/// Drivers pass the configuration clamped to the problem
/// ([`BlockConfig::clamp_to`]), so oversized tiles never allocate more than
/// the matrices need.
pub struct PanelBuffer {
    a: AlignedVec,
    b: AlignedVec,
}

impl PanelBuffer {
    /// Allocates panels of `mb × kb` and `kb × nb` elements.
    ///
    /// # Errors
    ///
    /// [`GemmError::LayoutError`](crate::error::GemmError::LayoutError) if a
    /// panel size overflows, [`GemmError::AllocationError`](crate::error::GemmError::AllocationError)
    /// if the allocator refuses it.
    pub fn new(block: &BlockConfig) -> Result<Self> {
        Ok(Self {
            a: AlignedVec::zeroed(block.a_panel_len()?)?,
            b: AlignedVec::zeroed(block.b_panel_len()?)?,
        })
    }

    /// Both panels, borrowed at once.
    pub fn split_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.a, &mut self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::GemmError;
    use crate::tiling::{for_each_tile, TileGrid};

    fn source(rows: usize, cols: usize, stride: usize) -> Vec<f32> {
        (0..rows * stride).map(|x| x as f32 * 0.5 - 3.0).collect()
    }

    #[test]
    fn test_pack_a_reads_back_exactly() {
        let data = source(10, 9, 12);
        let a = MatRef::new(&data, 10, 9, 12).unwrap();
        let (rows, depth) = (4, 5);
        let mut dst = vec![f32::NAN; rows * depth];
        pack_a(&a, 3, 2, rows, depth, &mut dst);

        for i in 0..rows {
            for k in 0..depth {
                assert_eq!(
                    dst[i * depth + k].to_bits(),
                    a.at(3 + i, 2 + k).to_bits(),
                    "mismatch at ({i}, {k})"
                );
            }
        }
    }

    #[test]
    fn test_pack_b_reads_back_exactly() {
        let data = source(7, 11, 11);
        let b = MatRef::from_slice(&data, 7, 11).unwrap();
        let (depth, cols) = (3, 6);
        let mut dst = vec![0.0; depth * cols];
        pack_b(&b, 4, 5, depth, cols, &mut dst);

        for k in 0..depth {
            assert_eq!(&dst[k * cols..(k + 1) * cols], &b.row(4 + k)[5..11]);
        }
    }

    #[test]
    fn test_pack_leaves_tail_untouched() {
        let data = source(4, 4, 4);
        let a = MatRef::from_slice(&data, 4, 4).unwrap();
        let mut dst = vec![-1.0; 16];
        pack_a(&a, 0, 0, 2, 3, &mut dst);
        assert!(dst[6..].iter().all(|&x| x == -1.0));
    }

    #[test]
    fn test_panel_buffer_sizes() {
        let block = BlockConfig::new(16, 24, 8).unwrap();
        let mut panels = PanelBuffer::new(&block).unwrap();
        let (a, b) = panels.split_mut();
        assert_eq!((a.len(), b.len()), (16 * 8, 8 * 24));
        assert!(a.iter().chain(b.iter()).all(|&x| x == 0.0));
    }

    #[test]
    fn test_panel_buffer_clamped_to_problem() {
        let block = BlockConfig::new(1 << 33, 4, 1 << 33).unwrap();
        let mut panels = PanelBuffer::new(&block.clamp_to(4, 4, 4)).unwrap();
        let (a, b) = panels.split_mut();
        assert_eq!((a.len(), b.len()), (16, 16));
    }

    #[test]
    fn test_panel_buffer_overflow_is_layout_error() {
        let block = BlockConfig::new(usize::MAX, 4, usize::MAX).unwrap();
        let err = PanelBuffer::new(&block).err().unwrap();
        assert!(matches!(err, GemmError::LayoutError { .. }), "got {err}");
    }

    #[test]
    fn test_allocation_failure_reaches_caller() {
        // 2^60 elements: a valid layout no allocator can satisfy.
        let block = BlockConfig::new(1 << 30, 1, 1 << 30).unwrap();
        let err = PanelBuffer::new(&block).err().unwrap();
        assert!(matches!(err, GemmError::AllocationError { .. }), "got {err}");

        let grid = TileGrid::new(16, 16, &BlockConfig::new(8, 8, 8).unwrap());
        let visited = AtomicUsize::new(0);
        let err = for_each_tile(&grid, || PanelBuffer::new(&block), |_, _| {
            visited.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GemmError::AllocationError { .. }), "got {err}");
        assert_eq!(visited.load(Ordering::Relaxed), 0);
    }
}
