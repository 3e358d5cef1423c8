//! Non-owning row-major matrix views.
//!
//! Every compute entry point takes its operands as [`MatRef`] / [`MatMut`]. A
//! view describes `rows × cols` logical elements laid out row-major with a
//! row pitch (`stride`) that may exceed `cols`, so sub-matrices of a larger
//! buffer can be passed without copying. Only the logical region is ever read
//! or written; the padding between `cols` and `stride` is left untouched.

use ndarray::{ArrayView2, ArrayViewMut2};

use crate::error::{validation_error, GemmError, Result};

/// Minimum buffer length for a `rows × cols` view with the given stride.
fn required_len(rows: usize, cols: usize, stride: usize) -> Result<usize> {
    if stride < cols {
        return Err(validation_error(format!(
            "stride {stride} is smaller than the logical width {cols}"
        )));
    }
    if rows == 0 || cols == 0 {
        return Ok(0);
    }
    (rows - 1)
        .checked_mul(stride)
        .and_then(|n| n.checked_add(cols))
        .ok_or_else(|| {
            validation_error(format!(
                "view of {rows}x{cols} with stride {stride} overflows usize"
            ))
        })
}

fn check_len(rows: usize, cols: usize, stride: usize, len: usize) -> Result<()> {
    let needed = required_len(rows, cols, stride)?;
    if len < needed {
        return Err(validation_error(format!(
            "buffer of {len} elements is too short for a {rows}x{cols} view with stride {stride} (needs {needed})"
        )));
    }
    Ok(())
}

/// Read-only row-major view.
#[derive(Debug, Clone, Copy)]
pub struct MatRef<'a> {
    data: &'a [f32],
    rows: usize,
    cols: usize,
    stride: usize,
}

impl<'a> MatRef<'a> {
    /// Creates a view over `data` with an explicit row pitch.
    ///
    /// # Errors
    ///
    /// Returns [`GemmError::ValidationError`] when `stride < cols` or when
    /// `data` cannot hold the last logical row.
    pub fn new(data: &'a [f32], rows: usize, cols: usize, stride: usize) -> Result<Self> {
        check_len(rows, cols, stride, data.len())?;
        Ok(Self {
            data,
            rows,
            cols,
            stride,
        })
    }

    /// Creates a dense view (`stride == cols`).
    pub fn from_slice(data: &'a [f32], rows: usize, cols: usize) -> Result<Self> {
        Self::new(data, rows, cols, cols)
    }

    /// Dense view over a buffer already known to hold `rows * cols` elements.
    pub(crate) fn dense(data: &'a [f32], rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self {
            data,
            rows,
            cols,
            stride: cols,
        }
    }

    #[inline(always)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline(always)]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline(always)]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Logical elements of row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    #[inline(always)]
    pub fn row(&self, i: usize) -> &'a [f32] {
        let start = i * self.stride;
        &self.data[start..start + self.cols]
    }

    /// Element at `(i, j)`.
    #[inline(always)]
    pub fn at(&self, i: usize, j: usize) -> f32 {
        debug_assert!(i < self.rows && j < self.cols);
        self.data[i * self.stride + j]
    }

    /// The backing slice, including any stride padding.
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }
}

/// Mutable row-major view. Writes stay within the logical region.
#[derive(Debug)]
pub struct MatMut<'a> {
    data: &'a mut [f32],
    rows: usize,
    cols: usize,
    stride: usize,
}

impl<'a> MatMut<'a> {
    /// Creates a mutable view over `data` with an explicit row pitch.
    pub fn new(data: &'a mut [f32], rows: usize, cols: usize, stride: usize) -> Result<Self> {
        check_len(rows, cols, stride, data.len())?;
        Ok(Self {
            data,
            rows,
            cols,
            stride,
        })
    }

    /// Creates a dense mutable view (`stride == cols`).
    pub fn from_slice(data: &'a mut [f32], rows: usize, cols: usize) -> Result<Self> {
        Self::new(data, rows, cols, cols)
    }

    pub(crate) fn dense(data: &'a mut [f32], rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self {
            data,
            rows,
            cols,
            stride: cols,
        }
    }

    #[inline(always)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline(always)]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline(always)]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline(always)]
    pub fn row(&self, i: usize) -> &[f32] {
        let start = i * self.stride;
        &self.data[start..start + self.cols]
    }

    #[inline(always)]
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        let start = i * self.stride;
        &mut self.data[start..start + self.cols]
    }

    #[inline(always)]
    pub fn at(&self, i: usize, j: usize) -> f32 {
        debug_assert!(i < self.rows && j < self.cols);
        self.data[i * self.stride + j]
    }

    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut f32 {
        self.data.as_mut_ptr()
    }

    /// The backing slice, including any stride padding.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data[..]
    }

    /// Zeroes the logical `rows × cols` region.
    pub fn fill_zero(&mut self) {
        for i in 0..self.rows {
            self.row_mut(i).fill(0.0);
        }
    }

    /// Reborrows as a read-only view.
    pub fn rb(&self) -> MatRef<'_> {
        MatRef {
            data: &self.data[..],
            rows: self.rows,
            cols: self.cols,
            stride: self.stride,
        }
    }
}

impl<'a> TryFrom<ArrayView2<'a, f32>> for MatRef<'a> {
    type Error = GemmError;

    /// Only standard (C-contiguous) layout is accepted.
    fn try_from(view: ArrayView2<'a, f32>) -> Result<Self> {
        let (rows, cols) = view.dim();
        let data = view
            .to_slice()
            .ok_or_else(|| validation_error("ndarray view is not in standard row-major layout"))?;
        MatRef::from_slice(data, rows, cols)
    }
}

impl<'a> TryFrom<ArrayViewMut2<'a, f32>> for MatMut<'a> {
    type Error = GemmError;

    fn try_from(view: ArrayViewMut2<'a, f32>) -> Result<Self> {
        let (rows, cols) = view.dim();
        let data = view
            .into_slice()
            .ok_or_else(|| validation_error("ndarray view is not in standard row-major layout"))?;
        MatMut::from_slice(data, rows, cols)
    }
}

/// Checks that A is `m × k`, B is `k × n` and C is `m × n`.
pub fn check_shapes(
    m: usize,
    n: usize,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &MatMut<'_>,
) -> Result<()> {
    let check = |name: &str, got: (usize, usize), want: (usize, usize)| {
        if got == want {
            Ok(())
        } else {
            Err(validation_error(format!(
                "{name} is {}x{}, expected {}x{}",
                got.0, got.1, want.0, want.1
            )))
        }
    };
    check("A", (a.rows(), a.cols()), (m, k))?;
    check("B", (b.rows(), b.cols()), (k, n))?;
    check("C", (c.rows(), c.cols()), (m, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_stride_smaller_than_cols_rejected() {
        let data = vec![0.0f32; 16];
        let err = MatRef::new(&data, 2, 8, 4).unwrap_err();
        assert!(err.to_string().contains("stride 4"));
    }

    #[test]
    fn test_short_buffer_rejected() {
        // 3 rows, pitch 5, width 4 needs 2 * 5 + 4 = 14 elements
        let data = vec![0.0f32; 13];
        assert!(MatRef::new(&data, 3, 4, 5).is_err());
        let data = vec![0.0f32; 14];
        assert!(MatRef::new(&data, 3, 4, 5).is_ok());
    }

    #[test]
    fn test_empty_views() {
        let data: Vec<f32> = Vec::new();
        let view = MatRef::new(&data, 0, 7, 7).unwrap();
        assert_eq!(view.rows(), 0);
        let view = MatRef::new(&data, 7, 0, 0).unwrap();
        assert_eq!(view.cols(), 0);
    }

    #[test]
    fn test_strided_rows() {
        let data: Vec<f32> = (0..12).map(|x| x as f32).collect();
        let view = MatRef::new(&data, 3, 2, 4).unwrap();
        assert_eq!(view.row(0), &[0.0, 1.0]);
        assert_eq!(view.row(2), &[8.0, 9.0]);
        assert_eq!(view.at(1, 1), 5.0);
    }

    #[test]
    fn test_fill_zero_keeps_padding() {
        let mut data = vec![1.0f32; 8];
        let mut view = MatMut::new(&mut data, 2, 3, 4).unwrap();
        view.fill_zero();
        assert_eq!(data, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_ndarray_conversion() {
        let arr = Array2::from_shape_fn((3, 5), |(i, j)| (i * 5 + j) as f32);
        let view = MatRef::try_from(arr.view()).unwrap();
        assert_eq!((view.rows(), view.cols(), view.stride()), (3, 5, 5));
        assert_eq!(view.at(2, 4), 14.0);

        // Transposed views are not row-major.
        let t = arr.t();
        assert!(MatRef::try_from(t).is_err());
    }

    #[test]
    fn test_check_shapes() {
        let a = vec![0.0f32; 6];
        let b = vec![0.0f32; 12];
        let mut c = vec![0.0f32; 8];
        let av = MatRef::from_slice(&a, 2, 3).unwrap();
        let bv = MatRef::from_slice(&b, 3, 4).unwrap();
        let cv = MatMut::from_slice(&mut c, 2, 4).unwrap();
        assert!(check_shapes(2, 4, 3, &av, &bv, &cv).is_ok());
        let err = check_shapes(2, 4, 2, &av, &bv, &cv).unwrap_err();
        assert!(err.to_string().contains("A is 2x3"));
    }
}
