//! Scalar fallback for partial blocks.
//!
//! At the right and bottom edges of a tile the remaining block is smaller
//! than the vector kernel's 8×8. These routines perform the same update on
//! any `mr × nr` block with `mr, nr <= 8`, in plain scalar arithmetic.

/// Largest block the fallback is used for.
pub const MAX_EDGE: usize = 8;

/// `mr × nr` update with B rows tightly packed (pitch `nr`).
///
/// # Safety
///
/// - `a` readable for `(mr - 1) * lda + kc` elements
/// - `b` readable for `kc * nr` elements
/// - `c` writable for `mr` rows of `nr` elements at pitch `ldc`
#[allow(clippy::too_many_arguments)]
#[inline]
pub unsafe fn kernel_ref(
    mr: usize,
    nr: usize,
    kc: usize,
    a: *const f32,
    lda: usize,
    b: *const f32,
    c: *mut f32,
    ldc: usize,
) {
    kernel_ref_strided(mr, nr, kc, a, lda, b, nr, c, ldc)
}

/// `mr × nr` update with B rows at pitch `ldb`.
///
/// # Safety
///
/// As [`kernel_ref`], with `b` readable for `(kc - 1) * ldb + nr` elements.
#[allow(clippy::too_many_arguments)]
pub unsafe fn kernel_ref_strided(
    mr: usize,
    nr: usize,
    kc: usize,
    a: *const f32,
    lda: usize,
    b: *const f32,
    ldb: usize,
    c: *mut f32,
    ldc: usize,
) {
    debug_assert!(mr <= MAX_EDGE && nr <= MAX_EDGE);
    debug_assert!(ldb >= nr);

    for i in 0..mr {
        let a_row = a.add(i * lda);
        let c_row = c.add(i * ldc);
        for k in 0..kc {
            let aik = *a_row.add(k);
            let b_row = b.add(k * ldb);
            for j in 0..nr {
                *c_row.add(j) += aik * *b_row.add(j);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(mr: usize, nr: usize, kc: usize, a: &[f32], b: &[f32], ldb: usize) -> Vec<f32> {
        let mut c = vec![0.0f32; mr * nr];
        for i in 0..mr {
            for j in 0..nr {
                c[i * nr + j] = (0..kc).map(|k| a[i * kc + k] * b[k * ldb + j]).sum();
            }
        }
        c
    }

    #[test]
    fn test_every_edge_shape() {
        let kc = 5;
        for mr in 1..=MAX_EDGE {
            for nr in 1..=MAX_EDGE {
                let a: Vec<f32> = (0..mr * kc).map(|x| (x % 7) as f32 - 3.0).collect();
                let b: Vec<f32> = (0..kc * nr).map(|x| (x % 5) as f32 * 0.5).collect();
                let mut c = vec![0.0f32; mr * nr];
                unsafe { kernel_ref(mr, nr, kc, a.as_ptr(), kc, b.as_ptr(), c.as_mut_ptr(), nr) };
                // Small integers and halves: exact in f32.
                assert_eq!(c, direct(mr, nr, kc, &a, &b, nr), "mr={mr} nr={nr}");
            }
        }
    }

    #[test]
    fn test_strided_matches_packed() {
        let (mr, nr, kc, ldb) = (3, 5, 4, 9);
        let a: Vec<f32> = (0..mr * kc).map(|x| x as f32).collect();
        let b_strided: Vec<f32> = (0..kc * ldb).map(|x| x as f32 * 0.25).collect();
        let b_packed: Vec<f32> = (0..kc)
            .flat_map(|k| b_strided[k * ldb..k * ldb + nr].to_vec())
            .collect();

        let mut c1 = vec![1.0f32; mr * nr];
        let mut c2 = vec![1.0f32; mr * nr];
        unsafe {
            kernel_ref(mr, nr, kc, a.as_ptr(), kc, b_packed.as_ptr(), c1.as_mut_ptr(), nr);
            kernel_ref_strided(mr, nr, kc, a.as_ptr(), kc, b_strided.as_ptr(), ldb, c2.as_mut_ptr(), nr);
        }
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_accumulates_into_c() {
        let a = [2.0f32];
        let b = [3.0f32];
        let mut c = [10.0f32];
        unsafe { kernel_ref(1, 1, 1, a.as_ptr(), 1, b.as_ptr(), c.as_mut_ptr(), 1) };
        assert_eq!(c, [16.0]);
    }
}
