/// A register-blocked GEMM micro-kernel.
///
/// Implementations update an `MR × NR` block of C in place:
///
/// ```text
/// C[i][j] += Σ_{k < kc} A[i * lda + k] · B[k * ldb + j]      i < MR, j < NR
/// ```
///
/// A is a row-major panel (row `i` of the block starts at `i * lda`), which
/// for a packed tile of depth `kc` means `lda == kc`. Kernels are
/// zero-sized handles; a handle only exists if the instructions it needs
/// are available, so holding one is proof that calling it is sound with
/// respect to the CPU.
pub trait MicroKernel: Copy + Send + Sync {
    /// Rows of C updated per call.
    const MR: usize;
    /// Columns of C updated per call.
    const NR: usize;

    /// Short name for logs and reports.
    fn name(self) -> &'static str;

    /// Full-block update with B rows tightly packed (pitch `NR`).
    ///
    /// # Safety
    ///
    /// - `a` must be readable for `(MR - 1) * lda + kc` elements
    /// - `b` must be readable for `kc * NR` elements
    /// - `c` must be writable for `MR` rows of `NR` elements at pitch `ldc`
    /// - no other thread may access the addressed C block during the call
    unsafe fn kernel_packed(
        self,
        kc: usize,
        a: *const f32,
        lda: usize,
        b: *const f32,
        c: *mut f32,
        ldc: usize,
    );

    /// Full-block update with B rows at an arbitrary pitch `ldb >= NR`.
    ///
    /// # Safety
    ///
    /// Same as [`kernel_packed`](Self::kernel_packed), with `b` readable for
    /// `(kc - 1) * ldb + NR` elements.
    #[allow(clippy::too_many_arguments)]
    unsafe fn kernel_strided(
        self,
        kc: usize,
        a: *const f32,
        lda: usize,
        b: *const f32,
        ldb: usize,
        c: *mut f32,
        ldc: usize,
    );

    /// `y += alpha * x`, element-wise over `min(x.len(), y.len())` elements.
    fn axpy(self, alpha: f32, x: &[f32], y: &mut [f32]);
}
