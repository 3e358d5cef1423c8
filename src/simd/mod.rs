//! Micro-kernels and their runtime selection.
//!
//! The tiled drivers are generic over [`MicroKernel`]. [`KernelKind`] names
//! the kernels built for the current target; [`KernelKind::detect`] picks the
//! widest one the running CPU supports, and `with_kernel!` turns the enum
//! back into a concrete type so the driver is monomorphized per kernel.

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub mod avx2;

pub mod portable;

pub mod scalar;

pub mod traits;

use std::fmt;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use avx2::Avx2Fma;
pub use portable::Portable;
pub use traits::MicroKernel;

/// Binds the concrete kernel inside a [`KernelKind`] and evaluates `$body`
/// with it, once per variant.
macro_rules! with_kernel {
    ($kind:expr, |$k:ident| $body:expr) => {
        match $kind {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            $crate::simd::KernelKind::Avx2Fma($k) => $body,
            $crate::simd::KernelKind::Portable($k) => $body,
        }
    };
}

pub(crate) use with_kernel;

/// A micro-kernel available on this target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Avx2Fma(Avx2Fma),
    Portable(Portable),
}

impl KernelKind {
    /// Best kernel for the running CPU.
    pub fn detect() -> Self {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        if let Some(kernel) = Avx2Fma::try_new() {
            return KernelKind::Avx2Fma(kernel);
        }
        KernelKind::Portable(Portable)
    }

    /// The kernel every target has.
    pub fn portable() -> Self {
        KernelKind::Portable(Portable)
    }

    pub fn name(self) -> &'static str {
        with_kernel!(self, |k| k.name())
    }
}

impl Default for KernelKind {
    fn default() -> Self {
        Self::detect()
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_is_stable() {
        assert_eq!(KernelKind::detect(), KernelKind::detect());
    }

    #[test]
    fn test_names() {
        assert_eq!(KernelKind::portable().name(), "portable");
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            assert_eq!(KernelKind::detect().to_string(), "avx2+fma");
        }
    }
}
