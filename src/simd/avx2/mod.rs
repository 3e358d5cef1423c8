//! AVX2 + FMA implementations for 256-bit vectors.
//!
//! Nothing in this module is compiled in with `-C target-feature`; the
//! kernels are built with `#[target_feature]` and selected at runtime
//! through [`Avx2Fma::try_new`](kernels::Avx2Fma::try_new), so one binary
//! runs on any x86-64 CPU and uses AVX2 where it exists.

pub mod f32x8;

pub mod kernels;

pub use kernels::Avx2Fma;
