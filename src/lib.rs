//! # tilegemm
//!
//! Single-precision GEMM, `C += A × B`, over row-major matrices with
//! arbitrary row strides, in four built-in strategies of increasing
//! sophistication plus a slot for an external library:
//!
//! - **naive**: row-parallel triple loop, the numerical reference
//! - **blocked**: cache tiles distributed over a rayon pool, vector row updates
//! - **packed**: tiles plus per-worker packed panels of A and B
//! - **vectorized**: packed tiles swept by an 8×8 register-blocked micro-kernel
//! - **external**: delegated to an [`ExternalGemm`](dispatch::ExternalGemm)
//!
//! The micro-kernel is chosen at runtime: AVX2 + FMA where the CPU has it,
//! a portable lane-array kernel elsewhere.
//!
//! ```
//! use tilegemm::{run, BlockConfig, MatMut, MatRef};
//!
//! let a = vec![1.0f32; 4 * 3];
//! let b = vec![2.0f32; 3 * 5];
//! let mut c = vec![0.0f32; 4 * 5];
//!
//! let av = MatRef::from_slice(&a, 4, 3)?;
//! let bv = MatRef::from_slice(&b, 3, 5)?;
//! let mut cv = MatMut::from_slice(&mut c, 4, 5)?;
//! run("vectorized", 4, 5, 3, &av, &bv, &mut cv, &BlockConfig::default())?;
//!
//! assert!(c.iter().all(|&x| x == 6.0));
//! # Ok::<(), tilegemm::GemmError>(())
//! ```

pub mod bench;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod matmul;
pub mod matrix;
pub mod pack;
pub mod simd;
pub mod tiling;
pub mod utils;

pub use config::BlockConfig;
pub use dispatch::{run, run_fresh, Dispatcher, ExternalGemm, Implementation, UnavailableBackend};
pub use error::{GemmError, Result};
pub use matmul::{gemm_blocked, gemm_naive, gemm_packed, gemm_vectorized};
pub use matrix::{MatMut, MatRef};
pub use simd::KernelKind;
