//! Implementation selection by name.
//!
//! [`run`] parses an implementation name, validates the problem, and invokes
//! exactly one driver. Unknown names and unavailable backends are reported as
//! errors; nothing is retried and no other implementation is substituted.
//!
//! The `external` slot delegates to an [`ExternalGemm`] collaborator. The
//! default collaborator, [`UnavailableBackend`], always reports
//! [`GemmError::BackendUnavailable`]; callers with a real library plug it in
//! through [`Dispatcher::with_external`].

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::config::BlockConfig;
use crate::error::{backend_unavailable, GemmError, Result};
use crate::matmul::{gemm_blocked, gemm_naive, gemm_packed, gemm_vectorized};
use crate::matrix::{check_shapes, MatMut, MatRef};

/// The selectable GEMM strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Implementation {
    Naive,
    Blocked,
    Packed,
    Vectorized,
    External,
}

impl Implementation {
    pub const ALL: [Implementation; 5] = [
        Implementation::Naive,
        Implementation::Blocked,
        Implementation::Packed,
        Implementation::Vectorized,
        Implementation::External,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Implementation::Naive => "naive",
            Implementation::Blocked => "blocked",
            Implementation::Packed => "packed",
            Implementation::Vectorized => "vectorized",
            Implementation::External => "external",
        }
    }

    /// Short tag describing how the implementation runs, used in reports.
    pub fn notes(self) -> &'static str {
        match self {
            Implementation::Naive => "baseline",
            Implementation::Blocked => "blocked+rayon",
            Implementation::Packed => "packed+rayon",
            Implementation::Vectorized => "vectorized+rayon",
            Implementation::External => "external",
        }
    }
}

impl FromStr for Implementation {
    type Err = GemmError;

    fn from_str(s: &str) -> Result<Self> {
        Implementation::ALL
            .into_iter()
            .find(|imp| imp.name() == s)
            .ok_or_else(|| GemmError::UnknownImplementation { name: s.to_string() })
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A GEMM provided by an outside library.
///
/// Same contract as the built-in drivers: accumulate `A × B` into C, or
/// return an error.
pub trait ExternalGemm: Send + Sync {
    fn name(&self) -> &str;

    #[allow(clippy::too_many_arguments)]
    fn gemm(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &MatRef<'_>,
        b: &MatRef<'_>,
        c: &mut MatMut<'_>,
        block: &BlockConfig,
    ) -> Result<()>;
}

/// The external slot when no library is linked.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

impl ExternalGemm for UnavailableBackend {
    fn name(&self) -> &str {
        "external"
    }

    fn gemm(
        &self,
        _m: usize,
        _n: usize,
        _k: usize,
        _a: &MatRef<'_>,
        _b: &MatRef<'_>,
        _c: &mut MatMut<'_>,
        _block: &BlockConfig,
    ) -> Result<()> {
        Err(backend_unavailable(
            self.name(),
            "no external BLAS library is linked into this build",
        ))
    }
}

/// Routes calls to a built-in driver or to the external backend.
pub struct Dispatcher {
    external: Box<dyn ExternalGemm>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            external: Box::new(UnavailableBackend),
        }
    }

    /// Replaces the external backend.
    pub fn with_external(mut self, backend: Box<dyn ExternalGemm>) -> Self {
        self.external = backend;
        self
    }

    /// Name of the configured external backend.
    pub fn external_name(&self) -> &str {
        self.external.name()
    }

    /// Parses `name` and runs that implementation.
    ///
    /// An unknown name fails before C is touched.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        name: &str,
        m: usize,
        n: usize,
        k: usize,
        a: &MatRef<'_>,
        b: &MatRef<'_>,
        c: &mut MatMut<'_>,
        block: &BlockConfig,
    ) -> Result<()> {
        let imp: Implementation = name.parse()?;
        self.run_impl(imp, m, n, k, a, b, c, block)
    }

    /// Runs `imp`, accumulating into C.
    #[allow(clippy::too_many_arguments)]
    pub fn run_impl(
        &self,
        imp: Implementation,
        m: usize,
        n: usize,
        k: usize,
        a: &MatRef<'_>,
        b: &MatRef<'_>,
        c: &mut MatMut<'_>,
        block: &BlockConfig,
    ) -> Result<()> {
        check_shapes(m, n, k, a, b, c)?;
        debug!("dispatch {imp}: {m}x{n}x{k}, {block}");

        match imp {
            Implementation::Naive => gemm_naive(m, n, k, a, b, c),
            Implementation::Blocked => gemm_blocked(m, n, k, a, b, c, block),
            Implementation::Packed => gemm_packed(m, n, k, a, b, c, block),
            Implementation::Vectorized => gemm_vectorized(m, n, k, a, b, c, block),
            Implementation::External => self.external.gemm(m, n, k, a, b, c, block),
        }
    }

    /// Zeroes C, then runs `name`: C becomes exactly `A × B`.
    ///
    /// Name and shapes are checked first, so a rejected call leaves C as it
    /// was.
    #[allow(clippy::too_many_arguments)]
    pub fn run_fresh(
        &self,
        name: &str,
        m: usize,
        n: usize,
        k: usize,
        a: &MatRef<'_>,
        b: &MatRef<'_>,
        c: &mut MatMut<'_>,
        block: &BlockConfig,
    ) -> Result<()> {
        let imp: Implementation = name.parse()?;
        check_shapes(m, n, k, a, b, c)?;
        c.fill_zero();
        self.run_impl(imp, m, n, k, a, b, c, block)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("external", &self.external.name())
            .finish()
    }
}

/// [`Dispatcher::run`] with the default (unavailable) external backend.
#[allow(clippy::too_many_arguments)]
pub fn run(
    name: &str,
    m: usize,
    n: usize,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    Dispatcher::new().run(name, m, n, k, a, b, c, block)
}

/// [`Dispatcher::run_fresh`] with the default external backend.
#[allow(clippy::too_many_arguments)]
pub fn run_fresh(
    name: &str,
    m: usize,
    n: usize,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    Dispatcher::new().run_fresh(name, m, n, k, a, b, c, block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_name() {
        for imp in Implementation::ALL {
            assert_eq!(imp.name().parse::<Implementation>().unwrap(), imp);
            assert_eq!(imp.to_string(), imp.name());
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = "Vectorized".parse::<Implementation>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown implementation: Vectorized");
    }

    #[test]
    fn test_notes() {
        assert_eq!(Implementation::Naive.notes(), "baseline");
        assert_eq!(Implementation::Blocked.notes(), "blocked+rayon");
    }

    #[test]
    fn test_default_dispatcher_debug() {
        let d = Dispatcher::default();
        assert_eq!(d.external_name(), "external");
        assert!(format!("{d:?}").contains("external"));
    }
}
