//! Cache-blocking parameters.

use std::fmt;

use crate::error::{layout_error, GemmError, Result};
use crate::utils::BUFFER_ALIGNMENT;

/// Tile sizes controlling cache locality of the tiled implementations.
///
/// - `mb`: rows of C (and A) per tile
/// - `nb`: columns of C (and B) per tile
/// - `kb`: depth of one packed chunk along K
///
/// All three are strictly positive; a configuration can only be obtained
/// through [`BlockConfig::new`] (or [`Default`]), so every value in
/// circulation is already validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockConfig {
    mb: usize,
    nb: usize,
    kb: usize,
}

impl BlockConfig {
    /// Default size of each tile dimension.
    pub const DEFAULT_TILE: usize = 256;

    /// Creates a configuration, rejecting zero tile sizes.
    pub fn new(mb: usize, nb: usize, kb: usize) -> Result<Self> {
        if mb == 0 || nb == 0 || kb == 0 {
            return Err(GemmError::InvalidBlockConfig { mb, nb, kb });
        }
        Ok(Self { mb, nb, kb })
    }

    /// Same size for all three dimensions.
    pub fn square(tile: usize) -> Result<Self> {
        Self::new(tile, tile, tile)
    }

    #[inline(always)]
    pub fn mb(&self) -> usize {
        self.mb
    }

    #[inline(always)]
    pub fn nb(&self) -> usize {
        self.nb
    }

    #[inline(always)]
    pub fn kb(&self) -> usize {
        self.kb
    }

    /// The configuration actually usable on an `m × n × k` problem: each
    /// tile dimension clamped to its matrix extent (never below 1).
    pub fn clamp_to(&self, m: usize, n: usize, k: usize) -> Self {
        Self {
            mb: self.mb.min(m.max(1)),
            nb: self.nb.min(n.max(1)),
            kb: self.kb.min(k.max(1)),
        }
    }

    /// Elements needed for one packed A panel (`mb × kb`).
    ///
    /// # Errors
    ///
    /// [`GemmError::LayoutError`] if the element count overflows `usize`.
    pub fn a_panel_len(&self) -> Result<usize> {
        panel_len(self.mb, self.kb, "A")
    }

    /// Elements needed for one packed B panel (`kb × nb`).
    pub fn b_panel_len(&self) -> Result<usize> {
        panel_len(self.kb, self.nb, "B")
    }

    /// Per-worker working set in MiB (A panel, B panel and the C tile).
    pub fn working_set_mib(&self) -> f64 {
        let (mb, nb, kb) = (self.mb as f64, self.nb as f64, self.kb as f64);
        let elems = mb * kb + kb * nb + mb * nb;
        elems * std::mem::size_of::<f32>() as f64 / (1024.0 * 1024.0)
    }
}

fn panel_len(rows: usize, cols: usize, panel: &str) -> Result<usize> {
    rows.checked_mul(cols).ok_or_else(|| {
        layout_error(
            usize::MAX,
            BUFFER_ALIGNMENT,
            format!("{panel} panel of {rows} x {cols} elements overflows usize"),
        )
    })
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            mb: Self::DEFAULT_TILE,
            nb: Self::DEFAULT_TILE,
            kb: Self::DEFAULT_TILE,
        }
    }
}

impl fmt::Display for BlockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MB={}, NB={}, KB={}", self.mb, self.nb, self.kb)
    }
}
