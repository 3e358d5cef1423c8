//! Tile scheduling.
//!
//! The output matrix is cut into `⌈M/mb⌉ × ⌈N/nb⌉` tiles, numbered row-major
//! into one flat index space. [`for_each_tile`] splits that range into one
//! contiguous, disjoint chunk per worker of the current rayon pool; each
//! worker builds its own scratch once, walks its chunk in order, and drops
//! the scratch on the way out, whether the walk finished or stopped at an
//! error. The call returns after every worker has joined.
//!
//! Because no two tiles overlap in C, workers write through a shared raw
//! pointer ([`SharedMut`]) without synchronization.

use std::ops::Range;

use log::{debug, trace};
use rayon::prelude::*;

use crate::config::BlockConfig;
use crate::error::Result;

/// One output tile: rows `row0..row_end`, columns `col0..col_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub row0: usize,
    pub row_end: usize,
    pub col0: usize,
    pub col_end: usize,
}

impl Tile {
    #[inline(always)]
    pub fn rows(&self) -> usize {
        self.row_end - self.row0
    }

    #[inline(always)]
    pub fn cols(&self) -> usize {
        self.col_end - self.col0
    }
}

/// The tile decomposition of an `m × n` output.
#[derive(Debug, Clone, Copy)]
pub struct TileGrid {
    m: usize,
    n: usize,
    mb: usize,
    nb: usize,
    tiles_m: usize,
    tiles_n: usize,
}

impl TileGrid {
    pub fn new(m: usize, n: usize, block: &BlockConfig) -> Self {
        let (mb, nb) = (block.mb(), block.nb());
        Self {
            m,
            n,
            mb,
            nb,
            tiles_m: m.div_ceil(mb),
            tiles_n: n.div_ceil(nb),
        }
    }

    /// Total number of tiles.
    pub fn len(&self) -> usize {
        self.tiles_m * self.tiles_n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tiles_m(&self) -> usize {
        self.tiles_m
    }

    pub fn tiles_n(&self) -> usize {
        self.tiles_n
    }

    /// Tile `t` of the flat index space, with extents clamped to the matrix.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `t >= len()`.
    pub fn tile(&self, t: usize) -> Tile {
        debug_assert!(t < self.len());
        let (ti, tj) = (t / self.tiles_n, t % self.tiles_n);
        let row0 = ti * self.mb;
        let col0 = tj * self.nb;
        Tile {
            row0,
            row_end: (row0 + self.mb).min(self.m),
            col0,
            col_end: (col0 + self.nb).min(self.n),
        }
    }
}

/// Depth chunks `(k0, depth)` covering `0..k` in increasing order, each at
/// most `kb` deep.
pub fn depth_chunks(k: usize, kb: usize) -> impl Iterator<Item = (usize, usize)> {
    debug_assert!(kb > 0);
    (0..k).step_by(kb).map(move |k0| (k0, kb.min(k - k0)))
}

/// The contiguous share of `0..total` owned by `worker` out of `workers`.
///
/// The first `total % workers` workers get one extra item, so shares differ
/// by at most one and together cover `0..total` exactly once.
pub fn static_partition(total: usize, workers: usize, worker: usize) -> Range<usize> {
    debug_assert!(workers > 0 && worker < workers);
    let base = total / workers;
    let extra = total % workers;
    let start = worker * base + worker.min(extra);
    let len = base + usize::from(worker < extra);
    start..start + len
}

/// Raw output pointer shared by the workers of one call.
///
/// Sound to share only because every worker writes a disjoint set of tiles.
#[derive(Clone, Copy)]
pub(crate) struct SharedMut(*mut f32);

unsafe impl Send for SharedMut {}
unsafe impl Sync for SharedMut {}

impl SharedMut {
    pub(crate) fn new(ptr: *mut f32) -> Self {
        Self(ptr)
    }

    #[inline(always)]
    pub(crate) fn get(&self) -> *mut f32 {
        self.0
    }

    /// `len` elements starting `offset` elements past the base pointer.
    ///
    /// # Safety
    ///
    /// The range must lie inside the buffer and must not be accessed by any
    /// other thread while the returned slice lives.
    #[inline(always)]
    pub(crate) unsafe fn slice_mut<'a>(&self, offset: usize, len: usize) -> &'a mut [f32] {
        std::slice::from_raw_parts_mut(self.0.add(offset), len)
    }
}

/// Runs `body` on every tile of `grid` across the current rayon pool.
///
/// `init` builds one scratch value per worker; it is created before the
/// worker's first tile and dropped after its last one (or at the first
/// error). The first error from any worker is returned; the other workers
/// finish or stop early, and C is left partially updated.
pub fn for_each_tile<S, I, F>(grid: &TileGrid, init: I, body: F) -> Result<()>
where
    I: Fn() -> Result<S> + Sync,
    F: Fn(&mut S, Tile) -> Result<()> + Sync,
{
    if grid.is_empty() {
        return Ok(());
    }

    let tiles = grid.len();
    let workers = rayon::current_num_threads().clamp(1, tiles);
    debug!(
        "scheduling {tiles} tiles ({}x{}) on {workers} workers",
        grid.tiles_m(),
        grid.tiles_n()
    );

    (0..workers).into_par_iter().try_for_each(|worker| {
        let range = static_partition(tiles, workers, worker);
        trace!("worker {worker}: tiles {range:?}");

        let mut scratch = init()?;
        for t in range {
            body(&mut scratch, grid.tile(t))?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::error::validation_error;

    #[test]
    fn test_grid_edges_are_clamped() {
        let block = BlockConfig::new(4, 3, 1).unwrap();
        let grid = TileGrid::new(10, 7, &block);
        assert_eq!((grid.tiles_m(), grid.tiles_n(), grid.len()), (3, 3, 9));

        assert_eq!(
            grid.tile(0),
            Tile { row0: 0, row_end: 4, col0: 0, col_end: 3 }
        );
        // Bottom-right corner: 2 rows, 1 column left.
        let last = grid.tile(8);
        assert_eq!((last.row0, last.rows(), last.col0, last.cols()), (8, 2, 6, 1));
        // Flat index is row-major over tiles.
        assert_eq!(grid.tile(4).row0, 4);
        assert_eq!(grid.tile(4).col0, 3);
    }

    #[test]
    fn test_empty_grid() {
        let block = BlockConfig::default();
        assert!(TileGrid::new(0, 10, &block).is_empty());
        assert!(TileGrid::new(10, 0, &block).is_empty());
    }

    #[test]
    fn test_depth_chunks() {
        let chunks: Vec<_> = depth_chunks(10, 4).collect();
        assert_eq!(chunks, vec![(0, 4), (4, 4), (8, 2)]);
        assert_eq!(depth_chunks(0, 4).count(), 0);
        assert_eq!(depth_chunks(3, 256).collect::<Vec<_>>(), vec![(0, 3)]);
    }

    #[test]
    fn test_static_partition_covers_once() {
        for total in [0, 1, 5, 16, 17, 100] {
            for workers in 1..=9 {
                let mut next = 0;
                for w in 0..workers {
                    let r = static_partition(total, workers, w);
                    assert_eq!(r.start, next, "total={total} workers={workers} w={w}");
                    assert!(r.len() <= total / workers + 1);
                    next = r.end;
                }
                assert_eq!(next, total);
            }
        }
    }

    #[test]
    fn test_every_tile_visited_once() {
        let block = BlockConfig::new(3, 5, 7).unwrap();
        let grid = TileGrid::new(20, 23, &block);
        let seen = Mutex::new(vec![0usize; grid.len()]);

        for_each_tile(&grid, || Ok(()), |_, tile| {
            let t = (tile.row0 / 3) * grid.tiles_n() + tile.col0 / 5;
            seen.lock().unwrap()[t] += 1;
            Ok(())
        })
        .unwrap();

        assert!(seen.into_inner().unwrap().iter().all(|&c| c == 1));
    }

    #[test]
    fn test_scratch_dropped_on_error() {
        struct Guard<'a>(&'a AtomicUsize);
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let created = AtomicUsize::new(0);
        let dropped = AtomicUsize::new(0);
        let block = BlockConfig::new(1, 1, 1).unwrap();
        let grid = TileGrid::new(8, 8, &block);

        let result = for_each_tile(
            &grid,
            || {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(Guard(&dropped))
            },
            |_, tile| {
                if tile.row0 == 5 {
                    Err(validation_error("stop"))
                } else {
                    Ok(())
                }
            },
        );

        assert!(result.is_err());
        assert_eq!(created.load(Ordering::SeqCst), dropped.load(Ordering::SeqCst));
    }
}
