//! GEMM drivers: `C += A × B` for row-major `f32` matrices.
//!
//! | driver            | tiling | packing | inner update                    |
//! |-------------------|--------|---------|---------------------------------|
//! | [`gemm_naive`]    | no     | no      | scalar, row-parallel            |
//! | [`gemm_blocked`]  | yes    | no      | vector axpy over C rows         |
//! | [`gemm_packed`]   | yes    | yes     | vector axpy over packed panels  |
//! | [`gemm_vectorized`] | yes  | yes     | 8×8 register micro-kernel       |
//!
//! Every driver accumulates: callers that want a fresh product zero C first
//! (or use [`run_fresh`](crate::dispatch::run_fresh)). The tiled drivers pick
//! their kernel with [`KernelKind::detect`]; the `_with` variants take it
//! explicitly so tests can pin the portable kernel.

use log::debug;
use rayon::prelude::*;

use crate::config::BlockConfig;
use crate::error::Result;
use crate::matrix::{check_shapes, MatMut, MatRef};
use crate::pack::{pack_a, pack_b, PanelBuffer};
use crate::simd::{scalar, with_kernel, KernelKind, MicroKernel};
use crate::tiling::{depth_chunks, for_each_tile, SharedMut, TileGrid};

/// Row-parallel triple loop in plain scalar arithmetic; the numerical
/// reference for the other drivers.
pub fn gemm_naive(
    m: usize,
    n: usize,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
) -> Result<()> {
    check_shapes(m, n, k, a, b, c)?;
    if m == 0 || n == 0 || k == 0 {
        return Ok(());
    }

    let ldc = c.stride();
    c.as_mut_slice()
        .par_chunks_mut(ldc)
        .take(m)
        .enumerate()
        .for_each(|(i, c_row)| {
            let c_row = &mut c_row[..n];
            for (kk, &aik) in a.row(i).iter().enumerate() {
                for (cj, &bj) in c_row.iter_mut().zip(b.row(kk)) {
                    *cj += aik * bj;
                }
            }
        });
    Ok(())
}

/// Tiled, no packing: each C row of a tile is updated in place with one axpy
/// per depth step, reading A and B through the caller's strides.
pub fn gemm_blocked(
    m: usize,
    n: usize,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    gemm_blocked_with(KernelKind::detect(), m, n, k, a, b, c, block)
}

#[allow(clippy::too_many_arguments)]
pub fn gemm_blocked_with(
    kind: KernelKind,
    m: usize,
    n: usize,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    check_shapes(m, n, k, a, b, c)?;
    if k == 0 {
        return Ok(());
    }
    debug!("blocked: {m}x{n}x{k}, {block}, kernel {kind}");
    with_kernel!(kind, |kern| blocked_tiles(kern, k, a, b, c, block))
}

fn blocked_tiles<K: MicroKernel>(
    kern: K,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    let grid = TileGrid::new(c.rows(), c.cols(), block);
    let ldc = c.stride();
    let c_ptr = SharedMut::new(c.as_mut_ptr());

    for_each_tile(&grid, || Ok(()), |_, tile| {
        for (k0, depth) in depth_chunks(k, block.kb()) {
            for i in tile.row0..tile.row_end {
                // SAFETY: row `i`, columns `col0..col_end` belong to this tile only.
                let c_row = unsafe { c_ptr.slice_mut(i * ldc + tile.col0, tile.cols()) };
                let a_row = &a.row(i)[k0..k0 + depth];
                for (kk, &aik) in a_row.iter().enumerate() {
                    kern.axpy(aik, &b.row(k0 + kk)[tile.col0..tile.col_end], c_row);
                }
            }
        }
        Ok(())
    })
}

/// Tiled and packed: each depth-chunk of A and B is copied into per-worker
/// panels, then every C row of the tile is updated from the panels.
pub fn gemm_packed(
    m: usize,
    n: usize,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    gemm_packed_with(KernelKind::detect(), m, n, k, a, b, c, block)
}

#[allow(clippy::too_many_arguments)]
pub fn gemm_packed_with(
    kind: KernelKind,
    m: usize,
    n: usize,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    check_shapes(m, n, k, a, b, c)?;
    if k == 0 {
        return Ok(());
    }
    debug!("packed: {m}x{n}x{k}, {block}, kernel {kind}");
    with_kernel!(kind, |kern| packed_tiles(kern, k, a, b, c, block))
}

fn packed_tiles<K: MicroKernel>(
    kern: K,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    let grid = TileGrid::new(c.rows(), c.cols(), block);
    let ldc = c.stride();
    let c_ptr = SharedMut::new(c.as_mut_ptr());
    let panel_block = block.clamp_to(c.rows(), c.cols(), k);

    for_each_tile(&grid, || PanelBuffer::new(&panel_block), |panels, tile| {
        let (rows, cols) = (tile.rows(), tile.cols());
        for (k0, depth) in depth_chunks(k, block.kb()) {
            let (ap, bp) = panels.split_mut();
            pack_a(a, tile.row0, k0, rows, depth, ap);
            pack_b(b, k0, tile.col0, depth, cols, bp);

            for i in 0..rows {
                // SAFETY: this row segment belongs to this tile only.
                let c_row = unsafe { c_ptr.slice_mut((tile.row0 + i) * ldc + tile.col0, cols) };
                let a_row = &ap[i * depth..(i + 1) * depth];
                for (kk, &aik) in a_row.iter().enumerate() {
                    kern.axpy(aik, &bp[kk * cols..(kk + 1) * cols], c_row);
                }
            }
        }
        Ok(())
    })
}

/// Tiled, packed, and register-blocked: each packed tile is swept in 8×8
/// blocks by the micro-kernel, with the scalar fallback on partial blocks
/// at the tile edges.
pub fn gemm_vectorized(
    m: usize,
    n: usize,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    gemm_vectorized_with(KernelKind::detect(), m, n, k, a, b, c, block)
}

#[allow(clippy::too_many_arguments)]
pub fn gemm_vectorized_with(
    kind: KernelKind,
    m: usize,
    n: usize,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    check_shapes(m, n, k, a, b, c)?;
    if k == 0 {
        return Ok(());
    }
    debug!("vectorized: {m}x{n}x{k}, {block}, kernel {kind}");
    with_kernel!(kind, |kern| vectorized_tiles(kern, k, a, b, c, block))
}

fn vectorized_tiles<K: MicroKernel>(
    kern: K,
    k: usize,
    a: &MatRef<'_>,
    b: &MatRef<'_>,
    c: &mut MatMut<'_>,
    block: &BlockConfig,
) -> Result<()> {
    let grid = TileGrid::new(c.rows(), c.cols(), block);
    let ldc = c.stride();
    let c_ptr = SharedMut::new(c.as_mut_ptr());
    let panel_block = block.clamp_to(c.rows(), c.cols(), k);

    for_each_tile(&grid, || PanelBuffer::new(&panel_block), |panels, tile| {
        let (rows, cols) = (tile.rows(), tile.cols());
        for (k0, depth) in depth_chunks(k, block.kb()) {
            let (ap, bp) = panels.split_mut();
            pack_a(a, tile.row0, k0, rows, depth, ap);
            pack_b(b, k0, tile.col0, depth, cols, bp);

            // SAFETY: the panels hold `rows × depth` and `depth × cols`
            // elements at pitches `depth` and `cols`, and every C block
            // addressed below lies inside this tile.
            unsafe {
                sweep_tile(
                    kern,
                    rows,
                    cols,
                    depth,
                    ap.as_ptr(),
                    bp.as_ptr(),
                    c_ptr.get().add(tile.row0 * ldc + tile.col0),
                    ldc,
                );
            }
        }
        Ok(())
    })
}

/// Covers a packed `rows × cols` tile with micro-kernel calls.
///
/// Full `MR × NR` blocks go to the vector kernel, using the packed variant
/// when the B panel is exactly `NR` wide. Everything else goes to the scalar
/// fallback.
#[allow(clippy::too_many_arguments)]
#[inline]
unsafe fn sweep_tile<K: MicroKernel>(
    kern: K,
    rows: usize,
    cols: usize,
    depth: usize,
    a_panel: *const f32,
    b_panel: *const f32,
    c_tile: *mut f32,
    ldc: usize,
) {
    for i0 in (0..rows).step_by(K::MR) {
        let mr = K::MR.min(rows - i0);
        let a_blk = a_panel.add(i0 * depth);

        for j0 in (0..cols).step_by(K::NR) {
            let nr = K::NR.min(cols - j0);
            let b_blk = b_panel.add(j0);
            let c_blk = c_tile.add(i0 * ldc + j0);

            match (mr == K::MR && nr == K::NR, cols == nr) {
                (true, true) => kern.kernel_packed(depth, a_blk, depth, b_blk, c_blk, ldc),
                (true, false) => kern.kernel_strided(depth, a_blk, depth, b_blk, cols, c_blk, ldc),
                (false, true) => scalar::kernel_ref(mr, nr, depth, a_blk, depth, b_blk, c_blk, ldc),
                (false, false) => {
                    scalar::kernel_ref_strided(mr, nr, depth, a_blk, depth, b_blk, cols, c_blk, ldc)
                }
            }
        }
    }
}
