//! Benchmark harness.
//!
//! Runs one implementation on seeded random matrices, checks it against the
//! naive driver, and reports the best of several timed repetitions:
//!
//! 1. fill A (`M × K`) and B (`K × N`) from `StdRng::seed_from_u64(seed)`,
//!    uniform in `[-1, 1)`
//! 2. compute the reference with [`gemm_naive`]
//! 3. one untimed warm-up call
//! 4. `reps` timed calls, C zeroed before each; any repetition whose
//!    relative Frobenius error exceeds [`TOLERANCE`] aborts the run
//! 5. report the fastest repetition as time and GFLOP/s (`2MNK / t`)
//!
//! Everything runs inside a rayon pool of `--threads` workers (or rayon's
//! default size), so the tiled drivers see exactly that many workers.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use clap::Parser;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::BlockConfig;
use crate::dispatch::{Dispatcher, Implementation};
use crate::error::{validation_error, Result};
use crate::matmul::gemm_naive;
use crate::matrix::{MatMut, MatRef};
use crate::utils::AlignedVec;

/// Largest relative error a benchmarked implementation may show.
pub const TOLERANCE: f64 = 1e-6;

/// Header of the results file.
pub const CSV_HEADER: &str = "impl,M,N,K,threads,MB,NB,KB,time_ms,gflops,relerr,notes";

/// Dense, 64-byte aligned, owned row-major matrix.
#[derive(Debug)]
pub struct AlignedMatrix {
    data: AlignedVec,
    rows: usize,
    cols: usize,
}

impl AlignedMatrix {
    /// A zero-filled `rows × cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| validation_error(format!("{rows}x{cols} matrix overflows usize")))?;
        Ok(Self {
            data: AlignedVec::zeroed(len)?,
            rows,
            cols,
        })
    }

    /// A matrix of uniform samples from `[-1, 1)`, drawn row by row.
    pub fn random(rows: usize, cols: usize, rng: &mut StdRng) -> Result<Self> {
        let mut matrix = Self::zeros(rows, cols)?;
        for x in matrix.data.iter_mut() {
            *x = rng.random_range(-1.0f32..1.0);
        }
        Ok(matrix)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn view(&self) -> MatRef<'_> {
        MatRef::dense(&self.data, self.rows, self.cols)
    }

    pub fn view_mut(&mut self) -> MatMut<'_> {
        MatMut::dense(&mut self.data, self.rows, self.cols)
    }

    pub fn fill_zero(&mut self) {
        self.data.fill_zero();
    }
}

/// `‖X‖_F`, accumulated in f64.
pub fn frobenius_norm(x: &MatRef<'_>) -> f64 {
    (0..x.rows())
        .flat_map(|i| x.row(i))
        .map(|&v| f64::from(v) * f64::from(v))
        .sum::<f64>()
        .sqrt()
}

/// `‖C − C_ref‖_F / (‖C_ref‖_F + 1e-30)`, accumulated in f64.
///
/// The `1e-30` keeps an all-zero reference from dividing by zero.
pub fn relative_error(c: &MatRef<'_>, c_ref: &MatRef<'_>) -> Result<f64> {
    if (c.rows(), c.cols()) != (c_ref.rows(), c_ref.cols()) {
        return Err(validation_error(format!(
            "cannot compare a {}x{} result with a {}x{} reference",
            c.rows(),
            c.cols(),
            c_ref.rows(),
            c_ref.cols()
        )));
    }

    let diff = (0..c.rows())
        .flat_map(|i| c.row(i).iter().zip(c_ref.row(i)))
        .map(|(&x, &y)| {
            let d = f64::from(x - y);
            d * d
        })
        .sum::<f64>()
        .sqrt();

    Ok(diff / (frobenius_norm(c_ref) + 1e-30))
}

/// Command-line arguments of `tilegemm-bench`.
#[derive(Debug, Clone, Parser)]
#[command(name = "tilegemm-bench", about = "Time one GEMM implementation against the naive reference")]
pub struct BenchArgs {
    /// Rows of A and C (defaults to N)
    #[arg(long = "M")]
    pub m: Option<usize>,
    /// Columns of B and C
    #[arg(long = "N", default_value_t = 1024)]
    pub n: usize,
    /// Columns of A, rows of B (defaults to N)
    #[arg(long = "K")]
    pub k: Option<usize>,
    /// Timed repetitions
    #[arg(long, default_value_t = 5)]
    pub reps: usize,
    /// Worker threads (defaults to rayon's choice)
    #[arg(long)]
    pub threads: Option<usize>,
    /// Seed for the input matrices
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Append the result to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,
    /// naive | blocked | packed | vectorized | external
    #[arg(long = "impl", default_value = "naive")]
    pub implementation: String,
    /// Row-tile size
    #[arg(long = "MB", default_value_t = BlockConfig::DEFAULT_TILE)]
    pub mb: usize,
    /// Column-tile size
    #[arg(long = "NB", default_value_t = BlockConfig::DEFAULT_TILE)]
    pub nb: usize,
    /// Depth-tile size
    #[arg(long = "KB", default_value_t = BlockConfig::DEFAULT_TILE)]
    pub kb: usize,
}

/// A validated benchmark configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub reps: usize,
    pub threads: Option<usize>,
    pub seed: u64,
    pub csv_path: Option<PathBuf>,
    pub implementation: Implementation,
    pub block: BlockConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            m: 1024,
            n: 1024,
            k: 1024,
            reps: 5,
            threads: None,
            seed: 42,
            csv_path: None,
            implementation: Implementation::Naive,
            block: BlockConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Parses command-line style arguments (the first item is the program
    /// name).
    pub fn from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let args = BenchArgs::try_parse_from(args).map_err(|e| validation_error(e.to_string()))?;
        Self::try_from(args)
    }

    /// Floating-point operations of one call.
    pub fn flops(&self) -> f64 {
        2.0 * self.m as f64 * self.n as f64 * self.k as f64
    }
}

impl TryFrom<BenchArgs> for BenchConfig {
    type Error = crate::error::GemmError;

    fn try_from(args: BenchArgs) -> Result<Self> {
        if args.reps == 0 {
            return Err(validation_error("--reps must be at least 1"));
        }
        if args.threads == Some(0) {
            return Err(validation_error("--threads must be at least 1"));
        }

        Ok(Self {
            m: args.m.unwrap_or(args.n),
            n: args.n,
            k: args.k.unwrap_or(args.n),
            reps: args.reps,
            threads: args.threads,
            seed: args.seed,
            csv_path: args.csv,
            implementation: args.implementation.parse()?,
            block: BlockConfig::new(args.mb, args.nb, args.kb)?,
        })
    }
}

/// Outcome of one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub implementation: Implementation,
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub threads: usize,
    pub block: BlockConfig,
    /// Fastest repetition, in milliseconds.
    pub time_ms: f64,
    pub gflops: f64,
    /// Relative error of the last repetition.
    pub relerr: f64,
    /// Per-repetition times, in run order.
    pub rep_times_ms: Vec<f64>,
    pub finished_at: DateTime<Local>,
}

impl BenchReport {
    /// `key=value` pairs on one line.
    pub fn summary_line(&self) -> String {
        format!(
            "impl={},M={},N={},K={},threads={},MB={},NB={},KB={},time_ms={:.3},gflops={:.2},relerr={:.1e},notes={}",
            self.implementation,
            self.m,
            self.n,
            self.k,
            self.threads,
            self.block.mb(),
            self.block.nb(),
            self.block.kb(),
            self.time_ms,
            self.gflops,
            self.relerr,
            self.implementation.notes()
        )
    }

    /// One row matching [`CSV_HEADER`].
    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{:.3},{:.2},{:.1e},{}",
            self.implementation,
            self.m,
            self.n,
            self.k,
            self.threads,
            self.block.mb(),
            self.block.nb(),
            self.block.kb(),
            self.time_ms,
            self.gflops,
            self.relerr,
            self.implementation.notes()
        )
    }

    /// Appends [`csv_row`](Self::csv_row) to `path`, writing the header first
    /// when the file is new or empty.
    pub fn append_csv(&self, path: &Path) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{CSV_HEADER}")?;
        }
        writeln!(file, "{}", self.csv_row())?;
        debug!("appended result to {}", path.display());
        Ok(())
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_line())
    }
}

/// GFLOP/s for `flops` operations in `time_ms` milliseconds.
pub fn gflops(flops: f64, time_ms: f64) -> f64 {
    flops / (time_ms / 1e3 * 1e9)
}

/// Runs the benchmark described by `config` in its own rayon pool.
pub fn run_benchmark(config: &BenchConfig) -> Result<BenchReport> {
    run_benchmark_with(config, &Dispatcher::new())
}

/// [`run_benchmark`] with a caller-supplied dispatcher (for an external
/// backend).
pub fn run_benchmark_with(config: &BenchConfig, dispatcher: &Dispatcher) -> Result<BenchReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or(0))
        .build()?;
    let threads = pool.current_num_threads();

    info!(
        "M={}, N={}, K={}, reps={}, impl={}, threads={}, {} (working set {:.1} MiB)",
        config.m,
        config.n,
        config.k,
        config.reps,
        config.implementation,
        threads,
        config.block,
        config.block.working_set_mib()
    );

    let (rep_times_ms, relerr) = pool.install(|| timed_runs(config, dispatcher))?;

    let time_ms = rep_times_ms.iter().copied().fold(f64::INFINITY, f64::min);
    Ok(BenchReport {
        implementation: config.implementation,
        m: config.m,
        n: config.n,
        k: config.k,
        threads,
        block: config.block,
        time_ms,
        gflops: gflops(config.flops(), time_ms),
        relerr,
        rep_times_ms,
        finished_at: Local::now(),
    })
}

/// Warm-up plus timed repetitions. Returns the repetition times and the
/// final relative error.
fn timed_runs(config: &BenchConfig, dispatcher: &Dispatcher) -> Result<(Vec<f64>, f64)> {
    let (m, n, k) = (config.m, config.n, config.k);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let a = AlignedMatrix::random(m, k, &mut rng)?;
    let b = AlignedMatrix::random(k, n, &mut rng)?;

    let mut c_ref = AlignedMatrix::zeros(m, n)?;
    gemm_naive(m, n, k, &a.view(), &b.view(), &mut c_ref.view_mut())?;

    let mut c = AlignedMatrix::zeros(m, n)?;
    dispatcher.run_impl(
        config.implementation,
        m,
        n,
        k,
        &a.view(),
        &b.view(),
        &mut c.view_mut(),
        &config.block,
    )?;

    let mut times = Vec::with_capacity(config.reps);
    let mut relerr = 0.0;
    for rep in 1..=config.reps {
        c.fill_zero();

        let start = Instant::now();
        dispatcher.run_impl(
            config.implementation,
            m,
            n,
            k,
            &a.view(),
            &b.view(),
            &mut c.view_mut(),
            &config.block,
        )?;
        let time_ms = start.elapsed().as_secs_f64() * 1e3;

        relerr = relative_error(&c.view(), &c_ref.view())?;
        if relerr > TOLERANCE {
            return Err(validation_error(format!(
                "relative error {relerr:.3e} exceeds threshold {TOLERANCE:e} on repetition {rep}"
            )));
        }

        info!("rep {rep}: {time_ms:.2} ms, relerr={relerr:.1e}");
        times.push(time_ms);
    }

    Ok((times, relerr))
}
