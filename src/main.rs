use anyhow::Context;
use clap::Parser;
use log::info;

use tilegemm::bench::{run_benchmark, BenchArgs, BenchConfig};
use tilegemm::simd::KernelKind;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BenchConfig::try_from(BenchArgs::parse()).context("invalid benchmark arguments")?;
    info!("micro-kernel: {}", KernelKind::detect());

    let report = run_benchmark(&config)
        .with_context(|| format!("benchmark of `{}` failed", config.implementation))?;

    println!("{report}");
    info!("finished at {}", report.finished_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(path) = &config.csv_path {
        report
            .append_csv(path)
            .with_context(|| format!("could not write {}", path.display()))?;
        println!("Results written to {}", path.display());
    }

    Ok(())
}
