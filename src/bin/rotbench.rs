/// rotbench – compare accelerator and CPU circular rotation.
///
///   rotbench                          → default sizes, best available backend
///   rotbench --backend host           → host-emulated accelerator
///   rotbench --sizes 1000,5000 -t 8   → custom sizes and trial count
///   rotbench --output results.csv     → write aggregates to results.csv
///   rotbench --list-devices           → list accelerator devices and exit
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};

use rotbench::aggregate::{run_benchmark, BenchReport};
use rotbench::config::{
    BenchConfig, DEFAULT_BLOCK_SIZE, DEFAULT_BUILD_CEILING_MS, DEFAULT_TRIALS_PER_SIZE,
};
use rotbench::device::{self, Backend};
use rotbench::sink::CsvSink;
use rotbench::RotResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Host,
    Opencl,
    Webgpu,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Host => Backend::Host,
            BackendArg::Opencl => Backend::OpenCl,
            BackendArg::Webgpu => Backend::WebGpu,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "rotbench", version, about = "Phase-timed accelerator vs CPU rotation benchmark")]
struct Cli {
    /// Accelerator backend (default: first GPU backend compiled in, else host)
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,

    /// Comma-separated input sizes (default: 1000 … 12500000)
    #[arg(short, long, value_delimiter = ',')]
    sizes: Option<Vec<usize>>,

    /// Trials per input size
    #[arg(short, long, default_value_t = DEFAULT_TRIALS_PER_SIZE)]
    trials: usize,

    /// Drop trials whose program build took longer than this (ms)
    #[arg(long, default_value_t = DEFAULT_BUILD_CEILING_MS)]
    build_ceiling_ms: f64,

    /// Workers per accelerator block
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// CSV output path
    #[arg(short, long, default_value = "output.csv")]
    output: PathBuf,

    /// List accelerator devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn config(&self) -> BenchConfig {
        let mut config = BenchConfig::default()
            .with_trials_per_size(self.trials)
            .with_build_ceiling_ms(self.build_ceiling_ms)
            .with_block_size(self.block_size);
        if let Some(sizes) = &self.sizes {
            config = config.with_sizes(sizes.clone());
        }
        config
    }
}

fn list_devices() {
    println!("Accelerator backends:");
    println!();
    println!("  host      host-emulated grid (always available)");
    #[cfg(feature = "opencl")]
    for dev in rotbench::opencl::probe_devices() {
        println!(
            "  opencl    {} ({}, {} MiB, max work-group {})",
            dev.name,
            dev.vendor,
            dev.global_mem_size / (1024 * 1024),
            dev.max_work_group_size
        );
    }
    #[cfg(feature = "webgpu")]
    for dev in rotbench::webgpu::probe_devices() {
        let ts = if dev.supports_timestamps {
            "timestamps"
        } else {
            "no timestamps"
        };
        println!("  webgpu    {} ({}, {ts})", dev.name, dev.vendor);
    }
}

fn print_report(report: &BenchReport) {
    println!(
        "{:>10} | {:>6} | {:>5} | {:>12} | {:>12} | {:>12} | {:>9} | {:>9}",
        "Size", "Kept", "Bad", "Accel (ms)", "Iter (ms)", "Vec (ms)", "vs Iter", "vs Vec"
    );
    println!("{}", "-".repeat(96));
    for s in &report.summaries {
        let kept = format!("{}/{}", s.trials_kept, s.trials_run);
        match &s.record {
            Some(r) => {
                let fmt_speedup = |v: Option<f64>| v.map_or("N/A".to_string(), |x| format!("{x:.2}x"));
                println!(
                    "{:>10} | {:>6} | {:>5} | {:>12.4} | {:>12.4} | {:>12.4} | {:>9} | {:>9}",
                    s.size,
                    kept,
                    s.mismatches(),
                    r.accelerator_total_ms(),
                    r.cpu_iterative_ms,
                    r.cpu_vectorized_ms,
                    fmt_speedup(r.speedup_vs_iterative()),
                    fmt_speedup(r.speedup_vs_vectorized()),
                );
            }
            None => println!(
                "{:>10} | {:>6} | {:>5} | {:>12} | omitted: every trial over the build ceiling",
                s.size, kept, s.mismatches(), "-"
            ),
        }
    }
}

fn run(cli: &Cli) -> RotResult<BenchReport> {
    let config = cli.config();
    config.validate()?;

    let backend = cli.backend.map(Backend::from).unwrap_or_default();
    let accelerator = device::open(backend, config.block_size)?;
    info!(
        backend = %backend,
        device = accelerator.name(),
        sizes = ?config.ordered_sizes(),
        trials = config.trials_per_size,
        "starting benchmark"
    );

    let mut sink = CsvSink::create(&cli.output)?;
    let report = run_benchmark(&config, &*accelerator, &mut sink)?;
    info!(path = %cli.output.display(), "results written");
    Ok(report)
}

fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        list_devices();
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(report) => {
            print_report(&report);
            if report.total_mismatches() > 0 {
                error!(
                    mismatches = report.total_mismatches(),
                    "outputs do not match, please investigate"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
