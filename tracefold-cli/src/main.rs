use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracefold_core::analyses::{CountAnalyzer, CpuAnalyzer, IoAnalyzer};
use tracefold_core::engine::{run_parallel, run_serial, EngineOptions, RunReport};
use tracefold_core::fixture::{FixtureSource, FixtureTrace};
use tracefold_core::{EventSource, Result as CoreResult};

mod config;

use config::Config;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AnalysisName {
    Count,
    Cpu,
    Io,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AnalysisType {
    Serial,
    Parallel,
}

/// Parallel offline analysis of kernel trace files.
#[derive(Parser, Debug)]
#[command(name = "tracefold")]
#[command(about = "Parallel offline analysis of kernel trace files")]
struct Args {
    /// Name of analysis to execute.
    #[arg(short = 'a', long = "analysis", value_enum, default_value = "count")]
    analysis: AnalysisName,

    /// Type of analysis to execute.
    #[arg(short = 'T', long = "type", value_enum, default_value = "parallel")]
    analysis_type: AnalysisType,

    /// Maximum number of threads to use.
    #[arg(short = 't', long = "thread")]
    threads: Option<usize>,

    /// Output benchmark time in milliseconds.
    #[arg(short = 'b', long = "benchmark")]
    benchmark: bool,

    /// Be verbose.
    #[arg(short = 'V', long = "verbose")]
    verbose: bool,

    /// Split and balance work by packet-index content size rather than
    /// by wall-clock time.
    #[arg(long = "balanced")]
    balanced: bool,

    /// Path to a config file with default flag values.
    #[arg(long = "config", value_name = "PATH", default_value = "tracefold.toml")]
    config: PathBuf,

    /// Run against a small built-in synthetic trace instead of opening
    /// `<path/to/trace>` through a real decoder (none ships in this crate).
    #[arg(long = "demo")]
    demo: bool,

    /// Trace directory path.
    #[arg(value_name = "path/to/trace")]
    trace_path: Option<PathBuf>,
}

fn demo_trace(analysis: AnalysisName) -> FixtureTrace {
    match analysis {
        AnalysisName::Count | AnalysisName::Cpu => {
            FixtureTrace::sched_timeline(vec![1_000, 1_050, 1_100, 1_200, 1_999, 2_500, 3_000])
                .with_bounds(1_000, 3_000)
        }
        AnalysisName::Io => FixtureTrace::syscall_timeline(
            10,
            vec![(1_000, 1_010, 128, 128), (1_200, 1_260, 4096, 4096)],
        ),
    }
}

fn open_source(demo_trace: FixtureTrace) -> impl Fn(&std::path::Path) -> CoreResult<Arc<dyn EventSource>> {
    move |_path: &std::path::Path| Ok(Arc::new(FixtureSource::new(demo_trace.clone())) as Arc<dyn EventSource>)
}

fn print_banner(name: &str, elapsed_ms: Option<u64>) {
    println!("=== {name} analysis ===");
    if let Some(ms) = elapsed_ms {
        println!("Analysis time (ms): {ms}");
    }
}

fn run() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config::load(&args.config).context("failed to load config file")?;
    let threads = args.threads.unwrap_or(config.defaults.threads);
    if threads == 0 {
        bail!("number of threads must be 1 or more");
    }
    let balanced = args.balanced || config.defaults.balanced;

    if args.verbose {
        println!("Opts:");
        println!("  --thread: {threads}");
        println!("  --analysis: {:?}", args.analysis);
        println!("  --type: {:?}", args.analysis_type);
        if let Some(path) = &args.trace_path {
            println!("  <path/to/trace>: {}", path.display());
        }
    }

    if !args.demo && args.trace_path.is_none() {
        bail!("argument '<path/to/trace>' missing");
    }
    if !args.demo {
        bail!(
            "no CTF/LTTng decoder is built into this crate; pass --demo to run against a synthetic trace"
        );
    }

    let trace_path = args.trace_path.unwrap_or_else(|| PathBuf::from("demo"));
    let open = open_source(demo_trace(args.analysis));

    let engine_opts = EngineOptions {
        threads,
        balanced,
        verbose: args.verbose,
        benchmark: args.benchmark,
    };

    match args.analysis {
        AnalysisName::Count => {
            let analyzer = CountAnalyzer;
            let report = dispatch(&analyzer, &trace_path, &open, &args.analysis_type, &engine_opts)?;
            print_banner("count", report.elapsed_ms);
            println!("Total events: {}", tracefold_core::analyses::count::format_total(report.state));
        }
        AnalysisName::Cpu => {
            let analyzer = CpuAnalyzer::new();
            let report = dispatch(&analyzer, &trace_path, &open, &args.analysis_type, &engine_opts)?;
            print_banner("cpu", report.elapsed_ms);
            println!("Top CPUs by busy time:");
            for cpu in report.state.sorted_cpus.iter().take(10) {
                println!("  cpu{:<3} busy_ns={}", cpu.id, cpu.busy_ns);
            }
            println!("Top threads by CPU time:");
            for thread in report.state.sorted_threads.iter().take(10) {
                println!("  tid={:<6} comm={:<16} cpu_ns={}", thread.tid, thread.comm, thread.cpu_ns);
            }
        }
        AnalysisName::Io => {
            let analyzer = IoAnalyzer;
            let report = dispatch(&analyzer, &trace_path, &open, &args.analysis_type, &engine_opts)?;
            print_banner("io", report.elapsed_ms);
            println!("Top threads by read bytes:");
            for t in report.state.by_read.iter().take(10) {
                println!(
                    "  tid={:<6} read_bytes={} read_count={}",
                    t.tid,
                    tracefold_core::util::format_size(t.read_bytes),
                    t.read_count
                );
            }
            println!("Top threads by write bytes:");
            for t in report.state.by_write.iter().take(10) {
                println!(
                    "  tid={:<6} write_bytes={} write_count={}",
                    t.tid,
                    tracefold_core::util::format_size(t.write_bytes),
                    t.write_count
                );
            }
        }
    }

    Ok(())
}

fn dispatch<A>(
    analyzer: &A,
    trace_path: &std::path::Path,
    open: &(impl Fn(&std::path::Path) -> CoreResult<Arc<dyn EventSource>> + Sync),
    analysis_type: &AnalysisType,
    engine_opts: &EngineOptions,
) -> anyhow::Result<RunReport<A::State>>
where
    A: tracefold_core::engine::Analyzer,
{
    let report = match analysis_type {
        AnalysisType::Parallel => run_parallel(analyzer, trace_path, open, engine_opts)?,
        AnalysisType::Serial => run_serial(analyzer, trace_path, open, engine_opts.benchmark)?,
    };
    Ok(report)
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
