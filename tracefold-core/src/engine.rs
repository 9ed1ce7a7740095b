//! Analyzer contract and map/reduce execution engine (spec.md §4.5-§4.6).

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::error::{Error, Result};
use crate::event_source::EventSource;
use crate::packet_index;
use crate::partition::{self, Chunk};
use crate::splitter;

/// The contract every analysis implements.
///
/// `reduce` must be associative; if [`Analyzer::ordered_reduce`] returns
/// `false` it must also be commutative, since the engine is then free to
/// fold results in any order.
pub trait Analyzer: Sync {
    type State: Send + Default;

    /// Consume events from `source` in `(begin, end]` and produce a
    /// partial result. `begin`/`end` are `None` at the open extremes.
    fn map(
        &self,
        source: &dyn EventSource,
        begin: Option<u64>,
        end: Option<u64>,
        verbose: bool,
    ) -> Self::State;

    /// Fold `next` into `acc`.
    fn reduce(&self, acc: &mut Self::State, next: Self::State);

    /// Post-reduction adjustment (sorting, resolving lingering "current"
    /// items). Called exactly once, after every chunk has been folded in.
    fn finalize(&self, state: &mut Self::State) {
        let _ = state;
    }

    /// If `true`, chunks are folded in ascending chunk order.
    fn ordered_reduce(&self) -> bool;
}

/// How to partition and run an analysis.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub threads: usize,
    /// `true` selects size-balanced partitioning; `false` time-balanced.
    pub balanced: bool,
    pub verbose: bool,
    pub benchmark: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 4,
            balanced: false,
            verbose: false,
            benchmark: false,
        }
    }
}

/// Result of a run: the finalized analyzer state, plus wall-clock
/// milliseconds when `EngineOptions::benchmark` was set.
#[derive(Debug)]
pub struct RunReport<S> {
    pub state: S,
    pub elapsed_ms: Option<u64>,
}

type OpenFn<'a> = dyn Fn(&Path) -> Result<Arc<dyn EventSource>> + 'a;

/// +1ns nudge on a concrete `begin` so the event sitting exactly on a
/// chunk boundary is consumed by the earlier chunk only (spec.md §4.4).
fn effective_bounds(chunk: &Chunk) -> (Option<u64>, Option<u64>) {
    (chunk.begin.map(|b| b + 1), chunk.end)
}

/// Run an analyzer to completion, in parallel, per `options`.
///
/// `open` opens an [`EventSource`] rooted at a directory — the original
/// trace directory in time-balanced mode, or one of the per-stream
/// working directories the [`splitter`] materializes in size-balanced
/// mode. It is the caller's bridge to a concrete CTF/LTTng decoder.
pub fn run_parallel<A>(
    analyzer: &A,
    trace_dir: &Path,
    open: &OpenFn<'_>,
    options: &EngineOptions,
) -> Result<RunReport<A::State>>
where
    A: Analyzer,
{
    let clock_start = Instant::now();
    let threads = options.threads.max(1);

    // Steps 1-3: derive chunks and open one source per chunk group. The
    // working set (if any) must outlive the map/reduce phase below.
    let mut working_set_guard = None;
    let (chunks, sources): (Vec<Chunk>, HashMap<Option<String>, Arc<dyn EventSource>>) =
        if options.balanced {
            let working_set = splitter::prepare(trace_dir)?;
            let mut per_stream_headers = Vec::new();
            let mut sources = HashMap::new();
            for stream_dir in &working_set.streams {
                let source = open(&stream_dir.dir)?;
                let idx_path = stream_dir
                    .dir
                    .join("index")
                    .join(format!("{}.idx", stream_dir.name));
                let file = File::open(&idx_path)?;
                let headers = packet_index::decode(BufReader::new(file), &source.clock())?;
                per_stream_headers.push((stream_dir.name.clone(), headers));
                sources.insert(Some(stream_dir.name.clone()), source);
            }
            let chunks = partition::size_balanced(
                per_stream_headers
                    .iter()
                    .map(|(name, headers)| (name.clone(), headers.as_slice())),
            );
            working_set_guard = Some(working_set);
            (chunks, sources)
        } else {
            let source = open(trace_dir)?;
            let chunks = partition::time_balanced(source.begin_ns(), source.end_ns(), threads);
            let mut sources = HashMap::new();
            sources.insert(None, source);
            (chunks, sources)
        };

    if chunks.is_empty() {
        let mut state = A::State::default();
        analyzer.finalize(&mut state);
        drop(working_set_guard);
        return Ok(RunReport {
            state,
            elapsed_ms: options.benchmark.then(|| clock_start.elapsed().as_millis() as u64),
        });
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Setup(e.to_string()))?;

    let verbose = options.verbose;
    let ordered = analyzer.ordered_reduce();
    let map_one = |chunk: &Chunk| -> A::State {
        let source = sources
            .get(&chunk.stream)
            .expect("every chunk targets a source opened for its stream group");
        let (begin, end) = effective_bounds(chunk);
        analyzer.map(source.as_ref(), begin, end, verbose)
    };

    let mut state = pool.install(|| {
        if ordered {
            let mapped: Vec<A::State> = chunks.par_iter().map(map_one).collect();
            let mut acc = A::State::default();
            for next in mapped {
                analyzer.reduce(&mut acc, next);
            }
            acc
        } else {
            chunks
                .par_iter()
                .map(map_one)
                .reduce(A::State::default, |mut acc, next| {
                    analyzer.reduce(&mut acc, next);
                    acc
                })
        }
    });

    analyzer.finalize(&mut state);

    // Working directory teardown happens here, after finalize, win or lose.
    drop(working_set_guard);

    Ok(RunReport {
        state,
        elapsed_ms: options.benchmark.then(|| clock_start.elapsed().as_millis() as u64),
    })
}

/// Serial baseline: open the trace once, run the analyzer's map over the
/// whole event range as a single implicit chunk, finalize, return.
pub fn run_serial<A>(
    analyzer: &A,
    trace_dir: &Path,
    open: &OpenFn<'_>,
    benchmark: bool,
) -> Result<RunReport<A::State>>
where
    A: Analyzer,
{
    let clock_start = Instant::now();
    let source = open(trace_dir)?;
    let mut state = analyzer.map(source.as_ref(), None, None, false);
    analyzer.finalize(&mut state);
    Ok(RunReport {
        state,
        elapsed_ms: benchmark.then(|| clock_start.elapsed().as_millis() as u64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{FixtureSource, FixtureTrace};

    struct CountAnalyzer;

    impl Analyzer for CountAnalyzer {
        type State = u64;

        fn map(
            &self,
            source: &dyn EventSource,
            begin: Option<u64>,
            end: Option<u64>,
            _verbose: bool,
        ) -> u64 {
            source.iter_between(begin, end).count() as u64
        }

        fn reduce(&self, acc: &mut u64, next: u64) {
            *acc += next;
        }

        fn ordered_reduce(&self) -> bool {
            false
        }
    }

    fn open_fixture(trace: FixtureTrace) -> impl Fn(&Path) -> Result<Arc<dyn EventSource>> {
        move |_path: &Path| Ok(Arc::new(FixtureSource::new(trace.clone())) as Arc<dyn EventSource>)
    }

    #[test]
    fn parallel_count_matches_serial_count() {
        let trace = FixtureTrace::sched_timeline(vec![1000, 1050, 1100, 1200, 1999]);
        let opts = EngineOptions {
            threads: 4,
            balanced: false,
            verbose: false,
            benchmark: false,
        };
        let parallel = run_parallel(&CountAnalyzer, Path::new("."), &open_fixture(trace.clone()), &opts).unwrap();
        let serial = run_serial(&CountAnalyzer, Path::new("."), &open_fixture(trace), false).unwrap();
        assert_eq!(parallel.state, serial.state);
        assert_eq!(parallel.state, 5);
    }

    #[test]
    fn empty_trace_returns_default_state() {
        let trace = FixtureTrace::sched_timeline(vec![]).with_bounds(1000, 1000);
        let opts = EngineOptions::default();
        let result = run_parallel(&CountAnalyzer, Path::new("."), &open_fixture(trace), &opts).unwrap();
        assert_eq!(result.state, 0);
    }
}
