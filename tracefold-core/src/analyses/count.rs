//! Count analyzer (spec.md §4.7): the simplest possible analysis, used
//! mainly to exercise the engine itself.

use crate::engine::Analyzer;
use crate::event_source::EventSource;

pub struct CountAnalyzer;

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

/// Render with thousands separators, e.g. `1234567` -> `1,234,567`.
pub fn format_total(total: u64) -> String {
    let digits = total.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{run_parallel, run_serial, EngineOptions};
    use crate::fixture::{FixtureSource, FixtureTrace};
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn s1_count_scenario() {
        let trace = FixtureTrace::sched_timeline(vec![1000, 1050, 1100, 1200, 1999]);
        let open = move |_p: &Path| {
            Ok(Arc::new(FixtureSource::new(trace.clone())) as Arc<dyn EventSource>)
        };
        let opts = EngineOptions {
            threads: 4,
            balanced: false,
            verbose: false,
            benchmark: false,
        };
        let report = run_parallel(&CountAnalyzer, Path::new("."), &open, &opts).unwrap();
        assert_eq!(report.state, 5);
    }

    #[test]
    fn parallel_matches_serial_for_any_worker_count() {
        let trace = FixtureTrace::sched_timeline(vec![1000, 1050, 1100, 1200, 1999]);
        let open = move |_p: &Path| {
            Ok(Arc::new(FixtureSource::new(trace.clone())) as Arc<dyn EventSource>)
        };
        for threads in [1, 2, 3, 8] {
            let opts = EngineOptions {
                threads,
                balanced: false,
                verbose: false,
                benchmark: false,
            };
            let parallel = run_parallel(&CountAnalyzer, Path::new("."), &open, &opts).unwrap();
            let serial = run_serial(&CountAnalyzer, Path::new("."), &open, false).unwrap();
            assert_eq!(parallel.state, serial.state);
        }
    }

    #[test]
    fn groups_digits_by_thousands() {
        assert_eq!(format_total(5), "5");
        assert_eq!(format_total(1234), "1,234");
        assert_eq!(format_total(1_234_567), "1,234,567");
    }
}
