//! CPU analyzer (spec.md §4.8): per-CPU and per-thread runtime from
//! `sched_switch`, with boundary reconciliation across chunks via the
//! "current task / unknown task" pair described in cpucontext.cpp.

use std::collections::HashMap;

use crate::engine::Analyzer;
use crate::event_source::EventSource;

const IDLE_TID: u64 = 0;

#[derive(Debug, Clone, Copy, Default)]
struct Task {
    start: u64,
    tid: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct UnknownTask {
    end: u64,
    tid: u64,
}

#[derive(Debug, Clone, Default)]
struct CpuSlot {
    busy_ns: u64,
    current_task: Option<Task>,
    unknown_task: Option<UnknownTask>,
}

#[derive(Debug, Clone, Default)]
struct ProcessSlot {
    comm: String,
    cpu_ns: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CpuSummary {
    pub id: u32,
    pub busy_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ThreadSummary {
    pub tid: u64,
    pub comm: String,
    pub cpu_ns: u64,
}

/// Per-chunk/merged state for the CPU analyzer.
#[derive(Debug, Clone, Default)]
pub struct CpuState {
    start: Option<u64>,
    end: Option<u64>,
    cpus: HashMap<u32, CpuSlot>,
    processes: HashMap<u64, ProcessSlot>,
    pub sorted_cpus: Vec<CpuSummary>,
    pub sorted_threads: Vec<ThreadSummary>,
}

impl CpuState {
    pub fn busy_ns(&self, cpu: u32) -> u64 {
        self.cpus.get(&cpu).map_or(0, |c| c.busy_ns)
    }

    pub fn cpu_ns(&self, tid: u64) -> u64 {
        self.processes.get(&tid).map_or(0, |p| p.cpu_ns)
    }
}

/// Consumes `sched_switch`. `credit_chunk_zero_edge` controls the open
/// question at §9: whether a task whose end lands in the first chunk to
/// see it, but whose start was never observed, has its partial runtime
/// (from the chunk's start timestamp) credited. The reference code ships
/// this disabled.
pub struct CpuAnalyzer {
    credit_chunk_zero_edge: bool,
}

impl Default for CpuAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuAnalyzer {
    pub fn new() -> Self {
        Self {
            credit_chunk_zero_edge: false,
        }
    }

    pub fn with_credit_chunk_zero_edge(credit_chunk_zero_edge: bool) -> Self {
        Self {
            credit_chunk_zero_edge,
        }
    }
}

impl Analyzer for CpuAnalyzer {
    type State = CpuState;

    fn map(
        &self,
        source: &dyn EventSource,
        begin: Option<u64>,
        end: Option<u64>,
        _verbose: bool,
    ) -> CpuState {
        let mut state = CpuState {
            start: Some(begin.unwrap_or_else(|| source.begin_ns())),
            end: Some(end.unwrap_or_else(|| source.end_ns())),
            ..Default::default()
        };

        let Some(event_id) = crate::util::lookup_kernel_event_id(source, "lttng-kernel", "sched_switch") else {
            log::warn!("sched_switch not present in trace; CPU analysis returns an empty result");
            return state;
        };

        for event in source.iter_between(begin, end) {
            if event.id != event_id {
                continue;
            }
            let ts = event.timestamp;
            let cpu_id = event
                .field("cpu_id")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32;
            let prev_tid = event.field("prev_tid").and_then(|v| v.as_u64()).unwrap_or(0);
            let next_tid = event.field("next_tid").and_then(|v| v.as_u64()).unwrap_or(0);
            let prev_comm = event
                .field("prev_comm")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            let cpu = state.cpus.entry(cpu_id).or_default();

            if let Some(current) = cpu.current_task {
                let delta = ts.saturating_sub(current.start);
                cpu.busy_ns += delta;
                state.processes.entry(current.tid).or_default().cpu_ns += delta;
            } else if prev_tid != IDLE_TID && cpu.unknown_task.is_none() {
                cpu.unknown_task = Some(UnknownTask { end: ts, tid: prev_tid });
            }

            let process = state.processes.entry(prev_tid).or_default();
            process.comm = prev_comm;

            cpu.current_task = if next_tid != IDLE_TID {
                Some(Task { start: ts, tid: next_tid })
            } else {
                None
            };
        }

        state
    }

    fn reduce(&self, acc: &mut CpuState, next: CpuState) {
        acc.start = match (acc.start, next.start) {
            (None, x) => x,
            (x, None) => x,
            (Some(a), Some(b)) => Some(a.min(b)),
        };
        acc.end = match (acc.end, next.end) {
            (None, x) => x,
            (x, None) => x,
            (Some(a), Some(b)) => Some(a.max(b)),
        };

        for (tid, right) in &next.processes {
            let left = acc.processes.entry(*tid).or_default();
            left.cpu_ns += right.cpu_ns;
            left.comm = right.comm.clone();
        }

        let merged_start = acc.start.unwrap_or(0);
        let cpu_ids: Vec<u32> = acc
            .cpus
            .keys()
            .chain(next.cpus.keys())
            .copied()
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();

        for cpu_id in cpu_ids {
            let right = next.cpus.get(&cpu_id).cloned().unwrap_or_default();
            acc.cpus.entry(cpu_id).or_default().busy_ns += right.busy_ns;

            let left_current = acc.cpus.get(&cpu_id).and_then(|c| c.current_task);
            match (left_current, right.unknown_task) {
                (Some(current), Some(unknown)) => {
                    let latency = unknown.end.saturating_sub(current.start);
                    acc.cpus.get_mut(&cpu_id).unwrap().busy_ns += latency;
                    if current.tid == unknown.tid {
                        acc.processes.entry(current.tid).or_default().cpu_ns += latency;
                    } else {
                        log::warn!(
                            "cpu {cpu_id}: mismatch merging current tid={} with unknown tid={}",
                            current.tid,
                            unknown.tid
                        );
                    }
                    acc.cpus.get_mut(&cpu_id).unwrap().current_task = right.current_task;
                }
                (Some(_), None) => {
                    // Task crosses more than one chunk, or ends after the
                    // last chunk: keep acc's current_task untouched.
                }
                (None, Some(unknown)) => {
                    if self.credit_chunk_zero_edge {
                        let latency = unknown.end.saturating_sub(merged_start);
                        acc.cpus.get_mut(&cpu_id).unwrap().busy_ns += latency;
                        acc.processes.entry(unknown.tid).or_default().cpu_ns += latency;
                    }
                    acc.cpus.get_mut(&cpu_id).unwrap().current_task = right.current_task;
                }
                (None, None) => {
                    acc.cpus.get_mut(&cpu_id).unwrap().current_task = right.current_task;
                }
            }
        }
    }

    fn finalize(&self, state: &mut CpuState) {
        let end = state.end.unwrap_or(0);
        let cpu_ids: Vec<u32> = state.cpus.keys().copied().collect();
        for cpu_id in cpu_ids {
            let current = state.cpus.get(&cpu_id).and_then(|c| c.current_task);
            if let Some(current) = current {
                let delta = end.saturating_sub(current.start);
                state.cpus.get_mut(&cpu_id).unwrap().busy_ns += delta;
                state.processes.entry(current.tid).or_default().cpu_ns += delta;
                state.cpus.get_mut(&cpu_id).unwrap().current_task = None;
            }
        }

        state.sorted_cpus = state
            .cpus
            .iter()
            .map(|(id, slot)| CpuSummary {
                id: *id,
                busy_ns: slot.busy_ns,
            })
            .collect();
        state.sorted_cpus.sort_by(|a, b| b.busy_ns.cmp(&a.busy_ns));

        state.sorted_threads = state
            .processes
            .iter()
            .filter(|(tid, _)| **tid != IDLE_TID)
            .map(|(tid, p)| ThreadSummary {
                tid: *tid,
                comm: p.comm.clone(),
                cpu_ns: p.cpu_ns,
            })
            .collect();
        state.sorted_threads.sort_by(|a, b| b.cpu_ns.cmp(&a.cpu_ns));
    }

    fn ordered_reduce(&self) -> bool {
        true
    }
}
