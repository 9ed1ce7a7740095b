//! I/O analyzer (spec.md §4.9): per-thread read/write byte and latency
//! totals, pairing syscall entries with their exits, with the same
//! current/unknown boundary-reconciliation shape as the CPU analyzer.

use std::collections::HashMap;

use crate::engine::Analyzer;
use crate::event_source::EventSource;

const READ_ENTRIES: &[&str] = &[
    "sys_read",
    "syscall_entry_read",
    "sys_recvmsg",
    "syscall_entry_recvmsg",
    "sys_recvfrom",
    "syscall_entry_recvfrom",
    "sys_readv",
    "syscall_entry_readv",
];

const WRITE_ENTRIES: &[&str] = &[
    "sys_write",
    "syscall_entry_write",
    "sys_sendmsg",
    "syscall_entry_sendmsg",
    "sys_sendto",
    "syscall_entry_sendto",
    "sys_writev",
    "syscall_entry_writev",
];

const MIXED_ENTRIES: &[&str] = &[
    "sys_splice",
    "syscall_entry_splice",
    "sys_sendfile64",
    "syscall_entry_sendfile64",
];

const EXIT_NAME: &str = "exit_syscall";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Read,
    Write,
    ReadWrite,
}

impl Kind {
    fn credits_read(self) -> bool {
        matches!(self, Kind::Read | Kind::ReadWrite)
    }

    fn credits_write(self) -> bool {
        matches!(self, Kind::Write | Kind::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy)]
struct CurrentSyscall {
    kind: Kind,
    start: u64,
}

#[derive(Debug, Clone, Copy)]
struct UnknownSyscall {
    end: u64,
    ret: i64,
}

#[derive(Debug, Clone, Default)]
struct ThreadSlot {
    read_bytes: u64,
    write_bytes: u64,
    read_count: u64,
    write_count: u64,
    total_read_latency_ns: u64,
    total_write_latency_ns: u64,
    current_syscall: Option<CurrentSyscall>,
    unknown_syscall: Option<UnknownSyscall>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ThreadIoSummary {
    pub tid: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_count: u64,
    pub write_count: u64,
    pub total_read_latency_ns: u64,
    pub total_write_latency_ns: u64,
}

/// Per-chunk/merged state for the I/O analyzer.
#[derive(Debug, Clone, Default)]
pub struct IoState {
    threads: HashMap<u64, ThreadSlot>,
    pub by_read: Vec<ThreadIoSummary>,
    pub by_write: Vec<ThreadIoSummary>,
}

impl IoState {
    pub fn thread(&self, tid: u64) -> Option<ThreadIoSummary> {
        self.threads.get(&tid).map(|s| to_summary(tid, s))
    }
}

fn to_summary(tid: u64, s: &ThreadSlot) -> ThreadIoSummary {
    ThreadIoSummary {
        tid,
        read_bytes: s.read_bytes,
        write_bytes: s.write_bytes,
        read_count: s.read_count,
        write_count: s.write_count,
        total_read_latency_ns: s.total_read_latency_ns,
        total_write_latency_ns: s.total_write_latency_ns,
    }
}

fn credit(slot: &mut ThreadSlot, kind: Kind, ret: i64, latency: u64) {
    if ret < 0 {
        return;
    }
    let bytes = ret as u64;
    if kind.credits_read() {
        slot.read_bytes += bytes;
        slot.read_count += 1;
        slot.total_read_latency_ns += latency;
    }
    if kind.credits_write() {
        slot.write_bytes += bytes;
        slot.write_count += 1;
        slot.total_write_latency_ns += latency;
    }
}

#[derive(Default)]
pub struct IoAnalyzer;

impl Analyzer for IoAnalyzer {
    type State = IoState;

    fn map(
        &self,
        source: &dyn EventSource,
        begin: Option<u64>,
        end: Option<u64>,
        _verbose: bool,
    ) -> IoState {
        let mut state = IoState::default();

        let lookup = |name: &str| crate::util::lookup_kernel_event_id(source, "lttng-kernel", name);
        let read_ids: Vec<_> = READ_ENTRIES.iter().filter_map(|n| lookup(n)).collect();
        let write_ids: Vec<_> = WRITE_ENTRIES.iter().filter_map(|n| lookup(n)).collect();
        let mixed_ids: Vec<_> = MIXED_ENTRIES.iter().filter_map(|n| lookup(n)).collect();
        let exit_id = lookup(EXIT_NAME);

        if read_ids.is_empty() && write_ids.is_empty() && mixed_ids.is_empty() && exit_id.is_none() {
            log::warn!("no I/O syscall events present in trace; I/O analysis returns an empty result");
            return state;
        }

        for event in source.iter_between(begin, end) {
            let tid = event.field("tid").and_then(|v| v.as_u64()).unwrap_or(0);
            let ts = event.timestamp;

            let kind = if read_ids.contains(&event.id) {
                Some(Kind::Read)
            } else if write_ids.contains(&event.id) {
                Some(Kind::Write)
            } else if mixed_ids.contains(&event.id) {
                Some(Kind::ReadWrite)
            } else {
                None
            };

            if let Some(kind) = kind {
                let slot = state.threads.entry(tid).or_default();
                slot.current_syscall = Some(CurrentSyscall { kind, start: ts });
                continue;
            }

            if Some(event.id) == exit_id {
                let ret = event.field("ret").and_then(|v| v.as_i64()).unwrap_or(-1);
                let slot = state.threads.entry(tid).or_default();
                if let Some(current) = slot.current_syscall.take() {
                    let latency = ts.saturating_sub(current.start);
                    credit(slot, current.kind, ret, latency);
                } else if slot.unknown_syscall.is_none() {
                    slot.unknown_syscall = Some(UnknownSyscall { end: ts, ret });
                }
            }
        }

        state
    }

    fn reduce(&self, acc: &mut IoState, next: IoState) {
        for (tid, right) in next.threads {
            let left = acc.threads.entry(tid).or_default();
            left.read_bytes += right.read_bytes;
            left.write_bytes += right.write_bytes;
            left.read_count += right.read_count;
            left.write_count += right.write_count;
            left.total_read_latency_ns += right.total_read_latency_ns;
            left.total_write_latency_ns += right.total_write_latency_ns;

            if let (Some(current), Some(unknown)) = (left.current_syscall, right.unknown_syscall) {
                let latency = unknown.end.saturating_sub(current.start);
                credit(left, current.kind, unknown.ret, latency);
            }

            left.current_syscall = right.current_syscall;
        }
    }

    fn finalize(&self, state: &mut IoState) {
        state.by_read = state
            .threads
            .iter()
            .map(|(tid, s)| to_summary(*tid, s))
            .collect();
        state.by_read.sort_by(|a, b| b.read_bytes.cmp(&a.read_bytes));

        state.by_write = state
            .threads
            .iter()
            .map(|(tid, s)| to_summary(*tid, s))
            .collect();
        state.by_write.sort_by(|a, b| b.write_bytes.cmp(&a.write_bytes));
    }

    fn ordered_reduce(&self) -> bool {
        true
    }
}
