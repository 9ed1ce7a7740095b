//! Chunk-boundary derivation (spec.md §4.4).
//!
//! The boundaries produced here are raw: `begin` is left exactly at
//! `B + i*step` (or the cut timestamp), with no de-duplication nudge
//! applied. The execution engine applies the `+1ns` convention on
//! non-open `begin` values at map-dispatch time (spec.md §3/§4.4) so the
//! event sitting exactly on a boundary is consumed by the earlier chunk
//! only.

use crate::packet_index::PacketHeader;

/// A chunk boundary. `None` means "open" (from the start, or to the end).
/// For a size-balanced chunk, `stream` names which per-stream source it
/// targets; time-balanced chunks share one source and leave it `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub begin: Option<u64>,
    pub end: Option<u64>,
    pub stream: Option<String>,
}

impl Chunk {
    fn shared(begin: Option<u64>, end: Option<u64>) -> Self {
        Self {
            begin,
            end,
            stream: None,
        }
    }

    fn for_stream(stream: String, begin: Option<u64>, end: Option<u64>) -> Self {
        Self {
            begin,
            end,
            stream: Some(stream),
        }
    }
}

/// Equal time division over `[begin, end)` into `workers` chunks sharing
/// one event source. `workers` must be at least 1. An empty trace
/// (`end <= begin`) yields zero chunks.
pub fn time_balanced(begin: u64, end: u64, workers: usize) -> Vec<Chunk> {
    assert!(workers >= 1, "time_balanced requires at least one worker");
    if end <= begin {
        return Vec::new();
    }
    let step = (end - begin) / workers as u64;
    (0..workers)
        .map(|i| {
            let chunk_begin = if i == 0 {
                None
            } else {
                Some(begin + i as u64 * step)
            };
            let chunk_end = if i == workers - 1 {
                None
            } else {
                Some(begin + (i as u64 + 1) * step)
            };
            Chunk::shared(chunk_begin, chunk_end)
        })
        .collect()
}

/// Equal content-size division, computed independently per stream from
/// its packet index, then combined across streams into one chunk list
/// stable-sorted by `begin` (open-begin sorts first — `Option<u64>`'s
/// `Ord` already treats `None < Some(_)`, which is exactly this rule).
pub fn size_balanced<'a, I>(streams: I) -> Vec<Chunk>
where
    I: IntoIterator<Item = (String, &'a [PacketHeader])>,
{
    let mut chunks = Vec::new();
    for (stream, headers) in streams {
        chunks.extend(size_balanced_one_stream(stream, headers));
    }
    chunks.sort_by_key(|c| c.begin);
    chunks
}

fn size_balanced_one_stream(stream: String, headers: &[PacketHeader]) -> Vec<Chunk> {
    if headers.is_empty() {
        return Vec::new();
    }
    let total_content: u64 = headers.iter().map(|h| h.content_size).sum();
    let target = total_content / headers.len() as u64;

    let mut cuts = Vec::new();
    let mut acc = 0u64;
    // The final packet is always left to the tail chunk.
    for header in &headers[..headers.len() - 1] {
        acc += header.content_size;
        if acc >= target {
            cuts.push(header.ts_real_end);
            acc = 0;
        }
    }

    (0..=cuts.len())
        .map(|i| {
            let begin = if i == 0 { None } else { Some(cuts[i - 1]) };
            let end = if i == cuts.len() {
                None
            } else {
                Some(cuts[i])
            };
            Chunk::for_stream(stream.clone(), begin, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(content_size: u64, ts_real_end: u64) -> PacketHeader {
        PacketHeader {
            offset: 0,
            packet_size: content_size,
            content_size,
            ts_cycles_begin: 0,
            ts_cycles_end: 0,
            ts_real_begin: 0,
            ts_real_end,
            events_discarded: 0,
            stream_id: 0,
        }
    }

    #[test]
    fn time_balanced_four_workers() {
        let chunks = time_balanced(1000, 2000, 4);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].begin, None);
        assert_eq!(chunks[0].end, Some(1250));
        assert_eq!(chunks[1].begin, Some(1250));
        assert_eq!(chunks[1].end, Some(1500));
        assert_eq!(chunks[3].begin, Some(1750));
        assert_eq!(chunks[3].end, None);
    }

    #[test]
    fn time_balanced_single_worker_is_open_open() {
        let chunks = time_balanced(1000, 2000, 1);
        assert_eq!(chunks, vec![Chunk::shared(None, None)]);
    }

    #[test]
    fn empty_trace_yields_zero_chunks() {
        assert!(time_balanced(1000, 1000, 4).is_empty());
        assert!(time_balanced(1000, 900, 4).is_empty());
    }

    #[test]
    fn size_balanced_single_packet_is_one_open_chunk() {
        let headers = vec![header(100, 50)];
        let chunks = size_balanced_one_stream("s0".into(), &headers);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].begin, None);
        assert_eq!(chunks[0].end, None);
    }

    #[test]
    fn size_balanced_cuts_on_mean_target() {
        // total=400, 4 packets -> target=100; packets of size 100 each
        // cut after every packet except the last.
        let headers = vec![
            header(100, 10),
            header(100, 20),
            header(100, 30),
            header(100, 40),
        ];
        let chunks = size_balanced_one_stream("s0".into(), &headers);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].end, Some(10));
        assert_eq!(chunks[1].begin, Some(10));
        assert_eq!(chunks[3].end, None);
    }

    #[test]
    fn combined_streams_sort_with_open_begin_first() {
        let a = vec![header(10, 5), header(10, 15)];
        let b = vec![header(10, 1), header(10, 20)];
        let combined = size_balanced(vec![("a".to_string(), a.as_slice()), ("b".to_string(), b.as_slice())]);
        // Two open-begin chunks (one per stream) must sort before any
        // concrete-begin chunk.
        assert_eq!(combined[0].begin, None);
        assert_eq!(combined[1].begin, None);
        assert!(combined[2].begin.is_some());
    }
}
