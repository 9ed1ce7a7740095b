//! Packet-index (`.idx`) sidecar decoder (spec.md §4.1).
//!
//! On-disk layout is fixed and big-endian. The file header is 16 bytes;
//! each following record is `packet_index_len` bytes, of which the first
//! 56 encode the fields below — `packet_index_len` may exceed 56 on
//! traces produced by newer CTF tooling, in which case the trailing bytes
//! of each record are simply skipped.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Cursor, Read, Write};

use crate::clock::ClockInfo;
use crate::error::{Error, Result};

const MAGIC: u32 = 0xC1F1DCC1;
const SUPPORTED_MAJOR: u32 = 1;
const RECORD_FIELDS_LEN: u32 = 56;

/// One decoded packet-index record, with cycle timestamps already
/// converted to wall-clock nanoseconds via the trace's [`ClockInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub offset: u64,
    pub packet_size: u64,
    pub content_size: u64,
    pub ts_cycles_begin: u64,
    pub ts_cycles_end: u64,
    pub ts_real_begin: u64,
    pub ts_real_end: u64,
    pub events_discarded: u64,
    pub stream_id: u64,
}

/// Decode every record of one stream's `.idx` file.
///
/// Returns the ordered packet headers, in on-disk order (which is
/// already monotonic in `offset` and `ts_real_begin`). A truncated
/// trailing record is not an error: decoding simply stops, matching how
/// a sequential C reader naturally behaves on a partially-flushed index.
pub fn decode<R: Read>(mut reader: R, clock: &ClockInfo) -> Result<Vec<PacketHeader>> {
    let magic = reader.read_u32::<BigEndian>()?;
    if magic != MAGIC {
        return Err(Error::Decode {
            at_offset: 0,
            detail: format!("bad magic: {magic:#x}"),
        });
    }
    let major = reader.read_u32::<BigEndian>()?;
    let minor = reader.read_u32::<BigEndian>()?;
    let _ = minor;
    if major != SUPPORTED_MAJOR {
        return Err(Error::IncompatibleVersion { found: major });
    }
    let packet_index_len = reader.read_u32::<BigEndian>()?;
    if packet_index_len < RECORD_FIELDS_LEN {
        return Err(Error::Decode {
            at_offset: 12,
            detail: format!(
                "packet_index_len {packet_index_len} is smaller than the {RECORD_FIELDS_LEN}-byte record"
            ),
        });
    }

    let mut headers = Vec::new();
    let mut record_offset: u64 = 16;
    let mut buf = vec![0u8; packet_index_len as usize];
    loop {
        match read_full(&mut reader, &mut buf) {
            Ok(true) => {}
            Ok(false) => break, // truncated trailing record: stop, not an error
            Err(e) => {
                return Err(Error::Decode {
                    at_offset: record_offset,
                    detail: e.to_string(),
                });
            }
        }

        let mut cursor = Cursor::new(&buf[..RECORD_FIELDS_LEN as usize]);
        let offset = cursor.read_u64::<BigEndian>()?;
        let packet_size = cursor.read_u64::<BigEndian>()?;
        let content_size = cursor.read_u64::<BigEndian>()?;
        let ts_cycles_begin = cursor.read_u64::<BigEndian>()?;
        let ts_cycles_end = cursor.read_u64::<BigEndian>()?;
        let events_discarded = cursor.read_u64::<BigEndian>()?;
        let stream_id = cursor.read_u64::<BigEndian>()?;

        headers.push(PacketHeader {
            offset,
            packet_size,
            content_size,
            ts_cycles_begin,
            ts_cycles_end,
            ts_real_begin: clock.absolute_ns(ts_cycles_begin),
            ts_real_end: clock.absolute_ns(ts_cycles_end),
            events_discarded,
            stream_id,
        });

        record_offset += packet_index_len as u64;
    }

    Ok(headers)
}

/// Fill `buf` completely; returns `Ok(false)` on a clean EOF with zero
/// bytes read (the normal end of a well-formed file), `Ok(true)` on a
/// full read, and propagates any other I/O error including a partial
/// read hitting EOF mid-record (a genuinely truncated record).
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => {
                if total == 0 {
                    return Ok(false);
                }
                return Ok(false); // truncated trailing record: treat like clean stop
            }
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Encode a synthetic packet-index file, for round-trip tests only; the
/// analysis path never writes index files.
pub fn encode<W: Write>(mut writer: W, packet_index_len: u32, records: &[RawRecord]) -> io::Result<()> {
    writer.write_u32::<BigEndian>(MAGIC)?;
    writer.write_u32::<BigEndian>(SUPPORTED_MAJOR)?;
    writer.write_u32::<BigEndian>(0)?;
    writer.write_u32::<BigEndian>(packet_index_len)?;
    for r in records {
        writer.write_u64::<BigEndian>(r.offset)?;
        writer.write_u64::<BigEndian>(r.packet_size)?;
        writer.write_u64::<BigEndian>(r.content_size)?;
        writer.write_u64::<BigEndian>(r.ts_cycles_begin)?;
        writer.write_u64::<BigEndian>(r.ts_cycles_end)?;
        writer.write_u64::<BigEndian>(r.events_discarded)?;
        writer.write_u64::<BigEndian>(r.stream_id)?;
        let padding = (packet_index_len as usize).saturating_sub(RECORD_FIELDS_LEN as usize);
        if padding > 0 {
            writer.write_all(&vec![0u8; padding])?;
        }
    }
    Ok(())
}

/// Pre-conversion record fields, as they appear on disk (cycle domain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    pub offset: u64,
    pub packet_size: u64,
    pub content_size: u64,
    pub ts_cycles_begin: u64,
    pub ts_cycles_end: u64,
    pub events_discarded: u64,
    pub stream_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_CLOCK: ClockInfo = ClockInfo::new(1_000_000_000, 0, 0);

    fn sample_records() -> Vec<RawRecord> {
        vec![
            RawRecord {
                offset: 0,
                packet_size: 4096 * 8,
                content_size: 4000 * 8,
                ts_cycles_begin: 100,
                ts_cycles_end: 200,
                events_discarded: 0,
                stream_id: 1,
            },
            RawRecord {
                offset: 4096,
                packet_size: 4096 * 8,
                content_size: 3500 * 8,
                ts_cycles_begin: 200,
                ts_cycles_end: 300,
                events_discarded: 0,
                stream_id: 1,
            },
        ]
    }

    #[test]
    fn decodes_well_formed_index() {
        let mut buf = Vec::new();
        encode(&mut buf, 56, &sample_records()).unwrap();
        let headers = decode(Cursor::new(buf), &IDENTITY_CLOCK).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].offset, 0);
        assert_eq!(headers[0].content_size, 4000 * 8);
        assert_eq!(headers[1].ts_real_begin, 200);
        assert_eq!(headers[1].stream_id, 1);
    }

    #[test]
    fn tolerates_padded_records() {
        let mut buf = Vec::new();
        encode(&mut buf, 64, &sample_records()).unwrap();
        let headers = decode(Cursor::new(buf), &IDENTITY_CLOCK).unwrap();
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = Vec::new();
        encode(&mut buf, 56, &sample_records()).unwrap();
        buf[0] = 0;
        let err = decode(Cursor::new(buf), &IDENTITY_CLOCK).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn rejects_incompatible_major_version() {
        let mut buf = Vec::new();
        encode(&mut buf, 56, &sample_records()).unwrap();
        buf[4..8].copy_from_slice(&2u32.to_be_bytes());
        let err = decode(Cursor::new(buf), &IDENTITY_CLOCK).unwrap_err();
        assert!(matches!(err, Error::IncompatibleVersion { found: 2 }));
    }

    #[test]
    fn rejects_zero_length() {
        let mut buf = Vec::new();
        encode(&mut buf, 56, &sample_records()).unwrap();
        buf[12..16].copy_from_slice(&0u32.to_be_bytes());
        let err = decode(Cursor::new(buf), &IDENTITY_CLOCK).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn rejects_length_shorter_than_one_record() {
        let mut buf = Vec::new();
        encode(&mut buf, 56, &sample_records()).unwrap();
        buf[12..16].copy_from_slice(&40u32.to_be_bytes());
        let err = decode(Cursor::new(buf), &IDENTITY_CLOCK).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn stops_silently_on_truncated_trailing_record() {
        let mut buf = Vec::new();
        encode(&mut buf, 56, &sample_records()).unwrap();
        buf.truncate(buf.len() - 10); // chop off part of the last record
        let headers = decode(Cursor::new(buf), &IDENTITY_CLOCK).unwrap();
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let mut original = Vec::new();
        encode(&mut original, 56, &sample_records()).unwrap();
        let headers = decode(Cursor::new(original.clone()), &IDENTITY_CLOCK).unwrap();
        let reencoded_records: Vec<RawRecord> = headers
            .iter()
            .map(|h| RawRecord {
                offset: h.offset,
                packet_size: h.packet_size,
                content_size: h.content_size,
                ts_cycles_begin: h.ts_cycles_begin,
                ts_cycles_end: h.ts_cycles_end,
                events_discarded: h.events_discarded,
                stream_id: h.stream_id,
            })
            .collect();
        let mut reencoded = Vec::new();
        encode(&mut reencoded, 56, &reencoded_records).unwrap();
        assert_eq!(original, reencoded);
    }
}
