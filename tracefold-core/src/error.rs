use thiserror::Error;

/// Errors surfaced by the trace-partitioning and execution-engine core.
///
/// `MissingEvent` and `InternalInvariant` are deliberately non-fatal: an
/// analyzer that encounters either logs a diagnostic and keeps going with
/// degraded semantics (spec.md §7). Every other variant aborts the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("malformed data at offset {at_offset}: {detail}")]
    Decode { at_offset: u64, detail: String },

    #[error("incompatible packet-index version: major={found}, expected 1")]
    IncompatibleVersion { found: u32 },

    #[error("could not prepare per-stream working directory: {0}")]
    Setup(String),

    #[error("event type {name} not present in trace")]
    MissingEvent { name: &'static str },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
