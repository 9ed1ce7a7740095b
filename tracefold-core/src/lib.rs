//! Partitioner, map/reduce execution engine and analyzer framework for
//! parallel offline kernel-trace analysis.
//!
//! This crate does not decode CTF/LTTng traces itself — see
//! [`event_source::EventSource`] for the boundary a real decoder
//! implements against. [`fixture`] ships a minimal in-memory source used
//! by this crate's own tests and by the CLI's demo mode.

pub mod analyses;
pub mod clock;
pub mod engine;
pub mod error;
pub mod event_source;
pub mod fixture;
pub mod packet_index;
pub mod partition;
pub mod splitter;
pub mod util;

pub use error::{Error, Result};
pub use event_source::EventSource;
