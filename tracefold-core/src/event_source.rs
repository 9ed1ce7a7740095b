//! The external "event source" collaborator (spec.md §6).
//!
//! The CTF/LTTng decoder that actually walks a trace directory is out of
//! scope for this crate (spec.md §1) — it is reached only through this
//! trait. [`crate::fixture`] ships a tiny in-memory implementation used by
//! this crate's own tests and by the CLI's `--demo` mode; a real decoder
//! (e.g. a babeltrace binding) implements the same trait.

use std::collections::HashMap;

pub type EventId = u32;

/// A typed field value as exposed by the trace's event-field accessors.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    UInteger(u64),
    Integer(i64),
    Str(String),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UInteger(v) => Some(*v),
            FieldValue::Integer(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::UInteger(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A single decoded trace event.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub id: EventId,
    pub name: String,
    pub timestamp: u64,
    fields: HashMap<String, FieldValue>,
}

impl TraceEvent {
    pub fn new(id: EventId, name: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id,
            name: name.into(),
            timestamp,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Contract for a single-trace (or single-stream) event source.
///
/// A source is opened once per chunk group (spec.md §4.6) and then
/// shared read-only (`&self`, never `&mut self`) across every chunk
/// worker that targets it — there is no live cursor to race on, so
/// sharing by reference across threads is sound as long as the
/// implementation is internally `Sync`.
pub trait EventSource: Send + Sync {
    fn begin_ns(&self) -> u64;
    fn end_ns(&self) -> u64;

    /// Clock metadata for converting this trace's packet-index cycle
    /// timestamps to wall-clock nanoseconds (spec.md §4.2). Defaults to
    /// an identity 1GHz clock for sources that don't otherwise expose one.
    fn clock(&self) -> crate::clock::ClockInfo {
        crate::clock::ClockInfo::new(1_000_000_000, 0, 0)
    }

    /// All events in timestamp order.
    fn iter(&self) -> Box<dyn Iterator<Item = TraceEvent> + '_> {
        self.iter_between(None, None)
    }

    /// Events with `begin < timestamp <= end`, each side open when `None`.
    fn iter_between(
        &self,
        begin: Option<u64>,
        end: Option<u64>,
    ) -> Box<dyn Iterator<Item = TraceEvent> + '_>;

    /// Look up an event-type id by name, restricted to `lttng-kernel`
    /// trace domains; `None` if the trace carries no such event type.
    fn lookup_event_id(&self, name: &str) -> Option<EventId>;
}
