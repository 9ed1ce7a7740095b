//! Small shared helpers used across analyses and the CLI.

/// Restrict event-type lookup to the `lttng-kernel` domain, matching the
/// original reference's `TraceSet::getEventId`: any other domain simply
/// never resolves.
pub fn lookup_kernel_event_id(
    source: &dyn crate::event_source::EventSource,
    domain: &str,
    name: &str,
) -> Option<crate::event_source::EventId> {
    if domain != "lttng-kernel" {
        return None;
    }
    source.lookup_event_id(name)
}

/// Render a byte count the way a human reads it: binary units, one
/// decimal place, nothing past "GiB".
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_whole_bytes_without_decimal() {
        assert_eq!(format_size(512), "512 B");
    }

    #[test]
    fn formats_kibibytes() {
        assert_eq!(format_size(2048), "2.0 KiB");
    }

    #[test]
    fn formats_gibibytes() {
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn non_kernel_domain_never_resolves() {
        use crate::fixture::{FixtureSource, FixtureTrace};
        let source = FixtureSource::new(FixtureTrace::sched_timeline(vec![1]));
        assert_eq!(lookup_kernel_event_id(&source, "ust", "sched_switch"), None);
    }
}
