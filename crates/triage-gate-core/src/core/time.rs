// crates/triage-gate-core/src/core/time.rs
// ============================================================================
// Module: Triage Gate Time
// Description: Wall-clock timestamp helpers shared across the workspace.
// Purpose: Provide one place that produces UTC timestamps for persisted rows.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Every persisted row (`createdAt`, `updatedAt`, `analyzedAt`) is stamped with
//! real UTC wall-clock time, not a logical or replay clock: audit trails for
//! criticality decisions must correlate with actual calendar time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Timestamp type used for all persisted and wire-level date/time fields.
pub type Timestamp = OffsetDateTime;

/// Returns the current wall-clock time in UTC.
#[must_use]
pub fn now_utc() -> Timestamp {
    OffsetDateTime::now_utc()
}

/// Formats a timestamp as RFC 3339 for wire responses and JSON columns.
///
/// # Errors
///
/// Returns an error if the timestamp cannot be formatted (only possible for
/// timestamps outside the representable calendar range).
pub fn to_rfc3339(ts: Timestamp) -> Result<String, time::error::Format> {
    ts.format(&Rfc3339)
}

/// Parses an RFC 3339 timestamp as produced by [`to_rfc3339`].
///
/// # Errors
///
/// Returns an error if `value` is not a valid RFC 3339 timestamp.
pub fn parse_rfc3339(value: &str) -> Result<Timestamp, time::error::Parse> {
    OffsetDateTime::parse(value, &Rfc3339)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use super::now_utc;
    use super::parse_rfc3339;
    use super::to_rfc3339;

    #[test]
    fn round_trips_through_rfc3339() {
        let now = now_utc();
        let formatted = to_rfc3339(now).expect("formatting a fresh timestamp never fails");
        let parsed = parse_rfc3339(&formatted).expect("round-tripping a just-formatted value");
        assert_eq!(now.unix_timestamp(), parsed.unix_timestamp());
    }
}
