//! Library crate for proxy-ping-rs: parse proxy lists, probe them under a concurrency
//! ceiling, and rank the ones that answer.
pub mod aggregator;
pub mod config;
pub mod descriptor;
pub mod direct;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod types;

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Current UTC time as RFC 3339, used to stamp probe outcomes.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
