//! Shared data types for the swinging-door trending compression engine.
//!
//! This crate is deliberately tiny: it holds the one type (`DataPoint`)
//! that every other `sdt-*` crate passes around, plus the wire timestamp
//! format and equality tolerance the rest of the workspace is built on.

use std::fmt;

use chrono::NaiveDateTime;

/// Half-width of the tolerance band used by [`DataPoint`]'s `PartialEq`.
///
/// Two points are considered equal when their timestamps match exactly
/// and their values differ by less than this amount.
pub const EQ_EPSILON: f64 = 1e-5;

/// The wire format expected by the row store: `YYYY-MM-DD HH:MM:SS`.
pub const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An immutable `(timestamp, value)` pair.
///
/// Ordered by timestamp. Equality compares timestamps exactly and values
/// within [`EQ_EPSILON`] — never derive `PartialEq` for this type, since
/// that would compare `value` bit-for-bit.
#[derive(Debug, Clone, Copy)]
pub struct DataPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

impl DataPoint {
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Format the timestamp the way the row store expects it on the wire.
    pub fn format_timestamp(&self) -> String {
        self.timestamp.format(WIRE_TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.format_timestamp(), self.value)
    }
}

impl PartialEq for DataPoint {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && (self.value - other.value).abs() < EQ_EPSILON
    }
}

impl PartialOrd for DataPoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.timestamp.cmp(&other.timestamp))
    }
}
