//! The row-store interface the compression engine is shimmed against,
//! plus an in-memory reference implementation used by tests and
//! doctests.
//!
//! The real relational store behind [`RowStore`] is explicitly out of
//! scope for this workspace — it is an external collaborator reached
//! only through its interface; this crate defines that contract and
//! exercises it, it does not implement a production store.

mod in_memory;

use chrono::NaiveDateTime;
use sdt_types::DataPoint;

pub use in_memory::InMemoryRowStore;

/// Direction passed to [`RowStore::closest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The closest row with `timestamp <= t`.
    LessOrEqual,
    /// The closest row with `timestamp >= t`.
    GreaterOrEqual,
}

/// The contract the compression/interpolation core is shimmed against.
///
/// Implementors provide ordered range reads and point writes over
/// `(timestamp, value)` tables, plus a small metadata surface for
/// persisting each table's `dev_margin` across sessions.
pub trait RowStore {
    /// Error type surfaced by this store's operations.
    type Error: std::error::Error;
    /// Owned iterator returned by [`RowStore::scan`]. Must yield rows in
    /// strictly increasing timestamp order; the interpolation layer
    /// relies on this and reports [`sdt_engine::error::InterpolationError::ProtocolViolation`]
    /// if it observes otherwise.
    type Rows: Iterator<Item = Result<DataPoint, Self::Error>>;

    /// Ordered scan of `table` over `[start, end]` (either bound may be
    /// absent, meaning unbounded in that direction).
    fn scan(&mut self, table: &str, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Result<Self::Rows, Self::Error>;

    /// The single row in `table` nearest to `t` in the given direction,
    /// if any.
    fn closest(&mut self, table: &str, t: NaiveDateTime, direction: Direction) -> Result<Option<DataPoint>, Self::Error>;

    /// Persist one point to `table`.
    fn insert(&mut self, table: &str, point: DataPoint) -> Result<(), Self::Error>;

    /// Create the `dev_margin` metadata table if it does not already exist.
    fn create_metadata_table_if_absent(&mut self) -> Result<(), Self::Error>;

    /// Record `table`'s `dev_margin` in the metadata table.
    fn register_dev_margin(&mut self, table: &str, margin: f64) -> Result<(), Self::Error>;

    /// Load a previously registered `dev_margin` for `table`, if any.
    fn load_dev_margin(&mut self, table: &str) -> Result<Option<f64>, Self::Error>;
}
