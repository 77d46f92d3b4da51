use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use sdt_types::DataPoint;
use thiserror::Error;

use crate::{Direction, RowStore};

/// Error surfaced by [`InMemoryRowStore`].
///
/// The reference store is pure in-memory and has no I/O failure modes of
/// its own; the only error it can raise is a duplicate insert, which a
/// real relational store would reject via its primary key on
/// `(table, timestamp)`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("table {table:?} already has a row at {timestamp}")]
    DuplicateTimestamp { table: String, timestamp: NaiveDateTime },
}

/// A `BTreeMap`-backed [`RowStore`] for tests and as a usage example.
///
/// Not a production row-store implementation: the real relational store
/// behind the `RowStore` trait is explicitly out of scope for this
/// workspace.
#[derive(Debug, Default)]
pub struct InMemoryRowStore {
    tables: BTreeMap<String, BTreeMap<NaiveDateTime, f64>>,
    dev_margins: BTreeMap<String, f64>,
    metadata_table_created: bool,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowStore for InMemoryRowStore {
    type Error = StoreError;
    type Rows = std::vec::IntoIter<Result<DataPoint, StoreError>>;

    fn scan(&mut self, table: &str, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Result<Self::Rows, Self::Error> {
        let rows: Vec<Result<DataPoint, StoreError>> = self
            .tables
            .get(table)
            .into_iter()
            .flat_map(|rows| rows.iter())
            .filter(|(t, _)| start.map_or(true, |s| **t >= s) && end.map_or(true, |e| **t <= e))
            .map(|(t, v)| Ok(DataPoint::new(*t, *v)))
            .collect();
        Ok(rows.into_iter())
    }

    fn closest(&mut self, table: &str, t: NaiveDateTime, direction: Direction) -> Result<Option<DataPoint>, Self::Error> {
        let Some(rows) = self.tables.get(table) else {
            return Ok(None);
        };
        let found = match direction {
            Direction::LessOrEqual => rows.range(..=t).next_back(),
            Direction::GreaterOrEqual => rows.range(t..).next(),
        };
        Ok(found.map(|(ts, v)| DataPoint::new(*ts, *v)))
    }

    fn insert(&mut self, table: &str, point: DataPoint) -> Result<(), Self::Error> {
        let rows = self.tables.entry(table.to_string()).or_default();
        if rows.contains_key(&point.timestamp) {
            return Err(StoreError::DuplicateTimestamp { table: table.to_string(), timestamp: point.timestamp });
        }
        rows.insert(point.timestamp, point.value);
        Ok(())
    }

    fn create_metadata_table_if_absent(&mut self) -> Result<(), Self::Error> {
        self.metadata_table_created = true;
        Ok(())
    }

    fn register_dev_margin(&mut self, table: &str, margin: f64) -> Result<(), Self::Error> {
        self.dev_margins.insert(table.to_string(), margin);
        Ok(())
    }

    fn load_dev_margin(&mut self, table: &str) -> Result<Option<f64>, Self::Error> {
        Ok(self.dev_margins.get(table).copied())
    }
}
