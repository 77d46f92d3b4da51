//! The session-level facade the external SQL statement classifier calls
//! into.
//!
//! [`SqlShim`] owns the per-table `Compressor` registry and the row-store
//! handle those compressors are shimmed against, and exposes exactly four
//! operations: [`SqlShim::on_create`], [`SqlShim::on_insert`],
//! [`SqlShim::on_select_point`], [`SqlShim::on_select_range`]. SQL parsing
//! and dispatch themselves stay out of scope — this crate is reached only
//! after a statement has already been classified as
//! `INSERT`/`SELECT`/`CREATE TABLE` and its table name and values
//! extracted.

pub mod error;

use std::collections::HashMap;

use chrono::NaiveDateTime;
use sdt_engine::error::InterpolationError;
use sdt_engine::{interpolate_at, Compressor, RangeInterpolator};
use sdt_store::RowStore;
use sdt_types::DataPoint;

pub use error::ShimError;

/// Per-session facade: one `Compressor` per table, shimmed against a
/// single row store.
///
/// Re-hydrates a table's `Compressor` from its persisted `dev_margin` the
/// first time that table is touched in a new session: only the margin
/// survives a session restart, not the in-memory buffer.
pub struct SqlShim<S: RowStore> {
    store: S,
    compressors: HashMap<String, Compressor>,
}

impl<S: RowStore> SqlShim<S> {
    pub fn new(store: S) -> Self {
        Self { store, compressors: HashMap::new() }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Unwrap the shim, handing the row store back to the caller (e.g. to
    /// simulate a session restart by constructing a fresh `SqlShim` over
    /// the same store).
    pub fn into_store(self) -> S {
        self.store
    }

    /// Make sure `table` has a `Compressor` registered, re-hydrating one
    /// from a persisted `dev_margin` if this session has not seen the
    /// table yet. Fails if the table was never created and has no
    /// persisted margin.
    fn ensure_compressor(&mut self, table: &str) -> Result<(), ShimError<S::Error>> {
        if self.compressors.contains_key(table) {
            return Ok(());
        }
        let margin = self.store.load_dev_margin(table).map_err(ShimError::Store)?;
        match margin {
            Some(margin) => {
                let compressor = Compressor::from_persisted_margin(margin)?;
                self.compressors.insert(table.to_string(), compressor);
                Ok(())
            }
            None => Err(ShimError::UnknownTable(table.to_string())),
        }
    }

    /// Persists `dev_margin` to metadata and registers a fresh `Compressor`
    /// for `table`.
    #[tracing::instrument(skip(self), fields(table))]
    pub fn on_create(&mut self, table: &str, dev_margin: f64) -> Result<(), ShimError<S::Error>> {
        self.store.create_metadata_table_if_absent().map_err(ShimError::Store)?;
        self.store.register_dev_margin(table, dev_margin).map_err(ShimError::Store)?;
        let compressor = Compressor::new(dev_margin)?;
        self.compressors.insert(table.to_string(), compressor);
        Ok(())
    }

    /// Delegates an inserted point to the table's `Compressor`, persisting
    /// the emitted point (if any) to the row store.
    #[tracing::instrument(skip(self, point), fields(table))]
    pub fn on_insert(&mut self, table: &str, point: DataPoint) -> Result<Option<DataPoint>, ShimError<S::Error>> {
        self.ensure_compressor(table)?;
        let compressor = self.compressors.get_mut(table).expect("ensure_compressor just populated this entry");
        let to_persist = compressor.accept(point)?;
        if let Some(p) = to_persist {
            self.store.insert(table, p).map_err(ShimError::Store)?;
        }
        Ok(to_persist)
    }

    /// Reconstructs the value at `t` from the caller-supplied surrounding
    /// persisted points (and the table's buffered snapshot, if the second
    /// anchor is missing).
    #[tracing::instrument(skip(self, surrounding), fields(table))]
    pub fn on_select_point(
        &mut self,
        table: &str,
        t: NaiveDateTime,
        surrounding: (DataPoint, Option<DataPoint>),
    ) -> Result<DataPoint, ShimError<S::Error>> {
        self.ensure_compressor(table)?;
        let compressor = self.compressors.get(table).expect("ensure_compressor just populated this entry");
        let snapshot = compressor.buffer().snapshot();
        let (a, b) = surrounding;
        Ok(interpolate_at(t, a, b, snapshot)?)
    }

    /// Reconstructs a stride-`time_step` sequence over `scan`, a
    /// caller-supplied ordered scan of archived points for `table`.
    #[tracing::instrument(skip(self, scan), fields(table))]
    pub fn on_select_range(
        &mut self,
        table: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        scan: S::Rows,
    ) -> Result<RangeInterpolator<S::Rows, S::Error>, ShimError<S::Error>> {
        if let Err(e) = self.ensure_compressor(table) {
            scan.for_each(drop);
            return Err(e);
        }
        let compressor = self.compressors.get(table).expect("ensure_compressor just populated this entry");
        let snapshot = compressor.buffer().snapshot();
        let time_step = match compressor.time_step() {
            Some(ts) => ts,
            None => {
                scan.for_each(drop);
                return Err(ShimError::Interpolation(InterpolationError::Unconfigured));
            }
        };
        Ok(RangeInterpolator::new(scan, time_step, start, end, snapshot)?)
    }

    /// Flush the pending snapshot for `table`, if any. Not called
    /// automatically; a session-close hook may invoke it explicitly.
    pub fn flush(&mut self, table: &str) -> Option<DataPoint> {
        self.compressors.get_mut(table)?.flush()
    }
}
