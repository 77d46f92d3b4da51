use sdt_types::DataPoint;

/// Holds up to two in-memory points for one table: the last point actually
/// persisted (`archived`) and the current unpersisted candidate
/// (`snapshot`).
///
/// Pure in-memory state — no I/O. The [`crate::Compressor`] is the only
/// caller and is responsible for the monotonicity and ordering invariants;
/// `Buffer` enforces them with `debug_assert!` rather than `Result`, since
/// they can never fail given a correct caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct Buffer {
    archived: Option<DataPoint>,
    snapshot: Option<DataPoint>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archived(&self) -> Option<DataPoint> {
        self.archived
    }

    pub fn snapshot(&self) -> Option<DataPoint> {
        self.snapshot
    }

    /// If `archived` is empty, set it; otherwise set `snapshot`.
    pub fn push(&mut self, p: DataPoint) {
        if self.archived.is_none() {
            self.archived = Some(p);
        } else {
            self.snapshot = Some(p);
        }
    }

    /// Overwrite the candidate snapshot. Requires `archived` to be present.
    pub fn update_snapshot(&mut self, p: DataPoint) {
        debug_assert!(self.archived.is_some(), "update_snapshot requires an archived point");
        self.snapshot = Some(p);
    }

    /// "Swing closed": promote the current snapshot to `archived`, install
    /// `p` as the new snapshot, and return the promoted point (the one the
    /// caller must persist). Requires `snapshot` to be present.
    pub fn save_snapshot(&mut self, p: DataPoint) -> DataPoint {
        debug_assert!(self.snapshot.is_some(), "save_snapshot requires a pending snapshot");
        let promoted = self.snapshot.take().expect("checked by debug_assert above");
        self.archived = Some(promoted);
        self.snapshot = Some(p);
        promoted
    }

    /// Promote the pending snapshot to `archived` without installing a new
    /// candidate, leaving `snapshot` empty. Used on session flush, where
    /// there is no incoming point to take the snapshot's place.
    pub fn flush(&mut self) -> Option<DataPoint> {
        let promoted = self.snapshot.take()?;
        self.archived = Some(promoted);
        Some(promoted)
    }
}
