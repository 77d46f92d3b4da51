use chrono::{NaiveDateTime, TimeDelta};
use sdt_types::DataPoint;
use tracing::{debug, trace};

use crate::buffer::Buffer;
use crate::error::{AcceptError, ConfigError, OrderedF64};

/// Convert a timestamp delta to fractional seconds.
///
/// Sub-second precision is preserved even though the wire format
/// (`YYYY-MM-DD HH:MM:SS`) truncates to whole seconds on persist — see
/// spec "Numeric semantics".
fn delta_seconds(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    delta.num_nanoseconds().map(|ns| ns as f64 / 1e9).unwrap_or_else(|| delta.num_seconds() as f64)
}

/// Per-table swinging-door trending state machine.
///
/// Consumes a strictly-monotonic stream of [`DataPoint`]s via
/// [`Compressor::accept`] and decides, for each one, whether it must be
/// persisted (`Some`) or has been absorbed into the current slope
/// corridor (`None`).
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    dev_margin: f64,
    buffer: Buffer,
    time_step: Option<TimeDelta>,
    slope_min: Option<f64>,
    slope_max: Option<f64>,
}

impl Compressor {
    /// Construct a fresh compressor with no buffered points.
    pub fn new(dev_margin: f64) -> Result<Self, ConfigError> {
        if dev_margin <= 0.0 {
            return Err(ConfigError::NonPositiveDevMargin(OrderedF64(dev_margin)));
        }
        Ok(Self {
            dev_margin,
            buffer: Buffer::new(),
            time_step: None,
            slope_min: None,
            slope_max: None,
        })
    }

    /// Re-hydrate a compressor for a table whose `dev_margin` was loaded
    /// from persisted metadata but whose buffer has not been populated
    /// yet this session (only the margin survives a session restart, not
    /// the in-memory buffer).
    pub fn from_persisted_margin(dev_margin: f64) -> Result<Self, ConfigError> {
        Self::new(dev_margin)
    }

    pub fn dev_margin(&self) -> f64 {
        self.dev_margin
    }

    pub fn time_step(&self) -> Option<TimeDelta> {
        self.time_step
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn slope_bounds(&self) -> Option<(f64, f64)> {
        self.slope_min.zip(self.slope_max)
    }

    fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.buffer.snapshot().or(self.buffer.archived()).map(|p| p.timestamp)
    }

    /// Accept the next point in the stream.
    ///
    /// `p.timestamp` must be strictly greater than any timestamp
    /// previously accepted by this compressor. On success, `Some(point)`
    /// is a point the caller must persist; `None` means the point was
    /// absorbed into the corridor. On `Err`, no state has changed.
    pub fn accept(&mut self, p: DataPoint) -> Result<Option<DataPoint>, AcceptError> {
        if let Some(last) = self.last_timestamp() {
            if p.timestamp == last {
                return Err(AcceptError::ZeroTimeDelta);
            }
            if p.timestamp < last {
                return Err(AcceptError::NonMonotonicTimestamp);
            }
        }

        match (self.buffer.archived(), self.buffer.snapshot()) {
            // Cold start: the very first point is always persisted.
            (None, _) => {
                self.buffer.push(p);
                debug!(timestamp = %p.format_timestamp(), "cold start, emitting first point");
                Ok(Some(p))
            }
            // Warming: record time_step, buffer the candidate, seed the corridor.
            (Some(archived), None) => {
                self.time_step = Some(p.timestamp - archived.timestamp);
                self.buffer.push(p);
                self.tighten_corridor(archived, p);
                trace!(?self.time_step, "warming complete, corridor seeded");
                Ok(None)
            }
            // Steady state: test the incoming slope against the corridor.
            (Some(archived), Some(_snapshot)) => {
                let slope = (p.value - archived.value) / delta_seconds(archived.timestamp, p.timestamp);
                let (slope_min, slope_max) = self.slope_bounds().expect("corridor set once warmed");

                if slope_min <= slope && slope <= slope_max {
                    self.tighten_corridor(archived, p);
                    self.buffer.update_snapshot(p);
                    trace!(slope, "within corridor, tightening");
                    Ok(None)
                } else {
                    let emitted = self.buffer.save_snapshot(p);
                    self.slope_min = None;
                    self.slope_max = None;
                    let new_archived = self.buffer.archived().expect("save_snapshot just set it");
                    self.tighten_corridor(new_archived, p);
                    debug!(timestamp = %emitted.format_timestamp(), "corridor swung shut, emitting");
                    Ok(Some(emitted))
                }
            }
        }
    }

    /// Flush the pending snapshot at session end, if one exists.
    ///
    /// The original system leaks the buffered snapshot when a session
    /// ends without an explicit flush; this is a deliberate behavior
    /// addition (see DESIGN.md) so callers that want to persist the
    /// tail of a stream have a way to do so.
    pub fn flush(&mut self) -> Option<DataPoint> {
        let promoted = self.buffer.flush()?;
        self.slope_min = None;
        self.slope_max = None;
        Some(promoted)
    }

    /// Narrow the slope corridor given the fixed anchor `archived` and
    /// the newly observed point `p`.
    fn tighten_corridor(&mut self, archived: DataPoint, p: DataPoint) {
        let delta_time = delta_seconds(archived.timestamp, p.timestamp);
        let delta_value = p.value - archived.value;
        let s_min_candidate = (delta_value - self.dev_margin) / delta_time;
        let s_max_candidate = (delta_value + self.dev_margin) / delta_time;

        self.slope_min = Some(match self.slope_min {
            Some(current) => current.max(s_min_candidate),
            None => s_min_candidate,
        });
        self.slope_max = Some(match self.slope_max {
            Some(current) => current.min(s_max_candidate),
            None => s_max_candidate,
        });
    }
}
