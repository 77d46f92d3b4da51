use chrono::{NaiveDateTime, TimeDelta};
use sdt_types::DataPoint;

use crate::error::{ConfigError, InterpolationError};

fn delta_seconds(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    delta.num_nanoseconds().map(|ns| ns as f64 / 1e9).unwrap_or_else(|| delta.num_seconds() as f64)
}

fn linear_value(a: DataPoint, b: DataPoint, t: NaiveDateTime) -> f64 {
    let slope = (b.value - a.value) / delta_seconds(a.timestamp, b.timestamp);
    a.value + slope * delta_seconds(a.timestamp, t)
}

/// Reconstructs the value at `t` by linear interpolation between two
/// anchor points.
///
/// `b` is the second persisted anchor, if the row store had one; if not,
/// the caller's buffered `snapshot` is used instead. If neither is
/// available, reconstruction is impossible.
pub fn interpolate_at(
    t: NaiveDateTime,
    a: DataPoint,
    b: Option<DataPoint>,
    snapshot: Option<DataPoint>,
) -> Result<DataPoint, InterpolationError> {
    let other = b.or(snapshot).ok_or(InterpolationError::Unreconstructable)?;

    let (lo, hi) = if a.timestamp <= other.timestamp { (a, other) } else { (other, a) };
    if lo.timestamp == hi.timestamp {
        return Err(InterpolationError::ProtocolViolation);
    }
    Ok(DataPoint::new(t, linear_value(lo, hi, t)))
}

/// Lazily reconstructs a stride-`time_step` sequence of points over
/// `[start, end]` from an ordered archived sequence plus a trailing
/// in-flight snapshot.
///
/// `I` is the row store's scan result: an iterator of
/// `Result<DataPoint, E>`. On early termination — either because the
/// algorithm reaches `end`, or because the caller simply stops pulling
/// items and drops this iterator — the remainder of `I` is drained, per
/// the row-store cursor protocol requirement.
pub struct RangeInterpolator<I, E>
where
    I: Iterator<Item = Result<DataPoint, E>>,
{
    inner: std::iter::Peekable<TailAugmented<I, E>>,
    time_step: TimeDelta,
    start: Option<NaiveDateTime>,
    end: NaiveDateTime,
    working_time: Option<NaiveDateTime>,
    state: State,
}

/// Error surfaced by [`RangeInterpolator`]: a bad constructor argument, the
/// interpolation algorithm itself, or the underlying row-store scan.
#[derive(Debug, PartialEq)]
pub enum RangeError<E> {
    Config(ConfigError),
    Interpolation(InterpolationError),
    Store(E),
}

impl<E: std::fmt::Debug> std::fmt::Display for RangeError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeError::Config(e) => write!(f, "{e}"),
            RangeError::Interpolation(e) => write!(f, "{e}"),
            RangeError::Store(e) => write!(f, "row store error: {e:?}"),
        }
    }
}

impl<E: std::fmt::Debug> std::error::Error for RangeError<E> {}

#[derive(Debug)]
enum State {
    Init,
    AwaitingNext { point_prev: DataPoint },
    Stepping { point_prev: DataPoint, point_next: DataPoint },
    Done,
}

impl<I, E> RangeInterpolator<I, E>
where
    I: Iterator<Item = Result<DataPoint, E>>,
{
    /// `archived` is the row store's ordered scan over the table, already
    /// bounded (or not) by `start`/`end`. `snapshot` is the compressor's
    /// current unpersisted candidate, used as the right-hand anchor for
    /// in-flight data.
    pub fn new(
        archived: I,
        time_step: TimeDelta,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        snapshot: Option<DataPoint>,
    ) -> Result<Self, RangeError<E>> {
        if time_step.is_zero() {
            // Constructor-level misconfiguration (spec §7: InvalidConfig
            // covers "a zero time_step"). Drain the scan before bailing,
            // per the cursor protocol.
            archived.for_each(drop);
            return Err(RangeError::Config(ConfigError::ZeroTimeStep));
        }
        let end = match end {
            Some(e) => e,
            None => match snapshot.map(|p| p.timestamp) {
                Some(t) => t,
                None => {
                    archived.for_each(drop);
                    return Err(RangeError::Interpolation(InterpolationError::Unconfigured));
                }
            },
        };

        let state = if matches!((start, Some(end)), (Some(s), Some(e)) if s > e) {
            State::Done
        } else {
            State::Init
        };

        Ok(Self {
            inner: TailAugmented::new(archived, snapshot, end).peekable(),
            time_step,
            start,
            end,
            working_time: None,
            state,
        })
    }

    /// Fully drain the underlying store iterator, per the cursor-protocol
    /// requirement that a result set be consumed to exhaustion.
    fn drain_remaining(&mut self) {
        for _ in self.inner.by_ref() {}
    }
}

impl<I, E> Iterator for RangeInterpolator<I, E>
where
    I: Iterator<Item = Result<DataPoint, E>>,
{
    type Item = Result<DataPoint, RangeError<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Done => return None,
                State::Init => match self.inner.next() {
                    None => {
                        self.state = State::Done;
                        return None;
                    }
                    Some(Err(e)) => {
                        self.drain_remaining();
                        return Some(Err(RangeError::Store(e)));
                    }
                    Some(Ok(point_prev)) => {
                        let start = self.start.unwrap_or(point_prev.timestamp);
                        // Spec's literal algorithm only bounds-checks the
                        // first point against `end` in the "exactly one
                        // archived point (and no snapshot)" edge case; a
                        // point_prev with more data behind it is emitted
                        // verbatim whenever it is >= start, with the `end`
                        // bound enforced later while stepping. Peek to tell
                        // the two cases apart without skipping anything.
                        if self.inner.peek().is_none() {
                            self.state = State::Done;
                            if point_prev.timestamp >= start && point_prev.timestamp <= self.end {
                                return Some(Ok(point_prev));
                            }
                            return None;
                        }
                        if point_prev.timestamp >= start {
                            self.working_time = Some(point_prev.timestamp);
                            self.state = State::AwaitingNext { point_prev };
                            return Some(Ok(point_prev));
                        } else {
                            self.working_time = Some(start - self.time_step);
                            self.state = State::AwaitingNext { point_prev };
                            continue;
                        }
                    }
                },
                State::AwaitingNext { point_prev } => match self.inner.next() {
                    None => {
                        self.state = State::Done;
                        return None;
                    }
                    Some(Err(e)) => {
                        self.drain_remaining();
                        return Some(Err(RangeError::Store(e)));
                    }
                    Some(Ok(point_next)) => {
                        if point_next.timestamp <= point_prev.timestamp {
                            self.drain_remaining();
                            return Some(Err(RangeError::Interpolation(InterpolationError::ProtocolViolation)));
                        }
                        self.state = State::Stepping { point_prev, point_next };
                        continue;
                    }
                },
                State::Stepping { point_prev, point_next } => {
                    let working_time = self.working_time.expect("set before entering Stepping");
                    if working_time < point_next.timestamp {
                        let candidate = working_time + self.time_step;
                        if candidate > self.end {
                            self.drain_remaining();
                            self.state = State::Done;
                            return None;
                        }
                        self.working_time = Some(candidate);
                        self.state = State::Stepping { point_prev, point_next };
                        return Some(Ok(DataPoint::new(candidate, linear_value(point_prev, point_next, candidate))));
                    } else if working_time != point_next.timestamp {
                        self.working_time = Some(point_next.timestamp);
                        self.state = State::AwaitingNext { point_prev: point_next };
                        return Some(Ok(point_next));
                    } else {
                        self.state = State::AwaitingNext { point_prev: point_next };
                        continue;
                    }
                }
            }
        }
    }
}

impl<I, E> Drop for RangeInterpolator<I, E>
where
    I: Iterator<Item = Result<DataPoint, E>>,
{
    fn drop(&mut self) {
        // Caller-driven cancellation: whatever is left of the underlying
        // scan must still be consumed, per the row-store cursor protocol.
        for _ in self.inner.by_ref() {}
    }
}

/// Wraps the archived scan and, once it is exhausted, conditionally
/// yields the buffered snapshot as one final point.
struct TailAugmented<I, E> {
    inner: I,
    snapshot: Option<DataPoint>,
    end: NaiveDateTime,
    last: Option<DataPoint>,
    inner_done: bool,
    appended: bool,
    _marker: std::marker::PhantomData<E>,
}

impl<I, E> TailAugmented<I, E>
where
    I: Iterator<Item = Result<DataPoint, E>>,
{
    fn new(inner: I, snapshot: Option<DataPoint>, end: NaiveDateTime) -> Self {
        Self { inner, snapshot, end, last: None, inner_done: false, appended: false, _marker: std::marker::PhantomData }
    }
}

impl<I, E> Iterator for TailAugmented<I, E>
where
    I: Iterator<Item = Result<DataPoint, E>>,
{
    type Item = Result<DataPoint, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.inner_done {
            match self.inner.next() {
                Some(Ok(p)) => {
                    self.last = Some(p);
                    return Some(Ok(p));
                }
                Some(Err(e)) => {
                    // The scan errored mid-read; the cursor protocol still
                    // requires the result set to be consumed to exhaustion,
                    // so keep pulling (and discarding) whatever is left of
                    // `self.inner` before surfacing the error.
                    for _ in self.inner.by_ref() {}
                    self.inner_done = true;
                    return Some(Err(e));
                }
                None => self.inner_done = true,
            }
        }
        if !self.appended {
            self.appended = true;
            if let (Some(last), Some(snapshot)) = (self.last, self.snapshot) {
                if last.timestamp < self.end {
                    return Some(Ok(snapshot));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn dt(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
            + chrono::Duration::seconds(secs)
    }

    fn pt(secs: i64, v: f64) -> DataPoint {
        DataPoint::new(dt(secs), v)
    }

    type NoErr = std::convert::Infallible;

    fn archived(points: Vec<DataPoint>) -> impl Iterator<Item = Result<DataPoint, NoErr>> {
        points.into_iter().map(Ok)
    }

    #[test]
    fn point_interpolation_midpoint() {
        // Midpoint of a straight line.
        let r = interpolate_at(dt(3), pt(0, 0.0), Some(pt(10, 10.0)), None).unwrap();
        assert_eq!(r, pt(3, 3.0));
    }

    #[test]
    fn point_interpolation_is_symmetric_in_argument_order() {
        // spec P4.
        let a = pt(0, 0.0);
        let b = pt(10, 10.0);
        let r1 = interpolate_at(dt(3), a, Some(b), None).unwrap();
        let r2 = interpolate_at(dt(3), b, Some(a), None).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn point_interpolation_falls_back_to_snapshot() {
        let r = interpolate_at(dt(5), pt(0, 0.0), None, Some(pt(10, 10.0))).unwrap();
        assert_eq!(r, pt(5, 5.0));
    }

    #[test]
    fn point_interpolation_fails_without_second_anchor() {
        let err = interpolate_at(dt(5), pt(0, 0.0), None, None).unwrap_err();
        assert_eq!(err, InterpolationError::Unreconstructable);
    }

    #[test]
    fn range_interpolation_basic_stride() {
        // Perfect line, no intermediate samples: every stride step is interpolated.
        let points = archived(vec![pt(0, 0.0), pt(30, 30.0)]);
        let it = RangeInterpolator::new(points, TimeDelta::seconds(10), None, Some(dt(30)), None).unwrap();
        let result: Vec<DataPoint> = it.map(Result::unwrap).collect();
        assert_eq!(result, vec![pt(0, 0.0), pt(10, 10.0), pt(20, 20.0), pt(30, 30.0)]);
    }

    #[test]
    fn range_interpolation_empty_archived_is_empty_not_error() {
        let points = archived(vec![]);
        let it = RangeInterpolator::new(points, TimeDelta::seconds(10), Some(dt(0)), Some(dt(30)), None).unwrap();
        let result: Vec<_> = it.collect();
        assert!(result.is_empty());
    }

    #[test]
    fn range_interpolation_start_after_end_is_empty() {
        let points = archived(vec![pt(0, 0.0), pt(30, 30.0)]);
        let it = RangeInterpolator::new(points, TimeDelta::seconds(10), Some(dt(30)), Some(dt(0)), None).unwrap();
        let result: Vec<_> = it.collect();
        assert!(result.is_empty());
    }

    #[test]
    fn range_interpolation_single_point_in_bounds() {
        let points = archived(vec![pt(5, 5.0)]);
        let it = RangeInterpolator::new(points, TimeDelta::seconds(10), Some(dt(0)), Some(dt(10)), None).unwrap();
        let result: Vec<DataPoint> = it.map(Result::unwrap).collect();
        assert_eq!(result, vec![pt(5, 5.0)]);
    }

    #[test]
    fn range_interpolation_single_point_out_of_bounds_is_empty() {
        let points = archived(vec![pt(50, 5.0)]);
        let it = RangeInterpolator::new(points, TimeDelta::seconds(10), Some(dt(0)), Some(dt(10)), None).unwrap();
        let result: Vec<_> = it.collect();
        assert!(result.is_empty());
    }

    #[test]
    fn range_interpolation_appends_snapshot_as_right_anchor() {
        let points = archived(vec![pt(0, 0.0)]);
        let it = RangeInterpolator::new(points, TimeDelta::seconds(10), None, Some(dt(20)), Some(pt(20, 20.0))).unwrap();
        let result: Vec<DataPoint> = it.map(Result::unwrap).collect();
        assert_eq!(result, vec![pt(0, 0.0), pt(10, 10.0), pt(20, 20.0)]);
    }

    #[test]
    fn range_interpolation_zero_time_step_rejected() {
        let points = archived(vec![pt(0, 0.0)]);
        let err = RangeInterpolator::new(points, TimeDelta::zero(), None, Some(dt(10)), None).unwrap_err();
        assert_eq!(err, RangeError::Config(ConfigError::ZeroTimeStep));
    }

    #[test]
    fn range_interpolation_unconfigured_without_end_or_snapshot() {
        let points = archived(vec![pt(0, 0.0)]);
        let err = RangeInterpolator::new(points, TimeDelta::seconds(10), None, None, None).unwrap_err();
        assert_eq!(err, RangeError::Interpolation(InterpolationError::Unconfigured));
    }

    #[test]
    fn range_interpolation_emits_first_point_verbatim_even_if_later_than_end_when_more_rows_follow() {
        // Spec §4.4.2's literal algorithm only bounds-checks the very first
        // archived point against `end` in the single-archived-point edge
        // case; when more rows follow, point_prev is emitted whenever it is
        // >= start, with `end` enforced only later while stepping pairs.
        let points = archived(vec![pt(50, 5.0), pt(60, 6.0)]);
        let it = RangeInterpolator::new(points, TimeDelta::seconds(10), Some(dt(0)), Some(dt(10)), None).unwrap();
        let result: Vec<DataPoint> = it.map(Result::unwrap).collect();
        assert_eq!(result, vec![pt(50, 5.0)]);
    }

    #[derive(Debug, PartialEq, Clone, Copy)]
    struct FakeStoreError;

    impl std::fmt::Display for FakeStoreError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake store error")
        }
    }
    impl std::error::Error for FakeStoreError {}

    /// An iterator that counts every `next()` call that actually produced
    /// an item, so tests can assert the underlying scan was drained to
    /// exhaustion after an error.
    struct CountingIter {
        items: std::collections::VecDeque<Result<DataPoint, FakeStoreError>>,
        pulled: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl Iterator for CountingIter {
        type Item = Result<DataPoint, FakeStoreError>;
        fn next(&mut self) -> Option<Self::Item> {
            let item = self.items.pop_front();
            if item.is_some() {
                self.pulled.set(self.pulled.get() + 1);
            }
            item
        }
    }

    #[test]
    fn range_interpolation_drains_remaining_rows_after_a_mid_scan_store_error() {
        let pulled = std::rc::Rc::new(std::cell::Cell::new(0));
        let items = std::collections::VecDeque::from(vec![
            Ok(pt(0, 0.0)),
            Err(FakeStoreError),
            Ok(pt(20, 2.0)),
            Ok(pt(30, 3.0)),
        ]);
        let iter = CountingIter { items, pulled: pulled.clone() };
        let mut it = RangeInterpolator::new(iter, TimeDelta::seconds(10), None, Some(dt(30)), None).unwrap();

        assert_eq!(it.next().unwrap().unwrap(), pt(0, 0.0));
        let err = it.next().unwrap().unwrap_err();
        assert!(matches!(err, RangeError::Store(FakeStoreError)));
        assert!(it.next().is_none());
        assert_eq!(pulled.get(), 4, "every row must be pulled, even after a mid-scan error");
    }

    proptest::proptest! {
        #[test]
        fn range_interpolation_is_idempotent(
            n in 2usize..8,
            step_secs in 1i64..20,
            values in proptest::collection::vec(-50.0f64..50.0, 2..8),
        ) {
            // spec P5: feeding the output back in reproduces the same sequence.
            let step = TimeDelta::seconds(step_secs);
            let count = n.min(values.len());
            let points: Vec<DataPoint> = (0..count)
                .map(|i| pt(i as i64 * step_secs, values[i]))
                .collect();
            if points.len() < 2 {
                return Ok(());
            }
            let end = points.last().unwrap().timestamp;

            let first: Vec<DataPoint> = RangeInterpolator::new(
                archived(points.clone()), step, None, Some(end), None,
            ).unwrap().map(Result::unwrap).collect();

            let second: Vec<DataPoint> = RangeInterpolator::new(
                archived(first.clone()), step, None, Some(end), None,
            ).unwrap().map(Result::unwrap).collect();

            prop_assert_eq!(first.len(), second.len());
            for (a, b) in first.iter().zip(second.iter()) {
                prop_assert_eq!(a.timestamp, b.timestamp);
                prop_assert!((a.value - b.value).abs() < 1e-9);
            }
        }
    }
}
