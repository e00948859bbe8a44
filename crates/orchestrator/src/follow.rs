//! Consumer-side helpers for the poll-and-compare pattern.
//!
//! A render or plot loop polls `latest_snapshot()` at its own cadence and
//! only acts on frames strictly newer than the last one it saw.

use std::collections::VecDeque;
use std::sync::Arc;

use kernel::Snapshot;

/// Hands out each published frame at most once, in (epoch, time) order.
#[derive(Debug)]
pub struct SnapshotCursor<E> {
    last: Option<Arc<Snapshot<E>>>,
}

impl<E> Default for SnapshotCursor<E> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<E> SnapshotCursor<E> {
    /// A cursor that accepts any first frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `latest` if it is strictly newer than the last frame handed out.
    pub fn next(&mut self, latest: Option<Arc<Snapshot<E>>>) -> Option<Arc<Snapshot<E>>> {
        let snap = latest?;
        if let Some(last) = &self.last {
            if !snap.is_newer_than(last) {
                return None;
            }
        }
        self.last = Some(Arc::clone(&snap));
        Some(snap)
    }

    /// Epoch and time of the last frame handed out.
    pub fn last_seen(&self) -> Option<(u32, f64)> {
        self.last.as_ref().map(|s| (s.epoch(), s.time()))
    }

    /// Forget the last frame so the next poll repaints unconditionally.
    pub fn rewind(&mut self) {
        self.last = None;
    }
}

/// Bounded (time, metric) series, e.g. for an entropy plot.
#[derive(Debug, Clone)]
pub struct MetricHistory {
    capacity: usize,
    epoch: Option<u32>,
    points: VecDeque<(f64, f64)>,
}

impl MetricHistory {
    /// Keep at most `capacity` points (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            epoch: None,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a point, evicting the oldest when full.
    pub fn push(&mut self, time: f64, metric: f64) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back((time, metric));
    }

    /// Append a snapshot's metric; a new epoch clears the series first.
    pub fn record<E>(&mut self, snapshot: &Snapshot<E>) {
        if self.epoch != Some(snapshot.epoch()) {
            self.clear();
            self.epoch = Some(snapshot.epoch());
        }
        self.push(snapshot.time(), snapshot.metric());
    }

    /// Drop every point.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Points from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied()
    }

    /// Newest point.
    pub fn latest(&self) -> Option<(f64, f64)> {
        self.points.back().copied()
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if no points are stored.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
