//! Per-dispatch bookkeeping.

use crate::batch::{aggregate, Batch};
use crate::Result;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Facts about one finished dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub batch_count: usize,
    pub item_count: usize,
    /// Largest number of batches observed in flight at once.
    pub max_active: usize,
    pub elapsed: Duration,
}

/// Queue and result map of one dispatch operation.
///
/// Queued batches sit in `pending` and finished ones are keys of `completed`. Batches handed
/// out by [`DispatchState::admit`] are held by the dispatcher loop's task set; this type only
/// counts them, so `pending + in_flight + completed` always equals `batch_count`.
pub(crate) struct DispatchState<P, R> {
    pending: VecDeque<Batch<P>>,
    completed: BTreeMap<usize, Vec<R>>,
    in_flight: usize,
    batch_count: usize,
    max_active: usize,
}

impl<P, R> DispatchState<P, R> {
    pub fn new(batches: Vec<Batch<P>>) -> Self {
        let batch_count = batches.len();
        Self {
            pending: batches.into(),
            completed: BTreeMap::new(),
            in_flight: 0,
            batch_count,
            max_active: 0,
        }
    }

    /// Next batch to start, if the window has room for it.
    pub fn admit(&mut self, limit: usize) -> Option<Batch<P>> {
        if self.in_flight >= limit {
            return None;
        }
        let batch = self.pending.pop_front()?;
        self.in_flight += 1;
        self.max_active = self.max_active.max(self.in_flight);
        Some(batch)
    }

    pub fn complete(&mut self, index: usize, results: Vec<R>) {
        debug_assert!(self.in_flight > 0);
        debug_assert!(!self.completed.contains_key(&index));
        self.in_flight -= 1;
        self.completed.insert(index, results);
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn completed(&self) -> usize {
        self.completed.len()
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    pub fn into_results(self) -> Result<Vec<R>> {
        aggregate(self.completed, self.batch_count)
    }
}
