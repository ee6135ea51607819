//! Bounded fix history with derived motion statistics.
//!
//! [`FixStore`] owns a fixed-capacity history of [`GpsFix`] readings,
//! maintains running distance/speed aggregates, and fans new fixes out to
//! registered [`FixSink`]s. It is safe to mutate and read from multiple
//! threads concurrently.
//!
//! Locking discipline: the history/statistics mutation happens under the
//! internal state lock, which is released before sinks are notified so a
//! sink may itself query the store without deadlocking. A separate commit
//! lock keeps update + notification a single critical section per caller,
//! so sinks observe fixes in commit order.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::fix::GpsFix;

/// Error type returned by sinks; failures are logged, never propagated.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// A consumer of newly stored fixes.
///
/// Sinks run synchronously on the thread that called [`FixStore::add`], so
/// they must be fast or hand work off to another execution context. A sink
/// returning an error does not stop the fan-out to the remaining sinks.
pub trait FixSink: Send + Sync {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Called once for every fix committed to the store.
    fn on_fix(&self, fix: &GpsFix) -> Result<(), SinkError>;
}

/// Fixed-capacity FIFO ring buffer with explicit head/length bookkeeping.
///
/// Pushing onto a full buffer evicts the oldest element. Iteration is
/// always oldest to newest. The backing storage never reallocates after
/// construction.
#[derive(Debug)]
struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append an element, returning the evicted oldest one when full.
    fn push(&mut self, value: T) -> Option<T> {
        let capacity = self.capacity();
        if self.len == capacity {
            let evicted = self.slots[self.head].replace(value);
            self.head = (self.head + 1) % capacity;
            evicted
        } else {
            let index = (self.head + self.len) % capacity;
            self.slots[index] = Some(value);
            self.len += 1;
            None
        }
    }

    /// Oldest element.
    fn front(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Newest element.
    fn back(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        let index = (self.head + self.len - 1) % self.capacity();
        self.slots[index].as_ref()
    }

    /// Iterate oldest to newest.
    fn iter(&self) -> impl Iterator<Item = &T> {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |offset| self.slots[(self.head + offset) % capacity].as_ref())
    }

    fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Aggregate statistics over the stored history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// Fixes received over the store's lifetime (survives `clear`).
    pub total_received: u64,
    /// Accumulated leg distance in metres.
    pub total_distance: f64,
    /// Mean of the stored fixes' speeds in m/s.
    pub average_speed: f64,
    /// Number of fixes currently held.
    pub stored_positions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_span_seconds: Option<f64>,
}

struct StoreState {
    history: RingBuffer<GpsFix>,
    total_received: u64,
    total_distance: f64,
    average_speed: f64,
}

/// Bounded, thread-safe history of GPS fixes with observer fan-out.
pub struct FixStore {
    state: Mutex<StoreState>,
    sinks: Mutex<Vec<Arc<dyn FixSink>>>,
    /// Serializes add + notify so sinks see fixes in commit order.
    commit: Mutex<()>,
}

impl FixStore {
    /// Create a store holding at most `capacity` fixes.
    pub fn new(capacity: usize) -> Self {
        info!(capacity, "fix store initialized");
        Self {
            state: Mutex::new(StoreState {
                history: RingBuffer::with_capacity(capacity),
                total_received: 0,
                total_distance: 0.0,
                average_speed: 0.0,
            }),
            sinks: Mutex::new(Vec::new()),
            commit: Mutex::new(()),
        }
    }

    /// Commit a new fix.
    ///
    /// Accumulates the leg distance from the previous fix. When the fix
    /// carries no speed and the elapsed time since the previous fix is
    /// strictly positive, the speed is derived from distance over time;
    /// a non-positive elapsed time (clock skew, out-of-order delivery)
    /// leaves the speed absent. The oldest fix is evicted once the store
    /// is at capacity. All registered sinks are then notified in
    /// registration order.
    pub fn add(&self, mut fix: GpsFix) {
        let _commit = self.commit.lock().unwrap();

        {
            let mut guard = self.state.lock().unwrap();
            let state = &mut *guard;

            if let Some(prev) = state.history.back() {
                let distance = prev.distance_to(&fix);
                let elapsed = (fix.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
                state.total_distance += distance;

                if fix.speed.is_none() {
                    if elapsed > 0.0 {
                        fix.speed = Some(distance / elapsed);
                    } else {
                        debug!(elapsed, "non-positive time delta, leaving speed unset");
                    }
                }
            }

            state.history.push(fix.clone());
            state.total_received += 1;

            let speeds: Vec<f64> = state.history.iter().filter_map(|f| f.speed).collect();
            state.average_speed = if speeds.is_empty() {
                0.0
            } else {
                speeds.iter().sum::<f64>() / speeds.len() as f64
            };

            debug!(
                latitude = fix.latitude,
                longitude = fix.longitude,
                stored = state.history.len(),
                "fix added"
            );
        }

        // State lock released; sinks may query the store re-entrantly.
        let sinks: Vec<Arc<dyn FixSink>> = self.sinks.lock().unwrap().clone();
        for sink in sinks {
            if let Err(error) = sink.on_fix(&fix) {
                warn!(sink = sink.name(), %error, "sink failed to handle fix");
            }
        }
    }

    /// Stored fixes oldest to newest; the most recent `count` when given.
    pub fn positions(&self, count: Option<usize>) -> Vec<GpsFix> {
        let state = self.state.lock().unwrap();
        let stored = state.history.len();
        let skip = match count {
            Some(count) if count < stored => stored - count,
            _ => 0,
        };
        state.history.iter().skip(skip).cloned().collect()
    }

    /// The most recent fix, if any.
    pub fn latest(&self) -> Option<GpsFix> {
        self.state.lock().unwrap().history.back().cloned()
    }

    /// Number of fixes currently held.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the aggregate statistics.
    pub fn statistics(&self) -> Statistics {
        let state = self.state.lock().unwrap();
        let first_timestamp = state.history.front().map(|f| f.timestamp);
        let last_timestamp = state.history.back().map(|f| f.timestamp);
        let time_span_seconds = match (first_timestamp, last_timestamp) {
            (Some(first), Some(last)) => {
                Some((last - first).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        };

        Statistics {
            total_received: state.total_received,
            total_distance: state.total_distance,
            average_speed: state.average_speed,
            stored_positions: state.history.len(),
            first_timestamp,
            last_timestamp,
            time_span_seconds,
        }
    }

    /// Empty the history and reset the distance/speed aggregates.
    ///
    /// `total_received` is a lifetime counter and is retained, as are the
    /// registered sinks.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.history.clear();
        state.total_distance = 0.0;
        state.average_speed = 0.0;
        info!("fix history cleared");
    }

    /// Register a sink. Registering the same sink twice is a no-op.
    pub fn register_sink(&self, sink: Arc<dyn FixSink>) {
        let mut sinks = self.sinks.lock().unwrap();
        if !sinks.iter().any(|existing| Arc::ptr_eq(existing, &sink)) {
            debug!(sink = sink.name(), "sink registered");
            sinks.push(sink);
        }
    }

    /// Remove a previously registered sink by identity.
    pub fn unregister_sink(&self, sink: &Arc<dyn FixSink>) {
        let mut sinks = self.sinks.lock().unwrap();
        if let Some(index) = sinks.iter().position(|existing| Arc::ptr_eq(existing, sink)) {
            debug!(sink = sink.name(), "sink unregistered");
            sinks.remove(index);
        }
    }
}
