//! Sample validation, queueing and application to the rollup store.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use relaywatch_types::SeriesKey;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::series::{Series, Update};
use crate::store::RollupStore;

/// When finalized buckets are rolled into coarser archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupMode {
    /// Synchronously, whenever a write opens a new finest bucket.
    #[default]
    OnWrite,
    /// Only from the periodic maintenance pass.
    Timer,
}

/// One measurement waiting to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Target series.
    pub key: SeriesKey,
    /// Measured value.
    pub value: f64,
    /// Epoch seconds.
    pub timestamp: f64,
}

/// Counters of samples that never made it into the store.
#[derive(Debug, Default)]
pub struct DropCounters {
    rejected: AtomicU64,
    evicted: AtomicU64,
    overflow: AtomicU64,
}

impl DropCounters {
    pub(crate) fn reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn evict(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn overflow(&self) {
        self.overflow.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values.
    pub fn snapshot(&self) -> DropStats {
        DropStats {
            rejected: self.rejected.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            overflow: self.overflow.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DropCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DropStats {
    /// Failed validation (not finite, out of bounds, too far in the future).
    pub rejected: u64,
    /// Older than every archive of the series retains.
    pub evicted: u64,
    /// Pushed out of a full ingest queue.
    pub overflow: u64,
}

impl DropStats {
    /// All drops together.
    pub fn total(&self) -> u64 {
        self.rejected + self.evicted + self.overflow
    }
}

/// Most queued samples one [`Ingestor::drain`] call applies.
pub const DRAIN_BATCH: usize = 256;

/// Entry point for samples.
///
/// A validated sample is applied directly under its own series lock. Only
/// when that series is busy does it go onto a bounded queue (dropping the
/// oldest entry when full), which is drained in batches of at most
/// [`DRAIN_BATCH`] by whichever caller wins the drain lock. The maintenance
/// task drains whatever is left.
#[derive(Debug)]
pub struct Ingestor {
    queue: Mutex<VecDeque<Sample>>,
    capacity: usize,
    drain_lock: Mutex<()>,
    store: Arc<RollupStore>,
    clock: Arc<dyn Clock>,
    drops: Arc<DropCounters>,
    max_future_skew: f64,
    rollup_mode: RollupMode,
}

impl Ingestor {
    pub(crate) fn new(
        store: Arc<RollupStore>,
        clock: Arc<dyn Clock>,
        drops: Arc<DropCounters>,
        capacity: usize,
        max_future_skew: f64,
        rollup_mode: RollupMode,
    ) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            drain_lock: Mutex::new(()),
            store,
            clock,
            drops,
            max_future_skew,
            rollup_mode,
        }
    }

    /// Current time according to the engine clock.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Whether a sample for series `name` would pass validation.
    pub fn accepts(&self, name: &str, value: f64, timestamp: f64) -> bool {
        timestamp.is_finite()
            && timestamp <= self.clock.now() + self.max_future_skew
            && self.store.spec_for(name).bounds.contains(value)
    }

    /// Record `value` for `name` / `sub_key` at `timestamp` (default now).
    pub fn record(&self, name: &str, value: f64, sub_key: Option<&str>, timestamp: Option<f64>) {
        let key = SeriesKey {
            name: name.to_string(),
            sub_key: sub_key.map(str::to_string),
        };
        let timestamp = timestamp.unwrap_or_else(|| self.clock.now());
        self.submit(Sample {
            key,
            value,
            timestamp,
        });
    }

    /// Validate and apply a sample, queueing it if its series is busy.
    pub fn submit(&self, sample: Sample) {
        if !sample.value.is_finite() || !sample.timestamp.is_finite() {
            tracing::debug!(series = %sample.key, "non-finite sample rejected");
            self.drops.reject();
            return;
        }
        if sample.timestamp > self.clock.now() + self.max_future_skew {
            tracing::debug!(series = %sample.key, ts = sample.timestamp, "sample too far in the future");
            self.drops.reject();
            return;
        }

        let series = self.store.get_or_create(&sample.key);
        let contended = match series.try_lock() {
            Some(mut guard) => {
                self.apply(&mut guard, &sample);
                false
            }
            None => true,
        };
        if contended {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                queue.pop_front();
                self.drops.overflow();
            }
            queue.push_back(sample);
        }
        if contended || !self.queue.lock().is_empty() {
            self.drain();
        }
    }

    /// Apply up to [`DRAIN_BATCH`] queued samples unless another caller is
    /// already draining. Samples whose series is busy go back to the front
    /// of the queue. Returns the number applied by this call.
    pub fn drain(&self) -> usize {
        let mut applied = 0;
        loop {
            let Some(_guard) = self.drain_lock.try_lock() else {
                return applied;
            };
            let mut deferred = Vec::new();
            while applied + deferred.len() < DRAIN_BATCH {
                let Some(sample) = self.pop() else {
                    break;
                };
                let series = self.store.get_or_create(&sample.key);
                let Some(mut series) = series.try_lock() else {
                    deferred.push(sample);
                    continue;
                };
                self.apply(&mut series, &sample);
                applied += 1;
            }
            if !deferred.is_empty() {
                self.requeue(deferred);
                return applied;
            }
            drop(_guard);
            // a sample pushed while the lock was being released would be stranded
            if applied >= DRAIN_BATCH || self.queue.lock().is_empty() {
                return applied;
            }
        }
    }

    fn requeue(&self, deferred: Vec<Sample>) {
        let mut queue = self.queue.lock();
        for sample in deferred.into_iter().rev() {
            queue.push_front(sample);
        }
        while queue.len() > self.capacity {
            queue.pop_front();
            self.drops.overflow();
        }
    }

    /// Drain in batches until the queue is empty or another caller holds
    /// the drain lock. Bounded by the queue length at the time of the call.
    pub fn drain_all(&self) -> usize {
        let rounds = self.queued() / DRAIN_BATCH + 1;
        let mut applied = 0;
        for _ in 0..rounds {
            let batch = self.drain();
            applied += batch;
            if batch < DRAIN_BATCH {
                break;
            }
        }
        applied
    }

    fn pop(&self) -> Option<Sample> {
        self.queue.lock().pop_front()
    }

    /// Samples waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    fn apply(&self, series: &mut Series, sample: &Sample) {
        if !series.spec().bounds.contains(sample.value) {
            tracing::debug!(series = %sample.key, value = sample.value, "sample out of bounds");
            self.drops.reject();
            return;
        }
        match series.update(sample.value, sample.timestamp) {
            Update::Stored { level: 0, opened: true } if self.rollup_mode == RollupMode::OnWrite => {
                if let Some(latest) = series.latest() {
                    series.rollup(latest);
                }
            }
            Update::Stored { .. } => {}
            Update::TooOld => {
                tracing::debug!(series = %sample.key, ts = sample.timestamp, "sample older than retention");
                self.drops.evict();
            }
        }
    }
}
