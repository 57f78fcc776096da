//! Fixed-capacity ring of buckets for one resolution tier.

use std::collections::BTreeSet;

use relaywatch_types::{ArchiveDump, ArchiveSpec, Bucket};

/// Result of folding a delta into an archive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Insert {
    /// Merged into an existing bucket. `propagated` is set when that bucket
    /// had already been rolled into the next archive, so the delta must be
    /// forwarded there as well.
    Merged { propagated: bool },
    /// A new bucket was opened. `displaced` holds the overwritten bucket when
    /// it had not been rolled up yet.
    Opened { displaced: Option<Bucket> },
    /// The slot holds a newer bucket; the delta is older than this archive
    /// retains.
    Stale,
}

/// Ring buffer of `buckets` slots of width `step`.
///
/// A bucket with start `s` lives in slot `(s / step) mod buckets`, so opening
/// a new window overwrites the bucket exactly `buckets` windows older in O(1).
#[derive(Debug, Clone)]
pub(crate) struct Archive {
    spec: ArchiveSpec,
    slots: Vec<Option<Bucket>>,
    /// Starts of buckets not yet rolled into the next archive. Only tracked
    /// when a next archive exists.
    pending: BTreeSet<i64>,
}

impl Archive {
    pub(crate) fn new(spec: ArchiveSpec) -> Self {
        Self {
            spec,
            slots: vec![None; spec.buckets],
            pending: BTreeSet::new(),
        }
    }

    pub(crate) fn step(&self) -> u64 {
        self.spec.step_secs
    }

    pub(crate) fn capacity(&self) -> usize {
        self.spec.buckets
    }

    fn slot(&self, start: i64) -> usize {
        let index = start.div_euclid(self.spec.step_secs as i64);
        index.rem_euclid(self.spec.buckets as i64) as usize
    }

    /// Oldest start that a ring whose newest window is `newest` still holds.
    pub(crate) fn horizon(&self, newest: i64) -> i64 {
        newest - (self.spec.buckets as i64 - 1) * self.spec.step_secs as i64
    }

    /// Fold `delta` (already aligned to this archive) into its bucket.
    pub(crate) fn insert(&mut self, delta: Bucket, track_pending: bool) -> Insert {
        let idx = self.slot(delta.start);
        match &mut self.slots[idx] {
            Some(bucket) if bucket.start == delta.start => {
                bucket.merge(&delta);
                Insert::Merged {
                    propagated: track_pending && !self.pending.contains(&delta.start),
                }
            }
            Some(bucket) if bucket.start > delta.start => Insert::Stale,
            slot => {
                let displaced = slot
                    .replace(delta)
                    .filter(|old| self.pending.remove(&old.start));
                if track_pending {
                    self.pending.insert(delta.start);
                }
                Insert::Opened { displaced }
            }
        }
    }

    /// Oldest bucket start waiting to be rolled up.
    pub(crate) fn oldest_pending(&self) -> Option<i64> {
        self.pending.first().copied()
    }

    /// Clear the pending mark of `start` and return a copy of its bucket.
    pub(crate) fn mark_propagated(&mut self, start: i64) -> Option<Bucket> {
        if !self.pending.remove(&start) {
            return None;
        }
        self.get(start).copied()
    }

    pub(crate) fn get(&self, start: i64) -> Option<&Bucket> {
        self.slots[self.slot(start)]
            .as_ref()
            .filter(|b| b.start == start)
    }

    /// Every stored bucket, in slot order.
    pub(crate) fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.slots.iter().flatten()
    }

    /// Buckets not yet rolled into the next archive.
    pub(crate) fn pending_buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.pending.iter().filter_map(|start| self.get(*start))
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn dump(&self) -> ArchiveDump {
        let mut buckets: Vec<Bucket> = self.buckets().copied().collect();
        buckets.sort_by_key(|b| b.start);
        ArchiveDump {
            buckets,
            pending: self.pending.iter().copied().collect(),
        }
    }

    /// Rebuild from a dump. Buckets that collide in the ring keep the newest.
    pub(crate) fn restore(spec: ArchiveSpec, dump: &ArchiveDump) -> Self {
        let mut archive = Archive::new(spec);
        for bucket in &dump.buckets {
            let idx = archive.slot(bucket.start);
            let keep = archive.slots[idx].map_or(true, |b| b.start < bucket.start);
            if keep {
                archive.slots[idx] = Some(*bucket);
            }
        }
        archive.pending = dump
            .pending
            .iter()
            .copied()
            .filter(|start| archive.get(*start).is_some())
            .collect();
        archive
    }
}
