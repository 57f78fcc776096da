//! A multi-resolution series: update, rollup and windowed reads.

use std::collections::BTreeMap;

use relaywatch_types::{
    align, align_start, Bucket, Consolidation, Point, SeriesDump, SeriesKey, SeriesSpec,
    WindowStats,
};

use crate::archive::{Archive, Insert};

/// Outcome of [`Series::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// Stored in archive `level`; `opened` is set when a new bucket was
    /// started there.
    Stored {
        /// Archive the sample landed in, 0 being the finest.
        level: usize,
        /// Whether the write opened a new bucket.
        opened: bool,
    },
    /// Older than every archive retains; dropped.
    TooOld,
}

/// One series: an ordered ladder of archives, finest first.
///
/// A sample is written to the finest archive whose retention horizon covers
/// it. Finalized buckets are rolled into the next archive by [`rollup_one`]
/// and [`rollup`]; late samples that hit an already rolled-up bucket are
/// forwarded upward immediately so nothing is counted twice or lost.
///
/// [`rollup_one`]: Series::rollup_one
/// [`rollup`]: Series::rollup
#[derive(Debug, Clone)]
pub struct Series {
    spec: SeriesSpec,
    levels: Vec<Archive>,
    latest: Option<f64>,
}

impl Series {
    /// Empty series. The spec is expected to be validated already.
    pub fn new(spec: SeriesSpec) -> Self {
        let levels = spec.archives.iter().copied().map(Archive::new).collect();
        Self {
            spec,
            levels,
            latest: None,
        }
    }

    /// The spec this series was created with.
    pub fn spec(&self) -> &SeriesSpec {
        &self.spec
    }

    /// Newest accepted sample time.
    pub fn latest(&self) -> Option<f64> {
        self.latest
    }

    /// Number of archives.
    pub fn levels(&self) -> usize {
        self.levels.len()
    }

    fn horizon_at(&self, level: usize, latest: f64) -> i64 {
        let archive = &self.levels[level];
        archive.horizon(align(latest, archive.step()))
    }

    /// Oldest bucket start archive `level` currently retains.
    pub fn horizon(&self, level: usize) -> Option<i64> {
        let latest = self.latest?;
        (level < self.levels.len()).then(|| self.horizon_at(level, latest))
    }

    /// Fold one sample in.
    pub fn update(&mut self, value: f64, ts: f64) -> Update {
        let latest = self.latest.map_or(ts, |l| l.max(ts));
        let level = (0..self.levels.len()).find(|&level| {
            align(ts, self.levels[level].step()) >= self.horizon_at(level, latest)
        });
        let Some(level) = level else {
            return Update::TooOld;
        };

        self.latest = Some(latest);
        let start = align(ts, self.levels[level].step());
        let opened = self.absorb(level, Bucket::from_sample(start, value, ts));
        Update::Stored { level, opened }
    }

    /// Fold `delta` into archive `level`, cascading upward where needed.
    /// Returns whether a new bucket was opened at `level`.
    fn absorb(&mut self, level: usize, delta: Bucket) -> bool {
        let has_next = level + 1 < self.levels.len();
        match self.levels[level].insert(delta, has_next) {
            Insert::Merged { propagated: true } => {
                self.forward(level, delta);
                false
            }
            Insert::Merged { propagated: false } => false,
            Insert::Opened { displaced } => {
                if let Some(old) = displaced {
                    self.forward(level, old);
                }
                true
            }
            Insert::Stale => {
                tracing::debug!(level, start = delta.start, "delta older than archive, dropped");
                false
            }
        }
    }

    fn forward(&mut self, level: usize, bucket: Bucket) {
        if let Some(next) = self.levels.get(level + 1) {
            let start = align_start(bucket.start, next.step());
            self.absorb(level + 1, bucket.rebased(start));
        }
    }

    /// Roll the oldest finalized, not yet propagated bucket of the finest
    /// archive that has one into the next archive. A bucket is finalized once
    /// `now` has reached the end of its window.
    ///
    /// Returns `false` when there was nothing to do.
    pub fn rollup_one(&mut self, now: f64) -> bool {
        for level in 0..self.levels.len().saturating_sub(1) {
            let archive = &self.levels[level];
            let Some(start) = archive.oldest_pending() else {
                continue;
            };
            if (start + archive.step() as i64) as f64 > now {
                continue;
            }
            if let Some(bucket) = self.levels[level].mark_propagated(start) {
                self.forward(level, bucket);
            }
            return true;
        }
        false
    }

    /// Run [`rollup_one`](Self::rollup_one) until nothing is left; returns the
    /// number of buckets propagated.
    pub fn rollup(&mut self, now: f64) -> usize {
        let mut n = 0;
        while self.rollup_one(now) {
            n += 1;
        }
        n
    }

    /// Buckets waiting for rollup, across all archives.
    pub fn pending(&self) -> usize {
        self.levels.iter().map(Archive::pending_len).sum()
    }

    /// Buckets retained by archive `level`, oldest first.
    pub fn buckets(&self, level: usize) -> Vec<Bucket> {
        let (Some(archive), Some(horizon)) = (self.levels.get(level), self.horizon(level)) else {
            return Vec::new();
        };
        let mut out: Vec<Bucket> = archive
            .buckets()
            .filter(|b| b.start >= horizon)
            .copied()
            .collect();
        out.sort_by_key(|b| b.start);
        out
    }

    /// Content of archive `level` as if every pending bucket below it had
    /// already been rolled up.
    fn view(&self, level: usize) -> BTreeMap<i64, Bucket> {
        let step = self.levels[level].step();
        let mut view: BTreeMap<i64, Bucket> =
            self.levels[level].buckets().map(|b| (b.start, *b)).collect();
        for lower in &self.levels[..level] {
            for bucket in lower.pending_buckets() {
                let start = align_start(bucket.start, step);
                view.entry(start)
                    .and_modify(|b| b.merge(bucket))
                    .or_insert_with(|| bucket.rebased(start));
            }
        }
        view
    }

    /// Copy out the buckets overlapping `[from, to]`.
    ///
    /// Uses the finest archive whose step is at most `resolution` (any step
    /// when `None`) and whose horizon covers `from`. When none covers `from`,
    /// recent data comes from the coarsest eligible archive (the finest one
    /// when `resolution` is `None`) and older data is stitched in from
    /// successively coarser ones; every boundary is aligned to the coarser
    /// step so no sample is counted twice.
    ///
    /// A window with `to < from` is empty.
    pub fn window(&self, from: f64, to: f64, resolution: Option<u64>) -> SeriesWindow {
        let mut window = SeriesWindow {
            consolidation: self.spec.consolidation,
            step: self.levels.first().map_or(0, Archive::step),
            buckets: Vec::new(),
        };
        let Some(latest) = self.latest else {
            return window;
        };
        if self.levels.is_empty() || !(to >= from) {
            return window;
        }

        let last = self.levels.len() - 1;
        let max_level = match resolution {
            Some(res) => (0..=last)
                .rev()
                .find(|&l| self.levels[l].step() <= res)
                .unwrap_or(0),
            None => last,
        };
        let covers =
            |level: usize| align(from, self.levels[level].step()) >= self.horizon_at(level, latest);
        let primary = (0..=max_level)
            .find(|&l| covers(l))
            .unwrap_or(if resolution.is_some() { max_level } else { 0 });
        window.step = self.levels[primary].step();

        // (level, lo inclusive, hi exclusive), newest region first
        let mut regions: Vec<(usize, i64, Option<i64>)> = Vec::new();
        let mut hi = None;
        let mut level = primary;
        loop {
            let horizon = self.horizon_at(level, latest);
            if level == last || covers(level) {
                regions.push((level, horizon, hi));
                break;
            }
            let boundary = ceil_to(horizon, self.levels[level + 1].step());
            regions.push((level, boundary, hi));
            hi = Some(boundary);
            level += 1;
        }

        for (level, lo, hi) in regions.into_iter().rev() {
            let step = self.levels[level].step() as i64;
            window.buckets.extend(self.view(level).into_values().filter(|b| {
                b.start >= lo
                    && hi.map_or(true, |hi| b.start < hi)
                    && (b.start + step) as f64 > from
                    && b.start as f64 <= to
            }));
        }
        window
    }

    /// Serializable copy of the series state.
    pub fn dump(&self, key: SeriesKey) -> SeriesDump {
        SeriesDump {
            key,
            spec: self.spec.clone(),
            latest: self.latest,
            archives: self.levels.iter().map(Archive::dump).collect(),
        }
    }

    /// Rebuild a series from a dump taken with the same spec.
    pub fn restore(dump: &SeriesDump) -> Self {
        let levels = dump
            .spec
            .archives
            .iter()
            .enumerate()
            .map(|(i, spec)| match dump.archives.get(i) {
                Some(archive) => Archive::restore(*spec, archive),
                None => Archive::new(*spec),
            })
            .collect();
        Self {
            spec: dump.spec.clone(),
            levels,
            latest: dump.latest,
        }
    }
}

fn ceil_to(t: i64, step: u64) -> i64 {
    let step = step.max(1) as i64;
    -((-t).div_euclid(step)) * step
}

/// Buckets copied out of a series for one query window.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesWindow {
    /// Consolidation function of the series.
    pub consolidation: Consolidation,
    /// Step of the finest archive the window was served from.
    pub step: u64,
    /// Buckets, oldest first. Windows without data are absent.
    pub buckets: Vec<Bucket>,
}

impl SeriesWindow {
    /// Empty window.
    pub fn empty(consolidation: Consolidation, step: u64) -> Self {
        Self {
            consolidation,
            step,
            buckets: Vec::new(),
        }
    }

    /// Consolidated points using the series' own function.
    pub fn points(&self) -> Vec<Point> {
        self.points_with(self.consolidation)
    }

    /// Consolidated points using `cf`.
    pub fn points_with(&self, cf: Consolidation) -> Vec<Point> {
        self.buckets.iter().map(|b| b.point(cf)).collect()
    }

    /// Statistics over every sample in the window.
    pub fn stats(&self) -> WindowStats {
        WindowStats::from_buckets(&self.buckets)
    }

    /// Sum of every sample in the window.
    pub fn total(&self) -> f64 {
        self.buckets.iter().map(|b| b.sum).sum()
    }

    /// Whether no bucket overlapped the window.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
