//! Durable, time-ordered history log for full-fidelity metrics.
//!
//! Records live in memory ordered by timestamp and are mirrored to a
//! newline-delimited JSON file. Appends go through a buffered writer that is
//! flushed explicitly, so an unclean shutdown may lose the unflushed tail.

use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use relaywatch_types::{HistoryRecord, WindowStats};

use crate::clock::Clock;
use crate::error::{Result, StatsError};

/// Default retention: one week.
pub const DEFAULT_RETENTION_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// Default number of appends between in-memory prunes.
pub const DEFAULT_PRUNE_EVERY: usize = 256;

#[derive(Debug)]
struct LogInner {
    records: VecDeque<HistoryRecord>,
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    degraded: Option<String>,
    appends_since_prune: usize,
    /// Lines in the file that are no longer in memory.
    stale_lines: usize,
}

impl LogInner {
    fn degrade(&mut self, err: impl fmt::Display) {
        tracing::error!(error = %err, path = ?self.path, "history log degraded to memory-only mode");
        self.writer = None;
        self.degraded = Some(err.to_string());
    }

    fn expire(&mut self, cutoff: f64) -> usize {
        let keep_from = self.records.partition_point(|r| r.timestamp < cutoff);
        self.records.drain(..keep_from);
        self.stale_lines += keep_from;
        keep_from
    }

    fn write_line(&mut self, record: &HistoryRecord) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let result = serde_json::to_writer(&mut *writer, record)
            .map_err(StatsError::from)
            .and_then(|()| writer.write_all(b"\n").map_err(StatsError::from));
        if let Err(e) = result {
            self.degrade(e);
        }
    }

    /// Load `path` and open it for appending; degrade on any failure.
    fn attach(&mut self, path: PathBuf, cutoff: f64) {
        self.path = Some(path.clone());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                self.degrade(e);
                return;
            }
        }

        match load(&path) {
            Ok((records, skipped)) => {
                self.records = records.into();
                self.stale_lines = skipped;
                let expired = self.expire(cutoff);
                tracing::info!(
                    path = %path.display(),
                    records = self.records.len(),
                    expired,
                    "history log loaded"
                );
            }
            Err(e) => {
                self.degrade(e);
                return;
            }
        }

        match open_append(&path) {
            Ok(file) => self.writer = Some(BufWriter::new(file)),
            Err(e) => self.degrade(e),
        }
    }

    /// Rewrite the file with only the records still in memory.
    fn compact(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }

        let tmp = path.with_extension("tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for record in &self.records {
                serde_json::to_writer(&mut out, record)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
        }
        fs::rename(&tmp, &path)?;
        self.writer = Some(BufWriter::new(open_append(&path)?));
        self.stale_lines = 0;
        Ok(())
    }

    /// Dead lines have reached a quarter of the live records.
    fn needs_compaction(&self) -> bool {
        self.stale_lines > 0 && self.stale_lines * 4 >= self.records.len()
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Read every parseable record from `path`, skipping corrupt lines.
/// Returns the records and the number of lines skipped.
fn load(path: &Path) -> std::io::Result<(Vec<HistoryRecord>, usize)> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };

    let mut records = Vec::new();
    let mut skipped = 0;
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryRecord>(&line) {
            Ok(r) if r.timestamp.is_finite() && r.value.is_finite() => records.push(r),
            Ok(_) => {
                tracing::warn!(line = n + 1, path = %path.display(), "skipping non-finite history record");
                skipped += 1;
            }
            Err(e) => {
                tracing::warn!(line = n + 1, path = %path.display(), error = %e, "skipping corrupt history record");
                skipped += 1;
            }
        }
    }
    records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    Ok((records, skipped))
}

/// Append-only log of `(timestamp, value)` records with time-based retention.
#[derive(Debug)]
pub struct HistoryLog {
    inner: Mutex<LogInner>,
    retention: f64,
    prune_every: usize,
    clock: Arc<dyn Clock>,
}

impl HistoryLog {
    /// A log that is never written to disk.
    pub fn in_memory(retention: f64, prune_every: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(LogInner {
                records: VecDeque::new(),
                path: None,
                writer: None,
                degraded: None,
                appends_since_prune: 0,
                stale_lines: 0,
            }),
            retention,
            prune_every: prune_every.max(1),
            clock,
        }
    }

    /// Reload the log persisted at `path` and keep appending to it.
    ///
    /// Never fails: if the file cannot be read or opened the log starts
    /// degraded (memory only) and [`is_degraded`](Self::is_degraded) says so.
    pub fn open(
        path: impl Into<PathBuf>,
        retention: f64,
        prune_every: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let path = path.into();
        let log = Self::in_memory(retention, prune_every, clock);
        let cutoff = log.cutoff();
        log.inner.lock().attach(path, cutoff);
        log
    }

    fn cutoff(&self) -> f64 {
        self.clock.now() - self.retention
    }

    /// Append `value` at `timestamp` (default now).
    ///
    /// Out-of-order records are inserted at their sorted position. Every
    /// `prune_every` appends, expired records are dropped from memory.
    pub fn append(&self, value: f64, timestamp: Option<f64>) {
        let timestamp = timestamp.unwrap_or_else(|| self.clock.now());
        if !value.is_finite() || !timestamp.is_finite() {
            tracing::debug!(value, timestamp, "non-finite history record ignored");
            return;
        }
        let record = HistoryRecord::new(timestamp, value);

        let mut inner = self.inner.lock();
        match inner.records.back() {
            Some(last) if last.timestamp > timestamp => {
                let at = inner.records.partition_point(|r| r.timestamp <= timestamp);
                inner.records.insert(at, record);
            }
            _ => inner.records.push_back(record),
        }
        inner.write_line(&record);

        inner.appends_since_prune += 1;
        if inner.appends_since_prune >= self.prune_every {
            inner.appends_since_prune = 0;
            inner.expire(self.cutoff());
        }
    }

    /// Records with `from <= timestamp <= to`, ascending.
    pub fn range(&self, from: f64, to: f64) -> Vec<HistoryRecord> {
        if !(to >= from) {
            return Vec::new();
        }
        let inner = self.inner.lock();
        let start = inner.records.partition_point(|r| r.timestamp < from);
        inner
            .records
            .range(start..)
            .take_while(|r| r.timestamp <= to)
            .copied()
            .collect()
    }

    /// Statistics over [`range`](Self::range).
    pub fn stats(&self, from: f64, to: f64) -> WindowStats {
        WindowStats::from_values(self.range(from, to).into_iter().map(|r| r.value))
    }

    /// Drop expired records, compacting the backing file once enough of
    /// it is dead. Returns the number of records dropped from memory.
    pub fn prune(&self) -> usize {
        let cutoff = self.cutoff();
        let mut inner = self.inner.lock();
        let dropped = inner.expire(cutoff);
        if inner.needs_compaction() && inner.degraded.is_none() {
            if let Err(e) = inner.compact() {
                inner.degrade(e);
            }
        }
        dropped
    }

    /// Push buffered appends to disk.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.degraded {
            return Err(StatsError::Degraded(reason.clone()));
        }
        let Some(writer) = inner.writer.as_mut() else {
            return Ok(());
        };
        if let Err(e) = writer.flush() {
            let reason = e.to_string();
            inner.degrade(e);
            return Err(StatsError::Degraded(reason));
        }
        Ok(())
    }

    /// Records currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Whether the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    /// Whether the log lost its file and runs in memory only.
    pub fn is_degraded(&self) -> bool {
        self.inner.lock().degraded.is_some()
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<PathBuf> {
        self.inner.lock().path.clone()
    }

    /// Configured retention in seconds.
    pub fn retention(&self) -> f64 {
        self.retention
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const DAY: f64 = 86_400.0;

    fn clock(now: f64) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(now))
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let log = HistoryLog::in_memory(DAY, 16, clock(1_000.0));
        for (t, v) in [(0.0, -95.0), (120.0, -100.0), (60.0, -90.0)] {
            log.append(v, Some(t));
        }

        let all: Vec<_> = log.range(0.0, 120.0).iter().map(|r| r.value).collect();
        assert_eq!(all, vec![-95.0, -90.0, -100.0]);
        assert_eq!(log.range(60.0, 60.0).len(), 1);
        assert!(log.range(121.0, 500.0).is_empty());
        assert!(log.range(120.0, 0.0).is_empty());
    }

    #[test]
    fn stats_over_three_records() {
        let log = HistoryLog::in_memory(DAY, 16, clock(1_000.0));
        log.append(-95.0, Some(0.0));
        log.append(-90.0, Some(60.0));
        log.append(-100.0, Some(120.0));

        let stats = log.stats(0.0, 120.0);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.average, Some(-95.0));
        assert_eq!(stats.min, Some(-100.0));
        assert_eq!(stats.max, Some(-90.0));
        assert_eq!(stats.std_dev, Some(5.0));
    }

    #[test]
    fn empty_and_single_record_stats() {
        let log = HistoryLog::in_memory(DAY, 16, clock(1_000.0));
        assert_eq!(log.stats(0.0, 100.0), WindowStats::EMPTY);

        log.append(-97.5, Some(10.0));
        let stats = log.stats(0.0, 100.0);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.average, Some(-97.5));
        assert_eq!(stats.min, stats.max);
        assert_eq!(stats.std_dev, None);
    }

    #[test]
    fn periodic_prune_drops_expired_front() {
        let clock = clock(0.0);
        let log = HistoryLog::in_memory(100.0, 3, clock.clone());
        log.append(1.0, Some(0.0));
        log.append(2.0, Some(10.0));
        clock.set(150.0);
        // third append triggers the prune; cutoff is 50
        log.append(3.0, None);
        assert_eq!(log.len(), 1);
        assert_eq!(log.range(0.0, 200.0)[0].value, 3.0);
    }

    #[test]
    fn reloads_from_disk_after_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise_floor.ndjson");
        let clock = clock(1_000.0);

        let log = HistoryLog::open(&path, DAY, 16, clock.clone());
        assert!(!log.is_degraded());
        log.append(-95.0, Some(900.0));
        log.append(-91.0, Some(950.0));
        log.flush().unwrap();
        drop(log);

        let reopened = HistoryLog::open(&path, DAY, 16, clock);
        let values: Vec<_> = reopened.range(0.0, 1_000.0).iter().map(|r| r.value).collect();
        assert_eq!(values, vec![-95.0, -91.0]);
    }

    #[test]
    fn corrupt_lines_and_expired_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.ndjson");
        fs::write(
            &path,
            "{\"timestamp\":10.0,\"value\":-99.0}\n\
             not json\n\
             {\"timestamp\":950.0,\"value\":-92.0}\n\
             {\"timestamp\":900.0,\"value\":-93.0}\n",
        )
        .unwrap();

        let log = HistoryLog::open(&path, 500.0, 16, clock(1_000.0));
        let times: Vec<_> = log.range(0.0, 1_000.0).iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![900.0, 950.0]);

        // prune compacts the file down to the live records
        log.prune();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(!contents.contains("not json"));
    }

    #[test]
    fn compaction_waits_for_enough_dead_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.ndjson");
        let clock = clock(100.0);
        let log = HistoryLog::open(&path, 100.0, 64, clock.clone());

        log.append(-99.0, Some(0.0));
        for i in 0..8 {
            log.append(-90.0, Some(90.0 + i as f64));
        }
        log.flush().unwrap();

        // one dead line against eight live ones: the file is left alone
        clock.set(150.0);
        assert_eq!(log.prune(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 9);

        clock.set(195.0);
        assert_eq!(log.prune(), 5);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn unwritable_location_degrades_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        // a regular file cannot be used as a parent directory
        let log = HistoryLog::open(blocker.join("history.ndjson"), DAY, 16, clock(1_000.0));
        assert!(log.is_degraded());

        log.append(-90.0, Some(999.0));
        assert_eq!(log.len(), 1);
        assert!(matches!(log.flush(), Err(StatsError::Degraded(_))));
    }
}
