//! Durable history records.

/// One timestamped measurement in the durable history log.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryRecord {
    /// Epoch seconds.
    pub timestamp: f64,
    /// Measured value.
    pub value: f64,
}

impl HistoryRecord {
    /// Create a record.
    pub const fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Timestamp in whole epoch milliseconds.
    pub fn timestamp_ms(&self) -> i64 {
        (self.timestamp * 1000.0).round() as i64
    }
}
