//! Coupling to the radio driver: noise-floor readings.

use crate::error::StatsError;

/// Something that can read the raw noise-floor register of the radio.
pub trait NoiseFloorSource: Send + Sync {
    /// Raw register value; dBm is `-(raw / 2)`.
    fn read_raw(&self) -> Result<i32, StatsError>;
}

impl<F> NoiseFloorSource for F
where
    F: Fn() -> Result<i32, StatsError> + Send + Sync,
{
    fn read_raw(&self) -> Result<i32, StatsError> {
        self()
    }
}

/// Convert a raw register value to dBm.
pub fn noise_floor_dbm(raw: i32) -> f64 {
    -(f64::from(raw) / 2.0)
}

/// Read the noise floor in dBm. Failures are logged at debug level and
/// give `None`.
pub fn sample_noise_floor(source: &dyn NoiseFloorSource) -> Option<f64> {
    match source.read_raw() {
        Ok(raw) => Some(noise_floor_dbm(raw)),
        Err(e) => {
            tracing::debug!(error = %e, "noise floor read failed");
            None
        }
    }
}

/// Sample `source` every `interval` and record each successful reading.
///
/// Runs until the returned task is aborted.
#[cfg(feature = "tokio")]
pub fn spawn_sampler(
    source: std::sync::Arc<dyn NoiseFloorSource>,
    recorder: crate::Recorder,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        loop {
            timer.tick().await;
            if let Some(dbm) = sample_noise_floor(source.as_ref()) {
                recorder.record_noise_floor(dbm, None);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn raw_register_halves_and_negates() {
        assert_eq!(noise_floor_dbm(220), -110.0);
        assert_eq!(noise_floor_dbm(201), -100.5);
        assert_eq!(noise_floor_dbm(0), 0.0);
    }

    #[test]
    fn read_errors_become_none() {
        let failing =
            || -> Result<i32, StatsError> { Err(StatsError::Radio("spi timeout".into())) };
        assert_eq!(sample_noise_floor(&failing), None);

        let ok = || -> Result<i32, StatsError> { Ok(190) };
        assert_eq!(sample_noise_floor(&ok), Some(-95.0));
    }

    #[cfg(feature = "tokio")]
    #[tokio::test(start_paused = true)]
    async fn sampler_records_successful_readings() {
        use std::sync::Arc;
        use std::time::Duration;

        let stats = crate::RelayStats::builder()
            .clock(Arc::new(crate::ManualClock::new(1_000.0)))
            .build()
            .unwrap();

        // every other read fails
        let calls = Arc::new(AtomicI32::new(0));
        let counter = calls.clone();
        let source = move || -> Result<i32, StatsError> {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                Ok(200)
            } else {
                Err(StatsError::Radio("busy".into()))
            }
        };

        let task = spawn_sampler(Arc::new(source), stats.recorder(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(35)).await;
        task.abort();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(stats.noise_floor_log().len(), 2);
        assert_eq!(stats.query().history_stats(0.0, 2_000.0).average, Some(-100.0));
    }
}
