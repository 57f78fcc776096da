//! Human duration strings used in configuration files.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer};

/// Suffix to seconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ms", 0.001),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3_600.0),
    ("d", 86_400.0),
];

/// Parse duration strings like "500ms", "60s", "5m", "1.5h", "7d".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            return seconds(val_str.trim().parse::<f64>()? * multiplier, s);
        }
    }
    match s.parse::<f64>() {
        Ok(secs) => seconds(secs, s),
        Err(_) => bail!("Unknown duration format: {}", s),
    }
}

fn seconds(secs: f64, original: &str) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) => Ok(d),
        Err(_) => bail!("Duration out of range: {}", original),
    }
}

/// Format a duration the way [`parse_duration`] reads it back.
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis % 1_000 != 0 {
        format!("{}ms", millis)
    } else {
        let secs = d.as_secs();
        match secs {
            0 => "0s".to_string(),
            s if s % 86_400 == 0 => format!("{}d", s / 86_400),
            s if s % 3_600 == 0 => format!("{}h", s / 3_600),
            s if s % 60 == 0 => format!("{}m", s / 60),
            s => format!("{}s", s),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Secs(u64),
    Text(String),
}

/// Serde helper: a duration given as a human string or whole seconds.
pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match Repr::deserialize(deserializer)? {
        Repr::Secs(secs) => Ok(Duration::from_secs(secs)),
        Repr::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
