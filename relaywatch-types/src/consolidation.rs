//! Consolidation functions used to fold samples into buckets.

use core::fmt;
use core::str::FromStr;

/// Rule used to turn the samples of a bucket into one value.
///
/// The same rule is applied when a finalized bucket is rolled up into a
/// coarser archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Consolidation {
    /// Mean of all samples in the window.
    #[default]
    Average,
    /// Sum of all samples; used for event counters.
    Sum,
    /// Smallest sample.
    Min,
    /// Largest sample.
    Max,
    /// Sample with the latest timestamp.
    Last,
}

impl Consolidation {
    /// All supported functions, in declaration order.
    pub const ALL: [Consolidation; 5] = [
        Consolidation::Average,
        Consolidation::Sum,
        Consolidation::Min,
        Consolidation::Max,
        Consolidation::Last,
    ];

    /// Upper-case name as used on the wire (`AVERAGE`, `SUM`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Average => "AVERAGE",
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Last => "LAST",
        }
    }
}

impl fmt::Display for Consolidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown consolidation name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownConsolidation(pub String);

impl fmt::Display for UnknownConsolidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown consolidation function: {}", self.0)
    }
}

impl std::error::Error for UnknownConsolidation {}

impl FromStr for Consolidation {
    type Err = UnknownConsolidation;

    /// Case-insensitive; `avg` and `mean` are accepted for `AVERAGE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "average" | "avg" | "mean" => Ok(Self::Average),
            "sum" => Ok(Self::Sum),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "last" => Ok(Self::Last),
            _ => Err(UnknownConsolidation(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("AVERAGE".parse::<Consolidation>(), Ok(Consolidation::Average));
        assert_eq!("avg".parse::<Consolidation>(), Ok(Consolidation::Average));
        assert_eq!("Sum".parse::<Consolidation>(), Ok(Consolidation::Sum));
        assert_eq!(" last ".parse::<Consolidation>(), Ok(Consolidation::Last));
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "median".parse::<Consolidation>().unwrap_err();
        assert_eq!(err.to_string(), "unknown consolidation function: median");
    }

    #[test]
    fn display_matches_wire_name() {
        for cf in Consolidation::ALL {
            assert_eq!(cf.to_string(), cf.as_str());
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_upper_case() {
        let json = serde_json::to_string(&Consolidation::Max).unwrap();
        assert_eq!(json, "\"MAX\"");
    }
}
