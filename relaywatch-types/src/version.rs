//! Schema versioning for persisted store files.

use crate::SCHEMA_VERSION;

/// Minor schema revision written by this library. Additive changes only:
/// fields a reader does not know are ignored, missing ones take defaults.
pub const SCHEMA_MINOR: u32 = 0;

/// Version stamp written into every persisted store snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

/// How a stored snapshot relates to the schema this library writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Written by this schema revision.
    Current,
    /// Older revision of the same major; missing fields take defaults.
    OlderMinor,
    /// Newer revision of the same major; unknown fields are dropped on the
    /// next save.
    NewerMinor,
    /// Different major; the bucket layout cannot be trusted.
    Incompatible,
}

impl Compatibility {
    /// Whether the snapshot may be restored.
    pub fn is_loadable(self) -> bool {
        !matches!(self, Compatibility::Incompatible)
    }
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// The version written by this library.
    pub const fn current() -> Self {
        Self::new(SCHEMA_VERSION, SCHEMA_MINOR)
    }

    pub fn compatibility(&self) -> Compatibility {
        use std::cmp::Ordering;

        if self.major != SCHEMA_VERSION {
            return Compatibility::Incompatible;
        }
        match self.minor.cmp(&SCHEMA_MINOR) {
            Ordering::Equal => Compatibility::Current,
            Ordering::Less => Compatibility::OlderMinor,
            Ordering::Greater => Compatibility::NewerMinor,
        }
    }

    /// Whether a snapshot stamped with this version can be restored.
    pub fn is_compatible(&self) -> bool {
        self.compatibility().is_loadable()
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl core::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
