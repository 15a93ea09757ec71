//! Selection algorithm identifiers.

use std::fmt;

use serde::{Serialize, Serializer};

/// The closed set of selection algorithms.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    #[default]
    RoundRobin = 0,
    LeastConnections = 1,
    Weighted = 2,
    Random = 3,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::RoundRobin,
        Algorithm::LeastConnections,
        Algorithm::Weighted,
        Algorithm::Random,
    ];

    /// Exact, case-sensitive lookup.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }

    /// Like [`Algorithm::parse`], but unrecognized names fall back to round-robin.
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            tracing::warn!(algorithm = %name, "Unknown algorithm, falling back to ROUND_ROBIN");
            Algorithm::RoundRobin
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "ROUND_ROBIN",
            Algorithm::LeastConnections => "LEAST_CONNECTIONS",
            Algorithm::Weighted => "WEIGHTED",
            Algorithm::Random => "RANDOM",
        }
    }
}

impl From<u8> for Algorithm {
    fn from(val: u8) -> Self {
        match val {
            1 => Algorithm::LeastConnections,
            2 => Algorithm::Weighted,
            3 => Algorithm::Random,
            _ => Algorithm::RoundRobin,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
