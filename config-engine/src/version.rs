use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// KOM-LE protocol version as carried in the `X-KOM-LE-Version` header.
///
/// Each official version maps to an inner version used for ordering;
/// `1.5+` is inner `1.5.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawVersion", into = "String")]
pub enum KomLeVersion {
    V1_0,
    V1_5,
    V1_5Plus,
}

impl KomLeVersion {
    pub const ALL: [KomLeVersion; 3] = [KomLeVersion::V1_0, KomLeVersion::V1_5, KomLeVersion::V1_5Plus];

    /// Header value.
    pub fn official(self) -> &'static str {
        match self {
            KomLeVersion::V1_0 => "1.0",
            KomLeVersion::V1_5 => "1.5",
            KomLeVersion::V1_5Plus => "1.5+",
        }
    }

    pub fn inner(self) -> &'static str {
        match self {
            KomLeVersion::V1_0 => "1.0",
            KomLeVersion::V1_5 => "1.5",
            KomLeVersion::V1_5Plus => "1.5.1",
        }
    }

    /// `(major, minor, patch)` of the inner version.
    pub fn inner_triple(self) -> (u8, u8, u8) {
        match self {
            KomLeVersion::V1_0 => (1, 0, 0),
            KomLeVersion::V1_5 => (1, 5, 0),
            KomLeVersion::V1_5Plus => (1, 5, 1),
        }
    }

    /// `true` when a mail of `other` can be processed by this version.
    pub fn supports(self, other: KomLeVersion) -> bool {
        self.inner_triple() >= other.inner_triple()
    }
}

impl fmt::Display for KomLeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.official())
    }
}

impl FromStr for KomLeVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        KomLeVersion::ALL
            .iter()
            .copied()
            .find(|v| v.official() == value)
            .ok_or_else(|| ConfigError::InvalidVersion(value.to_string()))
    }
}

/// Environment values such as `1.5` arrive as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Text(String),
    Number(f64),
}

impl TryFrom<RawVersion> for KomLeVersion {
    type Error = ConfigError;

    fn try_from(value: RawVersion) -> Result<Self, Self::Error> {
        match value {
            RawVersion::Text(text) => text.parse(),
            RawVersion::Number(number) => format!("{number:.1}").parse(),
        }
    }
}

impl From<KomLeVersion> for String {
    fn from(version: KomLeVersion) -> Self {
        version.official().to_string()
    }
}
