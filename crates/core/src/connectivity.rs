use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Network state as reported by the platform's default-network callbacks.
///
/// Only `Available` permits a remote write; every other state routes
/// progress into the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    Available,
    #[default]
    Unavailable,
    Losing,
    Lost,
}

impl ConnectivityStatus {
    #[must_use]
    pub fn is_available(self) -> bool {
        matches!(self, ConnectivityStatus::Available)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectivityStatus::Available => "available",
            ConnectivityStatus::Unavailable => "unavailable",
            ConnectivityStatus::Losing => "losing",
            ConnectivityStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown connectivity status: {}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for ConnectivityStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "unavailable" => Ok(Self::Unavailable),
            "losing" => Ok(Self::Losing),
            "lost" => Ok(Self::Lost),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
