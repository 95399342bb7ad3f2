//! Metadata storage for tracking rule refresh times.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::error::Result;

/// Metadata recording when the rule snapshot was last refreshed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateMetadata {
    #[serde(with = "system_time_serde")]
    pub last_updated: Option<SystemTime>,
}

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => {
                let duration = t.duration_since(UNIX_EPOCH).unwrap_or_default();
                Some(duration.as_secs()).serialize(serializer)
            }
            None => None::<u64>.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
    }
}

impl UpdateMetadata {
    /// Create metadata stamped with the current time.
    pub fn now() -> Self {
        Self {
            last_updated: Some(SystemTime::now()),
        }
    }

    /// Load metadata from a file.
    ///
    /// Returns default metadata if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let meta: Self = serde_json::from_str(&content)?;
        Ok(meta)
    }

    /// Save metadata to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check if a refresh is needed based on the given interval.
    ///
    /// Returns `true` if:
    /// - No last_updated time is recorded
    /// - The elapsed time since last_updated exceeds the interval
    pub fn needs_update(&self, interval: Duration) -> bool {
        match self.last_updated {
            None => true,
            Some(last) => {
                let elapsed = SystemTime::now().duration_since(last).unwrap_or(Duration::MAX);
                elapsed >= interval
            }
        }
    }

    /// Get the last refresh time.
    pub fn last_updated(&self) -> Option<SystemTime> {
        self.last_updated
    }
}
