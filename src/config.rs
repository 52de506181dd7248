use serde::{Deserialize, Serialize};

use crate::bulk::{BulkFlags, DEFAULT_ROWS};
use crate::core::{BulkError, Result};
use crate::platform::Platform;

/// Defaults applied by `execute()` on bulk operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Maximum rows per generated statement
    pub max_rows: usize,

    /// Flags used when none are passed explicitly
    pub flags: BulkFlags,

    /// Dialect override, otherwise the executor's platform is used
    pub platform: Option<Platform>,
}

impl BulkConfig {
    pub fn new() -> Self {
        Self {
            max_rows: DEFAULT_ROWS,
            flags: BulkFlags::NONE,
            platform: None,
        }
    }

    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn flags(mut self, flags: BulkFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Parses and validates a JSON document, missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_rows == 0 {
            return Err(BulkError::InvalidConfig("max_rows must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self::new()
    }
}
