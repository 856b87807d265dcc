use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// Settings shared by the transport layer and its stream backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum time a single send or receive may take.
    pub timeout: Duration,
    /// Number of frames an in-memory stream buffers before senders wait.
    pub channel_capacity: usize,
    /// zstd level used for frame compression.
    pub compression_level: i32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            channel_capacity: 16,
            compression_level: 3,
        }
    }
}

impl TransportConfig {
    /// Default settings with `timeout` for both directions.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Parse from TOML; missing keys take their default value.
    pub fn from_toml_str(input: &str) -> TransportResult<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| TransportError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the transport cannot run with.
    pub fn validate(&self) -> TransportResult<()> {
        if self.timeout.is_zero() {
            return Err(TransportError::Config("timeout must be positive".into()));
        }
        if self.channel_capacity == 0 {
            return Err(TransportError::Config("channel capacity must be positive".into()));
        }
        if !zstd::compression_level_range().contains(&self.compression_level) {
            return Err(TransportError::Config(format!(
                "compression level {} out of range",
                self.compression_level
            )));
        }
        Ok(())
    }
}
