use serde::{Deserialize, Serialize};

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(anyhow::anyhow!(
                "Unknown logging level '{}', expected one of {}",
                self.level,
                LEVELS.join(", ")
            ));
        }
        Ok(())
    }

    /// Filter directive for the crate's own spans and events
    pub fn filter_directive(&self) -> String {
        format!("pinproxy={}", self.level.to_ascii_lowercase())
    }
}
