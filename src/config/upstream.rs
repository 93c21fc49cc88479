use serde::{Deserialize, Serialize};

/// Upstream target configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Absolute URL of the backend; `socks5://` and `socks5h://` select the SOCKS5 transport
    #[serde(default)]
    pub target: String,
    /// Response-header timeout in milliseconds, 0 disables it
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl UpstreamConfig {
    /// Validate upstream configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.target.trim().is_empty() {
            return Err(anyhow::anyhow!("proxy.target cannot be empty"));
        }
        Ok(())
    }
}
