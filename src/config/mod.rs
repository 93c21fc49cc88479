//! # 配置管理模块
//!
//! - TOML配置文件解析和验证
//! - 环境变量替换和扩展（`${VAR}` / `${VAR:-default}`）
//! - 命令行参数覆盖
//!
//! ## 配置结构
//!
//! - `server`: 监听地址（可选，默认 `127.0.0.1:8080`）
//! - `proxy`: 上游目标地址和响应头超时
//! - `logging`: 日志级别（可选，默认 `info`）
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use pinproxy::config::Config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file_with_env("pinproxy.toml").await?;
//! println!("上游目标: {}", config.proxy.target);
//! # Ok(())
//! # }
//! ```

pub mod logging; // 日志配置模块
pub mod server; // 服务器配置模块
pub mod upstream; // 上游目标配置模块

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use tracing::{info, warn};

pub use logging::LoggingConfig;
pub use server::ServerConfig;
pub use upstream::UpstreamConfig;

/// pinproxy 主配置结构
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// 监听配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 上游目标配置（可由命令行 `--target` 补全）
    #[serde(default)]
    pub proxy: UpstreamConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub target: Option<String>,
    pub timeout_ms: Option<u64>,
    pub bind: Option<SocketAddr>,
    pub level: Option<String>,
}

impl Config {
    /// Configuration for a target given only on the command line
    pub fn for_target<S: Into<String>>(target: S) -> Self {
        Self {
            server: ServerConfig::default(),
            proxy: UpstreamConfig {
                target: target.into(),
                ..UpstreamConfig::default()
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from file with environment variable expansion
    pub async fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_toml_str(&content)?;

        info!("Configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Parse TOML content after expanding environment variables.
    ///
    /// Not validated here: command-line overrides may still fill in the target, so callers run
    /// `validate()` once overrides are applied.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded_content = expand_env_vars(content);
        let config: Config = toml::from_str(&expanded_content)?;
        Ok(config)
    }

    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(target) = overrides.target {
            self.proxy.target = target;
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            self.proxy.timeout_ms = timeout_ms;
        }
        if let Some(bind) = overrides.bind {
            self.server.bind = bind;
        }
        if let Some(level) = overrides.level {
            self.logging.level = level;
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        self.proxy.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Expand environment variables in configuration content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break; // Malformed ${VAR expression
        };

        result.push_str(&rest[..start]);
        let var_expr = &rest[start + 2..start + end];
        let replacement = if let Some(default_pos) = var_expr.find(":-") {
            let var_name = &var_expr[..default_pos];
            let default_value = &var_expr[default_pos + 2..];
            env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        } else {
            env::var(var_expr).unwrap_or_else(|_| {
                warn!(
                    "Environment variable '{}' not found, using empty string",
                    var_expr
                );
                String::new()
            })
        };
        result.push_str(&replacement);
        rest = &rest[start + end + 1..];
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper function to create a temporary config file
    fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[tokio::test]
    async fn test_basic_config_loading() {
        let config_content = r#"
[server]
bind = "127.0.0.1:9090"

[proxy]
target = "socks5h://127.0.0.1:1080"
timeout_ms = 1500

[logging]
level = "debug"
"#;

        let temp_file = create_temp_config_file(config_content);
        let config = Config::from_file_with_env(temp_file.path()).await.unwrap();

        assert_eq!(config.server.bind.to_string(), "127.0.0.1:9090");
        assert_eq!(config.proxy.target, "socks5h://127.0.0.1:1080");
        assert_eq!(config.proxy.timeout_ms, 1500);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_toml_str("[proxy]\ntarget = \"http://backend:9000\"\n").unwrap();

        assert_eq!(config.server.bind.to_string(), "127.0.0.1:8080");
        assert_eq!(config.proxy.timeout_ms, 30_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_var_expansion_in_config() {
        env::set_var("PINPROXY_TEST_BACKEND", "10.1.2.3:7000");

        let config = Config::from_toml_str(
            r#"
[proxy]
target = "http://${PINPROXY_TEST_BACKEND}"
timeout_ms = ${PINPROXY_TEST_TIMEOUT:-250}
"#,
        )
        .unwrap();

        assert_eq!(config.proxy.target, "http://10.1.2.3:7000");
        assert_eq!(config.proxy.timeout_ms, 250);

        env::remove_var("PINPROXY_TEST_BACKEND");
    }

    #[test]
    fn test_expand_env_vars() {
        env::set_var("PINPROXY_TEST_VAR", "test_value");

        let result = expand_env_vars("host = \"${PINPROXY_TEST_VAR}\"");
        assert_eq!(result, "host = \"test_value\"");

        let result = expand_env_vars("host = \"${PINPROXY_MISSING_VAR:-default_value}\"");
        assert_eq!(result, "host = \"default_value\"");

        let result = expand_env_vars("a = \"${UNTERMINATED\"");
        assert_eq!(result, "a = \"${UNTERMINATED\"");

        env::remove_var("PINPROXY_TEST_VAR");
    }

    #[test]
    fn test_config_validation() {
        let blank = Config::from_toml_str("[proxy]\ntarget = \"  \"\n").unwrap();
        assert!(blank.validate().is_err());

        let missing = Config::from_toml_str("[server]\nbind = \"127.0.0.1:1\"\n").unwrap();
        assert!(missing.validate().is_err());

        let chatty = Config::from_toml_str(
            "[proxy]\ntarget = \"http://a\"\n[logging]\nlevel = \"chatty\"\n",
        )
        .unwrap();
        assert!(chatty.validate().is_err());

        assert!(Config::from_toml_str("[proxy]\ntimeout_ms = \"soon\"\n").is_err());
    }

    #[tokio::test]
    async fn test_cli_target_completes_file_without_target() {
        let temp_file = create_temp_config_file(
            r#"
[server]
bind = "127.0.0.1:9191"

[proxy]
timeout_ms = 750
"#,
        );
        let mut config = Config::from_file_with_env(temp_file.path()).await.unwrap();
        assert!(config.validate().is_err());

        config.apply_overrides(Overrides {
            target: Some("http://backend:9000".into()),
            ..Overrides::default()
        });
        config.validate().unwrap();
        assert_eq!(config.proxy.target, "http://backend:9000");
        assert_eq!(config.proxy.timeout_ms, 750);
        assert_eq!(config.server.bind.to_string(), "127.0.0.1:9191");
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::for_target("http://from-file:80");
        config.apply_overrides(Overrides {
            target: Some("socks5://127.0.0.1:1080".into()),
            timeout_ms: Some(0),
            bind: Some("0.0.0.0:3128".parse().unwrap()),
            level: None,
        });

        assert_eq!(config.proxy.target, "socks5://127.0.0.1:1080");
        assert_eq!(config.proxy.timeout_ms, 0);
        assert_eq!(config.server.bind.to_string(), "0.0.0.0:3128");
        assert_eq!(config.logging.level, "info");
    }
}
