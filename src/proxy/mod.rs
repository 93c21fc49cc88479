//! # 代理模块
//!
//! 本模块实现了单后端反向代理：所有入站请求都被转发到同一个预先配置的目标。
//!
//! - 目标地址解析（`target`）
//! - 出站连接器：SOCKS5 隧道或 HTTP 前置代理（`connector`, `transport`）
//! - 请求改写（`director`）
//! - 请求/响应转发与错误转换（`handler`）
//! - HTTP 服务器（`http_server`）
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use pinproxy::proxy::{HttpServerManager, ReverseProxy};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let proxy = ReverseProxy::new("socks5h://127.0.0.1:1080", 30_000)?;
//! let server = HttpServerManager::new("0.0.0.0:8080".parse()?);
//! server.run(proxy, CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod connector; // 出站连接器（SOCKS5 / HTTP 前置代理）
pub mod director; // 请求改写
pub mod handler; // 反向代理核心处理器
pub mod http_server; // HTTP服务器管理器
pub mod target; // 目标地址解析
pub mod transport; // 出站传输层

pub use director::{Director, X_PROXY_TARGET};
pub use handler::{ProxyConfig, ReverseProxy};
pub use http_server::HttpServerManager;
pub use target::Target;
pub use transport::Transport;
