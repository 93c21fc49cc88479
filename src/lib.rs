//! # pinproxy - 单后端反向代理
//!
//! pinproxy 把每一个入站 HTTP 请求都转发到同一个预先配置的上游，
//! 不论请求原本指向哪个地址。上游可以直接访问，也可以经由 SOCKS5 隧道访问，
//! 由目标地址的 scheme 决定。
//!
//! ## 核心功能
//!
//! - **固定目标**: 改写请求的 scheme、authority 和 `Host`，并添加 `X-Proxy-Target`
//! - **两种传输**: `socks5://` / `socks5h://` 走 SOCKS5，其余 scheme 把目标当作 HTTP 前置代理
//! - **流式转发**: 响应体逐块转发，不做整体缓冲
//! - **超时与取消**: 响应头超时返回 502，客户端断开时释放上游连接
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use pinproxy::proxy::ReverseProxy;
//! use hyper::{Body, Request};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let proxy = ReverseProxy::new("http://backend.local:9000", 2000)?;
//! let req = Request::get("http://anything.example/foo").body(Body::empty())?;
//! let resp = proxy.handle_request(req).await?;
//! println!("status: {}", resp.status());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod proxy;

// Re-export commonly used types
pub use error::{ProxyError, ProxyResult};
pub use proxy::{ReverseProxy, Target};
