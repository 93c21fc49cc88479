use anyhow::Result;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Server};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::handler::ReverseProxy;

/// HTTP服务器管理器，负责监听端口并把每个请求交给反向代理
pub struct HttpServerManager {
    bind_addr: SocketAddr,
}

impl HttpServerManager {
    /// 创建新的HTTP服务器管理器
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self { bind_addr }
    }

    /// 运行服务器，直到 `shutdown` 被取消
    pub async fn run(self, proxy: ReverseProxy, shutdown: CancellationToken) -> Result<()> {
        let (local_addr, server) = self.start(proxy, shutdown)?;
        info!("Starting HTTP proxy server on {}", local_addr);

        if let Err(e) = server.await {
            error!("HTTP server error: {}", e);
        }

        Ok(())
    }

    /// 绑定端口并返回实际地址和服务器 future（端口为0时由系统分配）
    pub fn start(
        self,
        proxy: ReverseProxy,
        shutdown: CancellationToken,
    ) -> Result<(SocketAddr, impl Future<Output = Result<()>>)> {
        let root = shutdown.clone();
        let make_service = make_service_fn(move |conn: &AddrStream| {
            let proxy = proxy.clone();
            let root = root.clone();
            let remote = conn.remote_addr();
            async move {
                Ok::<_, Infallible>(service_fn(move |mut req: Request<Body>| {
                    let proxy = proxy.clone();
                    let cancel = root.child_token();
                    // 将远程地址附加到请求扩展中
                    req.extensions_mut().insert(remote);
                    async move {
                        // 客户端断开时 hyper 会丢弃此 future，guard 随之取消上游请求
                        let guard = cancel.clone().drop_guard();
                        let resp = proxy.serve(req, cancel).await;
                        guard.disarm();
                        Ok::<_, Infallible>(resp)
                    }
                }))
            }
        });

        let server = Server::try_bind(&self.bind_addr)?.serve(make_service);
        let local_addr = server.local_addr();
        let graceful = server.with_graceful_shutdown(shutdown.cancelled_owned());

        Ok((local_addr, async move { graceful.await.map_err(Into::into) }))
    }
}
