//! Outbound connectors handed to the hyper client.
//!
//! Both connectors ignore the usual "connect to the request's authority" rule in their own way:
//! `SocksConnector` tunnels every connection through one SOCKS5 server, `ForwardProxyConnector`
//! dials the configured target for every request and reports the connection as proxied.

use hyper::client::connect::{Connected, Connection};
use hyper::client::HttpConnector;
use hyper::service::Service;
use hyper::Uri;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;
use tracing::debug;

use super::target::{Credentials, Target};
use crate::error::{ProxyError, ProxyResult};

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send>>;

/// Dials destinations through a SOCKS5 server
#[derive(Clone, Debug)]
pub struct SocksConnector {
    inner: Arc<SocksSettings>,
}

#[derive(Debug)]
struct SocksSettings {
    proxy_addr: String,
    credentials: Option<Credentials>,
    resolve_remotely: bool,
}

impl SocksConnector {
    /// Build a connector rooted at the target's SOCKS5 server.
    ///
    /// Credentials are checked here so a bad userinfo fails construction instead of every request.
    pub fn new(target: &Target) -> ProxyResult<Self> {
        if let Some(creds) = target.credentials() {
            if creds.username.is_empty() || creds.username.len() > 255 {
                return Err(ProxyError::config(
                    "SOCKS5 username must be between 1 and 255 bytes",
                ));
            }
            if creds.password.len() > 255 {
                return Err(ProxyError::config(
                    "SOCKS5 password must be at most 255 bytes",
                ));
            }
        }

        Ok(Self {
            inner: Arc::new(SocksSettings {
                proxy_addr: target.socks_addr(),
                credentials: target.credentials().cloned(),
                resolve_remotely: target.resolves_remotely(),
            }),
        })
    }

    pub fn proxy_addr(&self) -> &str {
        &self.inner.proxy_addr
    }

    async fn connect(settings: Arc<SocksSettings>, dst: Uri) -> Result<SocksStream, BoxError> {
        let host = dst
            .host()
            .ok_or_else(|| ProxyError::gateway(format!("destination has no host: {}", dst)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = dst.port_u16().unwrap_or_else(|| default_port(&dst));

        debug!(
            "SOCKS5 dial {}:{} via {}",
            host, port, settings.proxy_addr
        );

        let proxy = settings.proxy_addr.as_str();
        let stream = match host.parse::<IpAddr>() {
            Ok(ip) => socks_connect(proxy, SocketAddr::new(ip, port), &settings).await?,
            Err(_) if settings.resolve_remotely => {
                socks_connect(proxy, (host.as_str(), port), &settings).await?
            }
            Err(_) => {
                let addr = tokio::net::lookup_host((host.as_str(), port))
                    .await?
                    .next()
                    .ok_or_else(|| {
                        ProxyError::gateway(format!("no addresses found for {}", host))
                    })?;
                socks_connect(proxy, addr, &settings).await?
            }
        };

        Ok(SocksStream(stream))
    }
}

async fn socks_connect<'t, T>(
    proxy: &str,
    target: T,
    settings: &SocksSettings,
) -> Result<Socks5Stream<TcpStream>, tokio_socks::Error>
where
    T: tokio_socks::IntoTargetAddr<'t>,
{
    match &settings.credentials {
        Some(creds) => {
            Socks5Stream::connect_with_password(proxy, target, &creds.username, &creds.password)
                .await
        }
        None => Socks5Stream::connect(proxy, target).await,
    }
}

fn default_port(dst: &Uri) -> u16 {
    default_port_for_scheme(dst.scheme_str().unwrap_or("http"))
}

fn default_port_for_scheme(scheme: &str) -> u16 {
    match scheme {
        "https" => 443,
        _ => 80,
    }
}

impl Service<Uri> for SocksConnector {
    type Response = SocksStream;
    type Error = BoxError;
    type Future = BoxFuture<SocksStream>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let settings = Arc::clone(&self.inner);
        Box::pin(Self::connect(settings, dst))
    }
}

/// Dials the configured target for every request, treating it as an HTTP forward proxy
#[derive(Clone, Debug)]
pub struct ForwardProxyConnector {
    http: HttpConnector,
    proxy_uri: Uri,
}

impl ForwardProxyConnector {
    pub fn new(target: &Target) -> ProxyResult<Self> {
        let host = target.host();
        let port = host
            .port_u16()
            .unwrap_or_else(|| default_port_for_scheme(target.scheme()));
        // TLS 由外层 HttpsConnector 负责，这里始终按明文 TCP 拨号
        let proxy_uri: Uri = format!("http://{}:{}", host.host(), port).parse()?;

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);

        Ok(Self { http, proxy_uri })
    }

    /// Address every connection is dialled to
    pub fn proxy_uri(&self) -> &Uri {
        &self.proxy_uri
    }
}

impl Service<Uri> for ForwardProxyConnector {
    type Response = ProxiedStream;
    type Error = BoxError;
    type Future = BoxFuture<ProxiedStream>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.http.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, _dst: Uri) -> Self::Future {
        let connecting = self.http.call(self.proxy_uri.clone());
        Box::pin(async move {
            let stream = connecting.await?;
            Ok(ProxiedStream(stream))
        })
    }
}

/// TCP stream tunnelled through the SOCKS5 server
pub struct SocksStream(Socks5Stream<TcpStream>);

impl Connection for SocksStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

/// TCP stream to the forward proxy
#[derive(Debug)]
pub struct ProxiedStream(TcpStream);

impl Connection for ProxiedStream {
    fn connected(&self) -> Connected {
        self.0.connected().proxy(true)
    }
}

macro_rules! delegate_io {
    ($stream:ty) => {
        impl AsyncRead for $stream {
            fn poll_read(
                mut self: Pin<&mut Self>,
                cx: &mut Context<'_>,
                buf: &mut ReadBuf<'_>,
            ) -> Poll<io::Result<()>> {
                Pin::new(&mut self.0).poll_read(cx, buf)
            }
        }

        impl AsyncWrite for $stream {
            fn poll_write(
                mut self: Pin<&mut Self>,
                cx: &mut Context<'_>,
                buf: &[u8],
            ) -> Poll<io::Result<usize>> {
                Pin::new(&mut self.0).poll_write(cx, buf)
            }

            fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                Pin::new(&mut self.0).poll_flush(cx)
            }

            fn poll_shutdown(
                mut self: Pin<&mut Self>,
                cx: &mut Context<'_>,
            ) -> Poll<io::Result<()>> {
                Pin::new(&mut self.0).poll_shutdown(cx)
            }
        }
    };
}

delegate_io!(SocksStream);
delegate_io!(ProxiedStream);
