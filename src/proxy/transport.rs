use hyper::client::{Client, ResponseFuture};
use hyper::{Body, Request, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use std::time::Duration;
use tracing::info;

use super::connector::{ForwardProxyConnector, SocksConnector};
use super::target::Target;
use crate::error::{ProxyError, ProxyResult};

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 32;

/// Outbound connection strategy, chosen once from the target scheme
#[derive(Clone)]
pub enum TransportKind {
    /// Every connection is tunnelled through the target acting as a SOCKS5 server
    Socks(Client<SocksConnector, Body>),
    /// Every connection goes to the target acting as an HTTP forward proxy
    Direct(Client<HttpsConnector<ForwardProxyConnector>, Body>),
}

/// Pooled HTTP client bound to one target, plus the response-header timeout
#[derive(Clone)]
pub struct Transport {
    kind: TransportKind,
    response_header_timeout: Option<Duration>,
}

impl Transport {
    /// Build the transport for `target`. A `None` timeout waits for headers indefinitely.
    pub fn build(target: &Target, response_header_timeout: Option<Duration>) -> ProxyResult<Self> {
        let kind = if target.is_socks() {
            let connector = SocksConnector::new(target)?;
            info!(
                "Using SOCKS5 transport via {} (remote dns: {})",
                connector.proxy_addr(),
                target.resolves_remotely()
            );
            TransportKind::Socks(client_builder().build::<_, Body>(connector))
        } else {
            let connector = ForwardProxyConnector::new(target)?;
            let https = HttpsConnectorBuilder::new()
                .with_webpki_roots()
                .https_or_http()
                .enable_http1()
                .wrap_connector(connector);
            info!("Using direct transport via {}", target.host());
            TransportKind::Direct(client_builder().build::<_, Body>(https))
        };

        Ok(Self {
            kind,
            response_header_timeout,
        })
    }

    pub fn kind(&self) -> &TransportKind {
        &self.kind
    }

    pub fn is_socks(&self) -> bool {
        matches!(self.kind, TransportKind::Socks(_))
    }

    pub fn response_header_timeout(&self) -> Option<Duration> {
        self.response_header_timeout
    }

    /// Send a request and wait for the response head.
    ///
    /// Resolves as soon as headers arrive; the body is still streaming when this returns.
    pub async fn send(&self, req: Request<Body>) -> ProxyResult<Response<Body>> {
        let pending: ResponseFuture = match &self.kind {
            TransportKind::Socks(client) => client.request(req),
            TransportKind::Direct(client) => client.request(req),
        };

        match self.response_header_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| ProxyError::timeout(limit, "waiting for upstream response headers"))?
                .map_err(ProxyError::from),
            None => pending.await.map_err(ProxyError::from),
        }
    }
}

fn client_builder() -> hyper::client::Builder {
    let mut builder = Client::builder();
    builder
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST);
    builder
}
