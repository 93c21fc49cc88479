use futures_util::StreamExt;
use hyper::header::{HeaderMap, HeaderValue, CONNECTION};
use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::director::Director;
use super::target::Target;
use super::transport::Transport;
use crate::error::{ProxyError, ProxyResult};

const HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Settings fixed for the lifetime of a proxy instance
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub target: Target,
    /// `None` waits for upstream headers indefinitely
    pub response_header_timeout: Option<Duration>,
}

struct Shared {
    config: ProxyConfig,
    director: Director,
    transport: Transport,
}

/// Reverse proxy forwarding every request to one fixed backend.
///
/// Cloning is cheap: all clones share the same target and connection pool, and nothing on the
/// instance changes after construction.
#[derive(Clone)]
pub struct ReverseProxy {
    inner: Arc<Shared>,
}

impl ReverseProxy {
    /// Parse `target_url` and build its transport. `timeout_ms == 0` disables the
    /// response-header timeout.
    pub fn new(target_url: &str, timeout_ms: u64) -> ProxyResult<Self> {
        let target = Target::parse(target_url)?;
        let response_header_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));

        let scheme = target.request_scheme()?;
        let transport = Transport::build(&target, response_header_timeout)?;
        let director = Director::new(target.clone(), scheme);

        info!(
            "Reverse proxy ready: target={} transport={} header_timeout={:?}",
            target,
            if transport.is_socks() { "socks5" } else { "direct" },
            response_header_timeout
        );

        Ok(Self {
            inner: Arc::new(Shared {
                config: ProxyConfig {
                    target,
                    response_header_timeout,
                },
                director,
                transport,
            }),
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.inner.config
    }

    pub fn target(&self) -> &Target {
        &self.inner.config.target
    }

    /// Request handler entry point; upstream failures become `502 Bad Gateway`.
    pub async fn handle_request(&self, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        Ok(self.serve(req, CancellationToken::new()).await)
    }

    /// Like `handle_request`, with a token that aborts the exchange when cancelled.
    pub async fn serve(&self, req: Request<Body>, cancel: CancellationToken) -> Response<Body> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        debug!("Request {} {} {}", request_id, method, path);

        match self.forward(req, cancel).await {
            Ok(resp) => {
                debug!(
                    "Request {} answered {} in {:?}",
                    request_id,
                    resp.status(),
                    started.elapsed()
                );
                resp
            }
            Err(ProxyError::ClientAbort) => {
                debug!("Request {} cancelled after {:?}", request_id, started.elapsed());
                bad_gateway()
            }
            Err(e) => {
                warn!(
                    "Failed to forward request {} ({} {}): {}",
                    request_id, method, path, e
                );
                bad_gateway()
            }
        }
    }

    /// Rewrite `req`, send it upstream and hand back the streaming response.
    ///
    /// Cancelling `cancel` drops the in-flight send, or ends the body stream if headers already
    /// arrived; either way the upstream connection is released.
    pub async fn forward(
        &self,
        mut req: Request<Body>,
        cancel: CancellationToken,
    ) -> ProxyResult<Response<Body>> {
        let client_ip = req.extensions().get::<SocketAddr>().map(|addr| addr.ip());

        strip_hop_by_hop_headers(req.headers_mut());
        if let Some(ip) = client_ip {
            append_forwarded_for(req.headers_mut(), ip);
        }
        self.inner.director.direct(&mut req);

        let upstream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProxyError::ClientAbort),
            res = self.inner.transport.send(req) => res?,
        };

        Ok(build_downstream_response(upstream, cancel))
    }
}

fn build_downstream_response(upstream: Response<Body>, cancel: CancellationToken) -> Response<Body> {
    let (mut parts, body) = upstream.into_parts();
    strip_hop_by_hop_headers(&mut parts.headers);

    let body = Body::wrap_stream(body.take_until(cancel.cancelled_owned()));
    Response::from_parts(parts, body)
}

fn bad_gateway() -> Response<Body> {
    let mut resp = Response::new(Body::from("Bad gateway"));
    *resp.status_mut() = StatusCode::BAD_GATEWAY;
    resp
}

/// Remove RFC 7230 hop-by-hop headers, including any listed in `Connection`
fn strip_hop_by_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    for name in listed {
        headers.remove(name.as_str());
    }
    for h in HOP_HEADERS {
        headers.remove(*h);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert("x-forwarded-for", value);
    }
}
