use hyper::header::{HeaderName, HOST};
use hyper::http::uri::{PathAndQuery, Scheme};
use hyper::{Request, Uri};
use tracing::warn;

use super::target::Target;

/// Diagnostic header naming the backend a forwarded request was routed to
pub static X_PROXY_TARGET: HeaderName = HeaderName::from_static("x-proxy-target");

/// Rewrites every outbound request so it addresses the configured target.
///
/// The request scheme is resolved once; the rewrite itself does no I/O and cannot fail.
#[derive(Debug, Clone)]
pub struct Director {
    target: Target,
    scheme: Scheme,
}

impl Director {
    pub fn new(target: Target, scheme: Scheme) -> Self {
        Self { target, scheme }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Point `req` at the target: diagnostic header, scheme, authority and `Host`.
    pub fn direct<B>(&self, req: &mut Request<B>) {
        req.headers_mut()
            .insert(X_PROXY_TARGET.clone(), self.target.header_value().clone());

        let path_and_query = req
            .uri()
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        match Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.target.host().clone())
            .path_and_query(path_and_query)
            .build()
        {
            Ok(uri) => *req.uri_mut() = uri,
            Err(e) => warn!("Failed to rewrite request URI {}: {}", req.uri(), e),
        }

        if let Ok(host) = self.target.host().as_str().parse() {
            req.headers_mut().insert(HOST, host);
        }
    }
}
