use thiserror::Error;
use tokio::time::Duration;

/// Main error type for the pinproxy reverse proxy
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    /// Invalid target or transport setup; only raised while constructing a proxy
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The upstream (or the SOCKS5 server in front of it) could not be reached or read
    #[error("Gateway error: {message}")]
    Gateway { message: String },

    /// Timeout errors
    #[error("Operation timed out after {duration:?}: {operation}")]
    Timeout {
        duration: Duration,
        operation: String,
    },

    /// The inbound caller went away or the server is shutting down
    #[error("Request cancelled by client")]
    ClientAbort,
}

impl ProxyError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a gateway error
    pub fn gateway<S: Into<String>>(message: S) -> Self {
        Self::Gateway {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(duration: Duration, operation: S) -> Self {
        Self::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Whether the error is answered with a 502 toward the inbound caller
    pub fn is_gateway_failure(&self) -> bool {
        matches!(self, ProxyError::Gateway { .. } | ProxyError::Timeout { .. })
    }
}

/// Result type alias for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Convert from hyper::Error to ProxyError
impl From<hyper::Error> for ProxyError {
    fn from(err: hyper::Error) -> Self {
        if err.is_connect() {
            ProxyError::gateway(format!("Connection error: {}", err))
        } else {
            ProxyError::gateway(format!("HTTP error: {}", err))
        }
    }
}

/// Convert from std::io::Error to ProxyError
impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::gateway(format!("IO error: {}", err))
    }
}

/// Convert from url::ParseError to ProxyError
impl From<url::ParseError> for ProxyError {
    fn from(err: url::ParseError) -> Self {
        ProxyError::config(format!("Invalid target URL: {}", err))
    }
}

/// Convert from hyper::http::uri::InvalidUri to ProxyError
impl From<hyper::http::uri::InvalidUri> for ProxyError {
    fn from(err: hyper::http::uri::InvalidUri) -> Self {
        ProxyError::config(format!("Invalid URI: {}", err))
    }
}

/// Convert from hyper::header::InvalidHeaderValue to ProxyError
impl From<hyper::header::InvalidHeaderValue> for ProxyError {
    fn from(err: hyper::header::InvalidHeaderValue) -> Self {
        ProxyError::config(format!("Invalid header value: {}", err))
    }
}
