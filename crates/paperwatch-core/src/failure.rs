//! Transport error type and failure classification
//!
//! Adapters convert low-level `reqwest` errors into [`FetchError`] at the
//! HTTP boundary; [`classify`] maps those onto the small category
//! taxonomy used for run reporting and retry policy. Classification is
//! pure and total: every error lands in exactly one category.

/// Low-level transport/protocol error from an HTTP request.
#[derive(Debug)]
pub enum FetchError {
    /// HTTP-level error; `status` is `None` when the protocol exchange
    /// broke down before a status line (bad body, decode failure, ...).
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Request deadline elapsed.
    Timeout { message: String },
    /// Connection could not be established.
    Connect { message: String },
    /// Anything else the transport reports.
    Other { message: String },
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Timeout { message } => write!(f, "timeout: {message}"),
            Self::Connect { message } => write!(f, "connect: {message}"),
            Self::Other { message } => write!(f, "network: {message}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Convert a reqwest error, flattening its source chain into the
    /// message so cause text ("dns error", "connection refused", ...)
    /// survives for classification.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        let message = chain_message(e);
        if e.is_timeout() {
            Self::Timeout { message }
        } else if e.is_connect() {
            Self::Connect { message }
        } else if let Some(status) = e.status() {
            Self::Http {
                status: Some(status.as_u16()),
                message,
            }
        } else if e.is_body() || e.is_decode() || e.is_request() || e.is_redirect() {
            Self::Http {
                status: None,
                message,
            }
        } else {
            Self::Other { message }
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Whether a retry can help: rate limiting and server-side errors
    /// only. Client errors, timeouts, and connection failures are
    /// reported, not retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http {
                status: Some(429 | 500..=599),
                ..
            }
        )
    }
}

/// Failure category attributed to a source in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Feed document could not be fetched or parsed (feed adapter only).
    FeedFetch,
    Auth,
    Client,
    Server,
    Protocol,
    Timeout,
    Proxy,
    Tls,
    Dns,
    ConnectionRefused,
    Connection,
    Network,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FeedFetch => "feed_fetch_error",
            Self::Auth => "auth_error",
            Self::Client => "client_error",
            Self::Server => "server_error",
            Self::Protocol => "protocol_error",
            Self::Timeout => "timeout_error",
            Self::Proxy => "proxy_error",
            Self::Tls => "tls_error",
            Self::Dns => "dns_error",
            Self::ConnectionRefused => "connection_refused",
            Self::Connection => "connection_error",
            Self::Network => "network_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a transport error onto its report category.
pub fn classify(err: &FetchError) -> FailureKind {
    match err {
        FetchError::Http {
            status: Some(401 | 403),
            ..
        } => FailureKind::Auth,
        FetchError::Http {
            status: Some(s), ..
        } if (400..500).contains(s) => FailureKind::Client,
        FetchError::Http {
            status: Some(s), ..
        } if *s >= 500 => FailureKind::Server,
        FetchError::Http { .. } => FailureKind::Protocol,
        FetchError::Timeout { .. } => FailureKind::Timeout,
        FetchError::Connect { message } => classify_connect(message),
        FetchError::Other { .. } => FailureKind::Network,
    }
}

/// Connection failures carry their cause only as text; match the usual
/// phrasings from hyper/native-tls/getaddrinfo.
fn classify_connect(message: &str) -> FailureKind {
    let m = message.to_lowercase();
    if m.contains("proxy") {
        FailureKind::Proxy
    } else if m.contains("tls") || m.contains("ssl") || m.contains("certificate") {
        FailureKind::Tls
    } else if m.contains("dns") || m.contains("resolve") || m.contains("name resolution") {
        FailureKind::Dns
    } else if m.contains("refused") {
        FailureKind::ConnectionRefused
    } else {
        FailureKind::Connection
    }
}

/// Flatten an error and its source chain into one message.
fn chain_message(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> FetchError {
        FetchError::http_status(status, "test")
    }

    fn connect(message: &str) -> FetchError {
        FetchError::Connect {
            message: message.into(),
        }
    }

    #[test]
    fn classify_auth_statuses() {
        assert_eq!(classify(&http(401)), FailureKind::Auth);
        assert_eq!(classify(&http(403)), FailureKind::Auth);
    }

    #[test]
    fn classify_client_vs_server() {
        assert_eq!(classify(&http(404)), FailureKind::Client);
        assert_eq!(classify(&http(429)), FailureKind::Client);
        assert_eq!(classify(&http(500)), FailureKind::Server);
        assert_eq!(classify(&http(503)), FailureKind::Server);
    }

    #[test]
    fn classify_statusless_http_is_protocol() {
        let err = FetchError::Http {
            status: None,
            message: "body truncated".into(),
        };
        assert_eq!(classify(&err), FailureKind::Protocol);
    }

    #[test]
    fn classify_timeout() {
        let err = FetchError::Timeout {
            message: "deadline elapsed".into(),
        };
        assert_eq!(classify(&err), FailureKind::Timeout);
    }

    #[test]
    fn classify_connect_causes() {
        assert_eq!(
            classify(&connect("error trying to connect: dns error: failed to lookup")),
            FailureKind::Dns
        );
        assert_eq!(
            classify(&connect("tcp connect error: Connection refused (os error 111)")),
            FailureKind::ConnectionRefused
        );
        assert_eq!(
            classify(&connect("error trying to connect: invalid TLS certificate")),
            FailureKind::Tls
        );
        assert_eq!(
            classify(&connect("proxy handshake failed")),
            FailureKind::Proxy
        );
        assert_eq!(
            classify(&connect("tcp connect error: network unreachable")),
            FailureKind::Connection
        );
    }

    #[test]
    fn classify_fallback_network() {
        let err = FetchError::Other {
            message: "something odd".into(),
        };
        assert_eq!(classify(&err), FailureKind::Network);
    }

    #[test]
    fn retryable_statuses() {
        assert!(http(429).is_retryable());
        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
        assert!(!http(403).is_retryable());
        assert!(!http(404).is_retryable());
        let timeout = FetchError::Timeout {
            message: "t".into(),
        };
        assert!(!timeout.is_retryable());
    }

    #[test]
    fn kind_labels_stable() {
        assert_eq!(FailureKind::Auth.as_str(), "auth_error");
        assert_eq!(FailureKind::FeedFetch.as_str(), "feed_fetch_error");
        assert_eq!(FailureKind::ConnectionRefused.as_str(), "connection_refused");
        assert_eq!(FailureKind::Network.as_str(), "network_error");
    }

    #[test]
    fn display_includes_status() {
        assert_eq!(format!("{}", http(404)), "HTTP 404: test");
    }
}
