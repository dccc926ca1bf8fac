//! Synchronous HTTP facade over a shared async client
//!
//! Uses async reqwest internally with a small shared tokio runtime, but
//! presents a blocking interface: the pipeline drains sources strictly
//! sequentially, so there is nothing to overlap. Configuration is
//! process-global and must be applied before the first request; the
//! client is built lazily on first use and never rebuilt.

use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

use crate::failure::FetchError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-wide HTTP settings, set once at startup from the CLI.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request deadline covering connect, send, and body read.
    pub timeout: Duration,
    /// Contact e-mail attached to the User-Agent as a politeness
    /// signal for upstream API operators.
    pub contact: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            contact: None,
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install the HTTP configuration. Only the first call takes effect;
/// call before any request is made.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::warn!("HTTP config already set, ignoring late override");
    }
}

fn http_config() -> &'static HttpConfig {
    HTTP_CONFIG.get_or_init(HttpConfig::default)
}

/// User-Agent string, with the contact address when configured.
fn user_agent(config: &HttpConfig) -> String {
    let base = concat!("paperwatch/", env!("CARGO_PKG_VERSION"));
    match &config.contact {
        Some(contact) if !contact.is_empty() => format!("{base} (mailto:{contact})"),
        _ => base.to_string(),
    }
}

/// Shared tokio runtime for HTTP operations.
static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Shared HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    let config = http_config();
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(config.timeout)
        .user_agent(user_agent(config))
        .pool_max_idle_per_host(4)
        .build()
        .expect("failed to build HTTP client")
});

/// Response to a completed HTTP exchange. Any status code lands here;
/// only transport-level breakdowns surface as `Err`.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    /// Server-supplied retry delay in seconds, when present.
    pub retry_after: Option<u64>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET returning the full body as text.
pub fn get(url: &str) -> Result<HttpResponse, FetchError> {
    SHARED_RUNTIME.block_on(async {
        let resp = SHARED_CLIENT
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_with_contact() {
        let config = HttpConfig {
            contact: Some("ops@example.org".into()),
            ..Default::default()
        };
        let ua = user_agent(&config);
        assert!(ua.starts_with("paperwatch/"));
        assert!(ua.contains("mailto:ops@example.org"));
    }

    #[test]
    fn user_agent_without_contact() {
        let ua = user_agent(&HttpConfig::default());
        assert!(!ua.contains("mailto"));
    }

    #[test]
    fn empty_contact_treated_as_absent() {
        let config = HttpConfig {
            contact: Some(String::new()),
            ..Default::default()
        };
        assert!(!user_agent(&config).contains("mailto"));
    }

    #[test]
    fn response_success_range() {
        let ok = HttpResponse {
            status: 204,
            retry_after: None,
            body: String::new(),
        };
        assert!(ok.is_success());
        let not_found = HttpResponse {
            status: 404,
            retry_after: None,
            body: String::new(),
        };
        assert!(!not_found.is_success());
    }
}
