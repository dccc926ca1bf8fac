//! Paperwatch Core - shared infrastructure for the journal pipeline
//!
//! Canonical record types, identity normalization, transport failure
//! classification, and the HTTP/logging/progress plumbing used by the
//! source adapters and the store.

pub mod failure;
pub mod http;
pub mod identity;
pub mod logging;
pub mod progress;
pub mod record;
pub mod shutdown;

// Re-exports for convenience
pub use failure::{classify, FailureKind, FetchError};
pub use http::{get, set_http_config, HttpConfig, HttpResponse};
pub use identity::{identity_key, normalize_doi, normalize_url};
pub use logging::init_logging;
pub use progress::{fmt_num, ProgressContext, SharedProgress};
pub use record::{Journal, Paper, SourceFailure, SourceFetch};
pub use shutdown::{is_shutdown_requested, request_shutdown, shutdown_flag};
