//! Paperwatch Sources - adapters and fetch orchestration
//!
//! Two adapters share one contract: convert a journal's upstream
//! representation (RSS/Atom feed, or the Crossref works API) into
//! canonical records, reporting failures without aborting the run.
//! The orchestrator sequences them across the configured journal list
//! under a per-source rate limit.

pub mod crossref;
pub mod feed;
pub mod fetcher;

pub use crossref::CrossrefFetcher;
pub use feed::FeedFetcher;
pub use fetcher::{AdapterKind, FailedSource, FetchAll, PaperFetcher, RunStats};
