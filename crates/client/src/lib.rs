//! Upstream access for mcp-relay.
//!
//! This crate provides the unlocker HTTP client behind the [`Fetcher`]
//! trait, URL canonicalization for cache keys, and search engine URL
//! building with result-page cleaning.

pub mod serp;
pub mod unlocker;
pub mod url;

pub use serp::{SearchEngine, SerpResult, extract_serp_results, render_serp, search_url};
pub use unlocker::{Fetcher, UnlockerClient, UnlockerConfig};
pub use self::url::{UrlError, canonicalize};
