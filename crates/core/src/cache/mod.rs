//! In-memory content cache for fetched pages.
//!
//! Pages are keyed by canonical URL and stored already normalized, so every
//! window operation over a cached page sees the same line numbering. Entries
//! expire after a TTL and the cache is bounded by entry count:
//!
//! - Lookup-time expiry: a stale entry is deleted before the miss is reported
//! - Background sweep on a fixed interval, independent of traffic
//! - Oldest-inserted eviction once the size bound is exceeded

mod page_cache;

pub use page_cache::{CachedPage, PageCache};
