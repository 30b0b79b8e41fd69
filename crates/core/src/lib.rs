//! Core types and shared functionality for mcp-relay.
//!
//! This crate provides:
//! - In-memory page cache with TTL and size-bounded eviction
//! - Text normalization and windowed reads (preview, range, grep)
//! - Batch orchestration with per-item timeouts
//! - Sliding-window rate limiting
//! - Size-capped JSONL audit log
//! - Unified error types
//! - Configuration structures

pub mod audit;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod text;

pub use audit::{AuditLog, LogRecord};
pub use batch::{BatchError, run_batch};
pub use cache::{CachedPage, PageCache};
pub use config::{AppConfig, ConfigError};
pub use error::{Error, ErrorDetails};
pub use rate_limit::{RateLimitSpec, RateLimiter};
pub use text::NormalizedContent;
