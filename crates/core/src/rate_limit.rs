//! Sliding-window rate limiting for tool calls.
//!
//! The budget is written as `<count>/<duration><unit>` with unit one of
//! `s`, `m` or `h`, for example `100/1h`. Each allowed call records its
//! timestamp; timestamps older than the window are discarded on every check.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::Error;
use crate::config::ConfigError;

static SPEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)/(\d+)([mhs])$").expect("rate limit pattern is valid"));

/// Parsed rate limit configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSpec {
    /// Maximum calls per window.
    pub limit: usize,
    /// Window length.
    pub window: Duration,
    /// The string the limit was parsed from, echoed in errors.
    pub display: String,
}

impl FromStr for RateLimitSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::Invalid { field: "rate_limit".into(), reason: reason.into() };

        let caps = SPEC_RE
            .captures(s)
            .ok_or_else(|| invalid("expected <count>/<duration><unit>, e.g. 100/1h or 50/30m"))?;

        let limit: usize = caps[1].parse().map_err(|_| invalid("count is out of range"))?;
        let amount: u64 = caps[2].parse().map_err(|_| invalid("duration is out of range"))?;
        if limit == 0 || amount == 0 {
            return Err(invalid("count and duration must be at least 1"));
        }

        let unit_secs = match &caps[3] {
            "h" => 3600,
            "m" => 60,
            _ => 1,
        };
        let secs = amount
            .checked_mul(unit_secs)
            .ok_or_else(|| invalid("duration is out of range"))?;

        Ok(Self { limit, window: Duration::from_secs(secs), display: s.to_string() })
    }
}

/// Process-wide sliding-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    spec: RateLimitSpec,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(spec: RateLimitSpec) -> Self {
        Self { calls: Mutex::new(VecDeque::with_capacity(spec.limit)), spec }
    }

    pub fn spec(&self) -> &RateLimitSpec {
        &self.spec
    }

    /// Record a call if the budget allows it.
    ///
    /// # Errors
    ///
    /// Returns `Error::RateLimited` carrying the configured display string
    /// when the window already holds `limit` calls.
    pub async fn check(&self) -> Result<(), Error> {
        let now = Instant::now();
        let mut calls = self.calls.lock().await;

        while let Some(&oldest) = calls.front() {
            if oldest + self.spec.window <= now {
                calls.pop_front();
            } else {
                break;
            }
        }

        if calls.len() >= self.spec.limit {
            tracing::debug!(limit = %self.spec.display, "rate limit exceeded");
            return Err(Error::RateLimited(self.spec.display.clone()));
        }

        calls.push_back(now);
        Ok(())
    }

    /// Calls currently counted against the window.
    #[cfg(test)]
    async fn in_window(&self) -> usize {
        self.calls.lock().await.len()
    }
}
