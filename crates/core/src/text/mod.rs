//! Line-indexed page text.
//!
//! Fetched markdown is normalized once, on cache insertion, into lines of at
//! most [`MAX_LINE_WIDTH`] characters. All read tools (preview, range, grep)
//! address content by 1-indexed line numbers over that normalized form.

pub mod grep;
pub mod normalize;
pub mod window;

pub use grep::{DEFAULT_MAX_MATCHES, GREP_CONTEXT_LINES, GrepMatch, MAX_MATCHES_LIMIT, compile_pattern, grep};
pub use normalize::{MAX_LINE_WIDTH, normalize, strip_image_links};
pub use window::{
    CHAR_LIMIT_MARGIN, LineRange, MAX_RANGE_LINES, PREVIEW_CHAR_BUDGET, PREVIEW_LINES, Preview, preview, range, validate_range,
};

/// Normalized page content: width-bounded lines, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedContent {
    lines: Vec<String>,
}

impl NormalizedContent {
    pub(crate) fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Reassemble the content with `\n` separators.
    #[cfg(test)]
    pub(crate) fn to_text(&self) -> String {
        self.lines.join("\n")
    }
}
