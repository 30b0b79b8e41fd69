//! Preview and line-range views over normalized content.

use serde::Serialize;

use super::NormalizedContent;
use crate::Error;

/// Lines included in a page preview.
pub const PREVIEW_LINES: usize = 500;

/// Character budget of a page preview, newlines included.
pub const PREVIEW_CHAR_BUDGET: usize = 100_000;

/// `char_limit_reached` is reported once a preview gets this close to its budget.
pub const CHAR_LIMIT_MARGIN: usize = 1000;

/// Largest span a single range request may cover.
pub const MAX_RANGE_LINES: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub text: String,
    pub lines_returned: usize,
    pub total_lines: usize,
    pub chars: usize,
    pub truncated: bool,
    pub char_limit_reached: bool,
}

/// Leading lines of `content`, bounded by both a line count and a character budget.
///
/// Each line costs its character length plus one for the separator.
pub fn preview(content: &NormalizedContent, max_lines: usize, char_budget: usize) -> Preview {
    let total_lines = content.line_count();
    let mut selected = Vec::new();
    let mut chars = 0;

    for line in content.lines() {
        if selected.len() >= max_lines {
            break;
        }
        let cost = line.chars().count() + 1;
        if chars + cost > char_budget {
            break;
        }
        chars += cost;
        selected.push(line.as_str());
    }

    let lines_returned = selected.len();
    Preview {
        text: selected.join("\n"),
        lines_returned,
        total_lines,
        chars,
        truncated: lines_returned < total_lines,
        char_limit_reached: chars >= char_budget.saturating_sub(CHAR_LIMIT_MARGIN),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineRange {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
    pub total_lines: usize,
    pub lines_returned: usize,
    /// The requested end ran past the last line.
    pub truncated: bool,
}

/// Reject a requested range before any fetch happens.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if `start < 1`, `end < start`, or the span
/// exceeds [`MAX_RANGE_LINES`].
pub fn validate_range(start: usize, end: usize) -> Result<(), Error> {
    if start < 1 {
        return Err(Error::InvalidInput("start_line must be >= 1".into()));
    }
    if end < start {
        return Err(Error::InvalidInput("end_line must be >= start_line".into()));
    }
    if end - start + 1 > MAX_RANGE_LINES {
        return Err(Error::InvalidInput(format!("Cannot request more than {MAX_RANGE_LINES} lines at once")));
    }
    Ok(())
}

/// Lines `start..=end` (1-indexed), clamped to the content.
///
/// A start past the last line yields an empty slice.
pub fn range(content: &NormalizedContent, start: usize, end: usize) -> LineRange {
    let total_lines = content.line_count();
    let start_line = start.max(1);
    let end_line = end.min(total_lines);

    let slice: &[String] = if start_line <= end_line { &content.lines()[start_line - 1..end_line] } else { &[] };

    LineRange {
        text: slice.join("\n"),
        start_line,
        end_line,
        total_lines,
        lines_returned: slice.len(),
        truncated: end > total_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::normalize;

    fn numbered(n: usize) -> NormalizedContent {
        let raw = (1..=n).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        normalize(&raw)
    }

    #[test]
    fn test_preview_short_page() {
        let content = numbered(3);
        let p = preview(&content, PREVIEW_LINES, PREVIEW_CHAR_BUDGET);
        assert_eq!(p.text, "line 1\nline 2\nline 3");
        assert_eq!(p.lines_returned, 3);
        assert_eq!(p.total_lines, 3);
        assert!(!p.truncated);
        assert!(!p.char_limit_reached);
    }

    #[test]
    fn test_preview_line_bound() {
        let content = numbered(800);
        let p = preview(&content, PREVIEW_LINES, PREVIEW_CHAR_BUDGET);
        assert_eq!(p.lines_returned, 500);
        assert_eq!(p.total_lines, 800);
        assert!(p.truncated);
        assert!(p.text.ends_with("line 500"));
    }

    #[test]
    fn test_preview_char_budget() {
        // 500 full-width lines cost 500 * 251 chars, well over the budget
        let raw = vec!["x".repeat(250); 500].join("\n");
        let content = normalize(&raw);
        let p = preview(&content, PREVIEW_LINES, PREVIEW_CHAR_BUDGET);

        assert_eq!(p.lines_returned, 100_000 / 251);
        assert_eq!(p.chars, p.lines_returned * 251);
        assert!(p.chars <= PREVIEW_CHAR_BUDGET);
        assert!(p.truncated);
        assert!(p.char_limit_reached);
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(1, 1).is_ok());
        assert!(validate_range(1, 5000).is_ok());
        assert!(matches!(validate_range(0, 10), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_range(10, 9), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_range(1, 5001), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_range_past_end() {
        let content = numbered(600);
        let r = range(&content, 501, 1000);
        assert_eq!(r.start_line, 501);
        assert_eq!(r.end_line, 600);
        assert_eq!(r.total_lines, 600);
        assert_eq!(r.lines_returned, 100);
        assert!(r.truncated);
        assert!(r.text.starts_with("line 501\n"));
        assert!(r.text.ends_with("line 600"));
    }

    #[test]
    fn test_range_inside() {
        let content = numbered(10);
        let r = range(&content, 3, 4);
        assert_eq!(r.text, "line 3\nline 4");
        assert_eq!(r.lines_returned, 2);
        assert!(!r.truncated);
    }

    #[test]
    fn test_range_start_beyond_content() {
        let content = numbered(5);
        let r = range(&content, 10, 20);
        assert_eq!(r.text, "");
        assert_eq!(r.lines_returned, 0);
        assert!(r.truncated);
    }
}
