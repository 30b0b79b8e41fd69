//! Regex search over normalized lines with surrounding context.

use std::sync::LazyLock;

use fancy_regex::Regex as Pattern;
use regex::Regex;
use serde::Serialize;

use super::NormalizedContent;
use crate::Error;

/// Lines of context kept on each side of a match.
pub const GREP_CONTEXT_LINES: usize = 25;

pub const DEFAULT_MAX_MATCHES: usize = 20;
pub const MAX_MATCHES_LIMIT: usize = 100;

static DELIMITED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(.+)/([gimsuy]*)$").expect("delimited pattern syntax is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrepMatch {
    pub match_number: usize,
    pub line_number: usize,
    pub matched_text: String,
    pub context_start_line: usize,
    pub context_end_line: usize,
    pub context: String,
}

/// Compile a user-supplied search pattern.
///
/// `/body/flags` selects flags explicitly: `i` ignores case, `m` makes `^`/`$`
/// match at line boundaries, `s` lets `.` match newlines; `g`, `u` and `y`
/// are accepted and have no effect. Anything else is compiled as a regex
/// whose case sensitivity follows `case_sensitive`. Look-around and
/// backreferences are supported.
///
/// # Errors
///
/// Returns `Error::InvalidPattern` if the pattern does not compile.
pub fn compile_pattern(pattern: &str, case_sensitive: bool) -> Result<Pattern, Error> {
    let (body, flags) = match DELIMITED_RE.captures(pattern) {
        Some(caps) => {
            let requested = &caps[2];
            let flags: String = ['i', 'm', 's'].into_iter().filter(|f| requested.contains(*f)).collect();
            (caps.get(1).map_or("", |m| m.as_str()), flags)
        }
        None => (pattern, if case_sensitive { String::new() } else { "i".to_string() }),
    };

    let source = if flags.is_empty() { body.to_string() } else { format!("(?{flags}){body}") };
    Pattern::new(&source).map_err(|e| Error::InvalidPattern(format!("Invalid regex pattern: {e}")))
}

/// Find up to `max_matches` matches, scanning lines top to bottom and each
/// line left to right.
///
/// # Errors
///
/// Returns `Error::InvalidPattern` if matching aborts, which happens when a
/// pattern exceeds the backtracking limit on some line.
pub fn grep(content: &NormalizedContent, pattern: &Pattern, max_matches: usize) -> Result<Vec<GrepMatch>, Error> {
    let lines = content.lines();
    let total = lines.len();
    let mut matches = Vec::new();

    'lines: for (idx, line) in lines.iter().enumerate() {
        for found in pattern.find_iter(line) {
            if matches.len() >= max_matches {
                break 'lines;
            }
            let found = found.map_err(|e| Error::InvalidPattern(format!("Regex execution failed: {e}")))?;

            let line_number = idx + 1;
            let context_start_line = line_number.saturating_sub(GREP_CONTEXT_LINES).max(1);
            let context_end_line = (line_number + GREP_CONTEXT_LINES).min(total);

            let context = (context_start_line..=context_end_line)
                .map(|n| {
                    let text = &lines[n - 1];
                    if n == line_number { format!("> {text}") } else { text.clone() }
                })
                .collect::<Vec<_>>()
                .join("\n");

            matches.push(GrepMatch {
                match_number: matches.len() + 1,
                line_number,
                matched_text: found.as_str().to_string(),
                context_start_line,
                context_end_line,
                context,
            });
        }
    }

    Ok(matches)
}
