//! Markdown normalization for windowed access.
//!
//! Image references are stripped (they are often data URIs thousands of
//! characters long), then every line is hard-wrapped at [`MAX_LINE_WIDTH`].

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use super::NormalizedContent;

/// Maximum characters per normalized line.
pub const MAX_LINE_WIDTH: usize = 250;

static IMAGE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]+\)").expect("image link pattern is valid"));

/// Remove every markdown image reference `![alt](target)`.
///
/// Removal repeats until nothing matches, since deleting an inner reference
/// can splice a new one together (`!![a](b)[c](d)`).
pub fn strip_image_links(content: &str) -> Cow<'_, str> {
    let mut current = Cow::Borrowed(content);
    loop {
        match IMAGE_LINK_RE.replace_all(&current, "") {
            Cow::Borrowed(_) => return current,
            Cow::Owned(next) => current = Cow::Owned(next),
        }
    }
}

/// Normalize raw fetched markdown into width-bounded lines.
///
/// Carriage returns are dropped so that `\r\n` and `\n` both end a line.
/// Lines longer than [`MAX_LINE_WIDTH`] characters are split into chunks of
/// exactly that width, regardless of whitespace.
pub fn normalize(raw: &str) -> NormalizedContent {
    normalize_with_width(raw, MAX_LINE_WIDTH)
}

pub(crate) fn normalize_with_width(raw: &str, width: usize) -> NormalizedContent {
    let without_cr: Cow<'_, str> = if raw.contains('\r') { Cow::Owned(raw.replace('\r', "")) } else { raw.into() };
    let stripped = strip_image_links(&without_cr);
    let mut lines = Vec::new();

    for line in stripped.split('\n') {
        push_wrapped(&mut lines, line, width);
    }

    NormalizedContent::from_lines(lines)
}

fn push_wrapped(out: &mut Vec<String>, line: &str, width: usize) {
    if line.chars().count() <= width {
        out.push(line.to_string());
        return;
    }

    let mut chunk = String::with_capacity(width);
    let mut len = 0;
    for ch in line.chars() {
        chunk.push(ch);
        len += 1;
        if len == width {
            out.push(std::mem::take(&mut chunk));
            len = 0;
        }
    }
    if len > 0 {
        out.push(chunk);
    }
}
