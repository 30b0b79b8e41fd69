//! Search engine result pages.
//!
//! Search queries are sent through the unlocker like any other page: the
//! engine's result URL is built here, fetched as markdown, and for Google the
//! markdown is reduced to a clean list of `[title](url)` results.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use relay_core::Error;

/// Results per engine page; cursors count pages.
const PAGE_SIZE: u64 = 10;

/// Query parameter prefixes dropped from result links.
const TRACKING_PARAM_PREFIXES: &[&str] = &[
    "utm_", "gclid", "fbclid", "ved", "sa", "usg", "ei", "oq", "hl", "source", "ictx", "tbm", "sca_esv", "ntc", "aep",
    "ptn", "ver", "hsh", "fclid",
];

static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("image pattern is valid"));

static LINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+?)\]\((https?://[^\s)]+)\)").expect("link block pattern is valid"));

static HEADING_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^###\s+(.+?)\s*$").expect("heading title pattern is valid"));

static LINE_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*([^\n]{3,200}?)\s*$").expect("line title pattern is valid"));

static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_*`#]+").expect("emphasis pattern is valid"));

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static GOOGLE_HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"(^|\.)google\.")
        .case_insensitive(true)
        .build()
        .expect("google host pattern is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    #[default]
    Google,
    Bing,
    Yandex,
}

impl SearchEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchEngine::Google => "google",
            SearchEngine::Bing => "bing",
            SearchEngine::Yandex => "yandex",
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the result page URL for `query`.
///
/// `cursor` is a page number (default 0).
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the cursor is not a non-negative integer.
pub fn search_url(engine: SearchEngine, query: &str, cursor: Option<&str>) -> Result<String, Error> {
    let page: u64 = match cursor.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => c
            .parse()
            .map_err(|_| Error::InvalidInput(format!("cursor must be a page number, got '{c}'")))?,
        None => 0,
    };
    let start = page.saturating_mul(PAGE_SIZE);

    let url = match engine {
        SearchEngine::Google => Url::parse_with_params(
            "https://www.google.com/search",
            [("q", query.to_string()), ("start", start.to_string())],
        ),
        SearchEngine::Bing => Url::parse_with_params(
            "https://www.bing.com/search",
            [("q", query.to_string()), ("first", (start + 1).to_string())],
        ),
        SearchEngine::Yandex => {
            Url::parse_with_params("https://yandex.com/search/", [("text", query.to_string()), ("p", page.to_string())])
        }
    };

    url.map(String::from).map_err(|e| Error::Internal(format!("failed to build search URL: {e}")))
}

/// One organic result pulled from a result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerpResult {
    pub title: String,
    pub url: String,
}

/// Pull organic results out of a result page rendered as markdown.
///
/// Engine-internal links are skipped, tracking parameters and fragments are
/// stripped, and results are deduplicated by URL in page order.
pub fn extract_serp_results(markdown: &str) -> Vec<SerpResult> {
    let without_images = IMAGE_RE.replace_all(markdown, "");
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for caps in LINK_BLOCK_RE.captures_iter(&without_images) {
        let Some(url) = clean_result_url(&caps[2]) else { continue };
        let Some(title) = pick_title(&caps[1]) else { continue };

        if seen.insert(url.clone()) {
            results.push(SerpResult { title, url });
        }
    }

    results
}

/// Render results as a markdown list, one `- [title](url)` per line.
pub fn render_serp(results: &[SerpResult]) -> String {
    results
        .iter()
        .map(|r| format!("- [{}]({})", r.title, r.url))
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_result_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    if GOOGLE_HOST_RE.is_match(url.host_str()?) {
        return None;
    }

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(key, _)| !is_tracking_param(key)).collect();

    if kept.len() != pairs.len() {
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }
    url.set_fragment(None);

    Some(url.into())
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAM_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

fn pick_title(block: &str) -> Option<String> {
    let raw = HEADING_TITLE_RE
        .captures(block)
        .or_else(|| LINE_TITLE_RE.captures(block))
        .map(|caps| caps[1].to_string())?;

    let stripped = EMPHASIS_RE.replace_all(&raw, "");
    let title = WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string();

    (title.chars().count() >= 3).then_some(title)
}
