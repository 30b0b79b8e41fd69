//! URL canonicalization for cache keys and request validation.

use relay_core::Error;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL '{input}': {reason}")]
    Malformed { input: String, reason: String },
}

impl From<UrlError> for Error {
    fn from(err: UrlError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize a user-supplied URL.
///
/// The result doubles as the page cache key, so two spellings of the same
/// page share one entry:
/// 1. Trim surrounding whitespace
/// 2. Default the scheme to `https://` when none is given (`example.com/x`,
///    `localhost:3000`)
/// 3. Accept only `http` and `https`
/// 4. Lowercase the host
/// 5. Drop the fragment, keep the query string as written
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let malformed = |reason: String| UrlError::Malformed { input: trimmed.to_string(), reason };
    let with_https = || url::Url::parse(&format!("https://{trimmed}")).map_err(|e| malformed(e.to_string()));

    let mut parsed = match url::Url::parse(trimmed) {
        Ok(url) if is_host_port(&url) => with_https()?,
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => with_https()?,
        Err(e) => return Err(malformed(e.to_string())),
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    let lowered = parsed.host_str().map(str::to_lowercase);
    if let Some(host) = lowered {
        parsed.set_host(Some(&host)).map_err(|e| malformed(e.to_string()))?;
    }
    parsed.set_fragment(None);

    Ok(parsed)
}

/// `example.com:8080/x` parses as scheme `example.com` with an opaque path
/// starting with the port digits.
fn is_host_port(url: &url::Url) -> bool {
    if !url.cannot_be_a_base() {
        return false;
    }
    let path = url.path();
    let port_len = path.bytes().take_while(u8::is_ascii_digit).count();
    port_len > 0 && (port_len == path.len() || path.as_bytes()[port_len] == b'/')
}
