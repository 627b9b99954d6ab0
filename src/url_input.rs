// Website URL normalisation for crawl targets

use url::Url;

use crate::error::{ClientError, Result};

/// Normalise user input into an absolute URL string.
///
/// `example.com` becomes `https://example.com`, `//cdn.example.com` becomes
/// `https://cdn.example.com`, and http(s) URLs are left alone.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return trimmed.to_string();
    }

    if trimmed.starts_with("//") {
        return format!("https:{}", trimmed);
    }

    format!("https://{}", trimmed)
}

/// True when the input normalises to a usable http(s) URL with a real host
pub fn validate_url(input: &str) -> bool {
    parse_crawl_url(input).is_ok()
}

/// Normalise and parse, rejecting anything that cannot be crawled
pub fn parse_crawl_url(input: &str) -> Result<Url> {
    let normalized = normalize_url(input);
    if normalized.is_empty() {
        return Err(ClientError::Validation("URL is empty".to_string()));
    }

    let url = Url::parse(&normalized).map_err(|e| {
        ClientError::Validation(format!("Invalid URL '{}': {}", input.trim(), e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::Validation(format!(
            "Unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let host = url.host_str().unwrap_or_default();
    if host != "localhost" && !host.contains('.') {
        return Err(ClientError::Validation(format!(
            "Please enter a valid URL (e.g. example.com or https://example.com), got '{}'",
            input.trim()
        )));
    }

    Ok(url)
}
