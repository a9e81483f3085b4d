//! Web page retrieval and readable-text extraction.
//!
//! [`ContentFetcher`] issues a single GET per URL and turns the returned
//! document into plain text with `script`/`style` content removed. There is no
//! retry and no caching; each call performs fresh I/O.

use crate::types::{AppError, Result};
use scraper::{Html, Node};
use std::time::Duration;
use tracing::debug;

/// Elements whose text never counts as page content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style"];

/// A fetched document and the text extracted from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    pub text: String,
}

/// HTTP client for retrieving pages to extract from.
#[derive(Clone)]
pub struct ContentFetcher {
    client: reqwest::Client,
}

impl ContentFetcher {
    /// Create a fetcher whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("operator-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Fetch `url` and extract its readable text.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidInput`] if `url` is not an http(s) URL
    /// - [`AppError::Fetch`] with the status code on a non-success response
    /// - [`AppError::Fetch`] without a status code on transport failure
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed = parse_http_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| AppError::Fetch {
                status: e.status().map(|s| s.as_u16()),
                message: format!("{}: {}", url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch {
                status: Some(status.as_u16()),
                message: format!("{} returned {}", url, status),
            });
        }

        let html = response.text().await.map_err(|e| AppError::Fetch {
            status: Some(status.as_u16()),
            message: format!("Failed to read body of {}: {}", url, e),
        })?;

        let text = extract_text(&html);
        debug!(url, html_bytes = html.len(), text_bytes = text.len(), "Fetched page");

        Ok(FetchedPage {
            url: url.to_string(),
            html,
            text,
        })
    }
}

/// True when `input` looks like an http(s) locator.
pub fn is_http_url(input: &str) -> bool {
    let input = input.trim_start();
    input.starts_with("http://") || input.starts_with("https://")
}

/// Parse `url`, accepting only the http and https schemes.
pub fn parse_http_url(url: &str) -> Result<reqwest::Url> {
    let parsed = reqwest::Url::parse(url.trim())
        .map_err(|e| AppError::InvalidInput(format!("Malformed URL '{}': {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(AppError::InvalidInput(format!(
            "Only http(s) URLs can be fetched, got '{}'",
            url
        ))),
    }
}

/// Extract readable text from an HTML document.
///
/// Text inside `script` and `style` elements is dropped. The remaining text
/// nodes are concatenated, every line is trimmed, runs of double spaces split
/// a line into phrases, and blank lines disappear.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });

        if !skipped {
            raw.push_str(text);
        }
    }

    normalize_whitespace(&raw)
}

fn normalize_whitespace(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            line.trim()
                .split("  ")
                .map(str::trim)
                .filter(|phrase| !phrase.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
