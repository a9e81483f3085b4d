//! Structured data extraction adapter.
//!
//! Turns raw text, or the readable text of a fetched page, into a JSON
//! object with `main_content`, `metadata` and `structured_data` by asking the
//! model for JSON output.

use crate::fetch::{self, ContentFetcher};
use crate::llm::{CompletionRequest, LLMClient, ResponseFormat};
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Sampling temperature for extraction requests.
pub const TEMPERATURE: f32 = 0.3;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a data extraction agent. Extract the important information from the provided content and reply with a single JSON object of this shape:
{
  "main_content": "the main textual content, cleaned of navigation and boilerplate",
  "metadata": {
    "title": "document title",
    "author": "author, if known",
    "date": "publication date, if known",
    "url": "source URL, if known"
  },
  "structured_data": {
    "key_points": ["the most important points"],
    "categories": ["topics the content belongs to"],
    "related_topics": ["related subjects worth exploring"]
  }
}
Reply with JSON only."#;

/// How the adapter interprets its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// The input is the content itself
    RawText,
    /// The input is an http(s) URL to fetch first
    Url,
}

impl InputMode {
    pub fn detect(input: &str) -> Self {
        if fetch::is_http_url(input) {
            InputMode::Url
        } else {
            InputMode::RawText
        }
    }
}

/// A structured extraction result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub main_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub structured_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
}

impl Extraction {
    pub fn to_value(&self) -> Value {
        let mut value = serde_json::json!({
            "main_content": self.main_content,
            "metadata": self.metadata,
            "structured_data": self.structured_data,
        });
        if let (Some(html), Some(object)) = (&self.html_content, value.as_object_mut()) {
            object.insert("html_content".to_string(), Value::String(html.clone()));
        }
        value
    }
}

/// Parse the model's reply into an [`Extraction`].
///
/// The reply must be a JSON object. Missing fields fall back to an empty
/// string, an empty object and `null` respectively.
pub fn parse_extraction(reply: &str) -> Result<Extraction> {
    let value: Value = serde_json::from_str(reply.trim()).map_err(|e| {
        AppError::Provider(format!("Extraction reply is not valid JSON: {}", e))
    })?;

    let Value::Object(mut object) = value else {
        return Err(AppError::Provider(
            "Extraction reply is not a JSON object".to_string(),
        ));
    };

    let main_content = match object.remove("main_content") {
        Some(Value::String(text)) => text,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let metadata = match object.remove("metadata") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    Ok(Extraction {
        main_content,
        metadata,
        structured_data: object.remove("structured_data").unwrap_or(Value::Null),
        html_content: None,
    })
}

fn metadata_url_missing(metadata: &Map<String, Value>) -> bool {
    match metadata.get("url") {
        None | Some(Value::Null) => true,
        Some(Value::String(url)) => url.trim().is_empty(),
        Some(_) => false,
    }
}

/// Extracts structured data from text or web pages.
pub struct ExtractionAdapter {
    llm: Arc<dyn LLMClient>,
    fetcher: ContentFetcher,
    timeout: Duration,
    preserve_html: bool,
    mode: Option<InputMode>,
}

impl ExtractionAdapter {
    pub fn new(llm: Arc<dyn LLMClient>, fetcher: ContentFetcher, timeout: Duration) -> Self {
        Self {
            llm,
            fetcher,
            timeout,
            preserve_html: false,
            mode: None,
        }
    }

    /// Attach the fetched HTML to Url-mode results.
    pub fn with_preserve_html(mut self, preserve_html: bool) -> Self {
        self.preserve_html = preserve_html;
        self
    }

    /// Fix the input mode instead of detecting it per input.
    pub fn with_mode(mut self, mode: InputMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn process(&self, input: &str) -> Result<Extraction> {
        let mode = self.mode.unwrap_or_else(|| InputMode::detect(input));
        self.process_with_mode(input, mode).await
    }

    pub async fn process_with_mode(&self, input: &str, mode: InputMode) -> Result<Extraction> {
        match mode {
            InputMode::RawText => {
                info!(
                    model = self.llm.model_name(),
                    input_chars = input.chars().count(),
                    "Extracting from raw text"
                );
                self.extract(input).await
            }
            InputMode::Url => {
                let url = input.trim();
                info!(model = self.llm.model_name(), url, "Extracting from URL");

                let page = self.fetcher.fetch(url).await?;
                let prompt = format!("Content extracted from URL {}:\n\n{}", url, page.text);

                let mut extraction = self.extract(&prompt).await?;
                if metadata_url_missing(&extraction.metadata) {
                    extraction
                        .metadata
                        .insert("url".to_string(), Value::String(url.to_string()));
                }
                if self.preserve_html {
                    extraction.html_content = Some(page.html);
                }
                Ok(extraction)
            }
        }
    }

    async fn extract(&self, content: &str) -> Result<Extraction> {
        let request = CompletionRequest::new(EXTRACTION_SYSTEM_PROMPT, content)
            .with_temperature(TEMPERATURE)
            .with_response_format(ResponseFormat::JsonObject);

        let reply = self.llm.complete(&request).await?;
        debug!(reply_chars = reply.chars().count(), "Extraction reply received");

        parse_extraction(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.com/page", InputMode::Url)]
    #[case("  http://example.com", InputMode::Url)]
    #[case("Quarterly revenue grew 4%", InputMode::RawText)]
    #[case("ftp://example.com/file", InputMode::RawText)]
    fn test_input_mode_detection(#[case] input: &str, #[case] expected: InputMode) {
        assert_eq!(InputMode::detect(input), expected);
    }

    #[test]
    fn test_parse_full_reply() {
        let reply = r#"{
            "main_content": "Body",
            "metadata": {"title": "T", "url": "https://a.example"},
            "structured_data": {"key_points": ["k"]}
        }"#;
        let extraction = parse_extraction(reply).unwrap();

        assert_eq!(extraction.main_content, "Body");
        assert_eq!(extraction.metadata["title"], "T");
        assert_eq!(extraction.structured_data["key_points"][0], "k");
        assert!(extraction.html_content.is_none());
    }

    #[test]
    fn test_parse_fills_missing_fields() {
        let extraction = parse_extraction("{}").unwrap();
        assert_eq!(extraction.main_content, "");
        assert!(extraction.metadata.is_empty());
        assert_eq!(extraction.structured_data, Value::Null);
    }

    #[rstest]
    #[case("not json at all")]
    #[case("[1, 2, 3]")]
    #[case("\"a string\"")]
    fn test_parse_rejects_non_objects(#[case] reply: &str) {
        assert!(matches!(
            parse_extraction(reply),
            Err(AppError::Provider(_))
        ));
    }

    #[test]
    fn test_metadata_url_missing() {
        let mut metadata = Map::new();
        assert!(metadata_url_missing(&metadata));

        metadata.insert("url".to_string(), Value::String(" ".to_string()));
        assert!(metadata_url_missing(&metadata));

        metadata.insert("url".to_string(), Value::String("https://a".to_string()));
        assert!(!metadata_url_missing(&metadata));
    }

    #[test]
    fn test_to_value_includes_html_only_when_present() {
        let mut extraction = Extraction {
            main_content: "x".to_string(),
            ..Default::default()
        };
        assert!(extraction.to_value().get("html_content").is_none());

        extraction.html_content = Some("<p>x</p>".to_string());
        assert_eq!(extraction.to_value()["html_content"], "<p>x</p>");
    }
}
