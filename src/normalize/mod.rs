//! Result normalization.
//!
//! Adapter outputs come in two shapes. [`normalize`] folds a batch of them
//! into one [`ResultEnvelope`]; [`ResultEnvelope::from_result`] does the same
//! for a single result.

use crate::agents::ProviderResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The response shape returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub main_content: String,
    pub metadata: Map<String, Value>,
    pub structured_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
}

impl ResultEnvelope {
    /// Envelope for a single adapter result.
    pub fn from_result(result: &ProviderResult) -> Self {
        match result {
            ProviderResult::Text(text) => Self {
                main_content: text.clone(),
                metadata: Map::new(),
                structured_data: Value::Null,
                html_content: None,
            },
            ProviderResult::Structured(extraction) => Self {
                main_content: extraction.main_content.clone(),
                metadata: extraction.metadata.clone(),
                structured_data: extraction.structured_data.clone(),
                html_content: extraction.html_content.clone(),
            },
        }
    }
}

/// Fold per-URL results into one envelope, keeping input order.
///
/// `generated_at` becomes `metadata.timestamp`. HTML is only collected when
/// `preserve_html` is set; results without HTML are skipped when joining it.
pub fn normalize(
    results: &[ProviderResult],
    urls: &[String],
    data_points: Option<&[String]>,
    preserve_html: bool,
    generated_at: DateTime<Utc>,
) -> ResultEnvelope {
    let main_content = results
        .iter()
        .map(ProviderResult::main_content)
        .collect::<Vec<_>>()
        .join("\n\n");

    let structured_data = results
        .iter()
        .map(|result| match result {
            ProviderResult::Text(_) => Value::Null,
            ProviderResult::Structured(extraction) => extraction.structured_data.clone(),
        })
        .collect::<Vec<_>>();

    let mut metadata = Map::new();
    metadata.insert("urls".to_string(), serde_json::json!(urls));
    metadata.insert(
        "data_points".to_string(),
        data_points.map_or(Value::Null, |points| serde_json::json!(points)),
    );
    metadata.insert(
        "timestamp".to_string(),
        Value::String(generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    let html_content = preserve_html.then(|| {
        results
            .iter()
            .filter_map(|result| match result {
                ProviderResult::Structured(extraction) => extraction.html_content.as_deref(),
                ProviderResult::Text(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    });

    ResultEnvelope {
        main_content,
        metadata,
        structured_data: Value::Array(structured_data),
        html_content,
    }
}
