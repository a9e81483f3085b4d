//! Batch extraction over a list of URLs.

use crate::agents::{Dispatcher, ProviderAdapter};
use crate::fetch::parse_http_url;
use crate::normalize::{normalize, ResultEnvelope};
use crate::types::{AppError, DataExtractionRequest, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::info;

/// Runs the extraction adapter over every URL of a request and normalizes
/// the results into one envelope.
pub struct ExtractionPipeline {
    dispatcher: Arc<Dispatcher>,
    concurrency: usize,
}

impl ExtractionPipeline {
    pub fn new(dispatcher: Arc<Dispatcher>, concurrency: usize) -> Self {
        Self {
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Extract from every URL in `request`.
    ///
    /// URLs are processed with at most `concurrency` in flight; results keep
    /// the input order. The first failing URL fails the whole batch.
    pub async fn run(&self, request: &DataExtractionRequest) -> Result<ResultEnvelope> {
        if request.urls.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one URL is required".to_string(),
            ));
        }
        if request.output_format != "json" {
            return Err(AppError::InvalidInput(format!(
                "Unsupported output format '{}'",
                request.output_format
            )));
        }
        for url in &request.urls {
            parse_http_url(url)?;
        }

        let adapter = ProviderAdapter::Extraction(
            self.dispatcher.extraction_adapter(request.preserve_html)?,
        );

        info!(
            urls = request.urls.len(),
            concurrency = self.concurrency,
            preserve_html = request.preserve_html,
            "Starting batch extraction"
        );

        let calls: Vec<_> = request
            .urls
            .iter()
            .map(|url| adapter.process(url))
            .collect();

        let results = stream::iter(calls)
            .buffered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(normalize(
            &results,
            &request.urls,
            request.data_points.as_deref(),
            request.preserve_html,
            Utc::now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::toml_config::OperatorConfig;

    fn pipeline(api_key: Option<&str>) -> ExtractionPipeline {
        let key = api_key.map(str::to_string);
        let settings = OperatorConfig::default().provider_settings_with(move |_| key.clone());
        ExtractionPipeline::new(Arc::new(Dispatcher::new(&settings).unwrap()), 1)
    }

    fn request(urls: &[&str]) -> DataExtractionRequest {
        DataExtractionRequest {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            data_points: None,
            output_format: "json".to_string(),
            preserve_html: false,
        }
    }

    #[tokio::test]
    async fn test_empty_url_list_is_rejected() {
        let err = pipeline(Some("sk-test")).run(&request(&[])).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_malformed_url_fails_before_any_io() {
        let err = pipeline(Some("sk-test"))
            .run(&request(&["https://a.example", "not a url"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unsupported_output_format() {
        let mut req = request(&["https://a.example"]);
        req.output_format = "xml".to_string();
        let err = pipeline(Some("sk-test")).run(&req).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_a_configuration_error() {
        let err = pipeline(None)
            .run(&request(&["https://a.example"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_concurrency_is_at_least_one() {
        assert_eq!(pipeline(None).concurrency, 1);
    }
}
