//! Batch data extraction handler.

use crate::normalize::ResultEnvelope;
use crate::types::{DataExtractionRequest, Result};
use crate::AppState;
use axum::{extract::State, Json};

/// Extract structured data from every URL in the request
pub async fn process_extraction(
    State(state): State<AppState>,
    Json(request): Json<DataExtractionRequest>,
) -> Result<Json<ResultEnvelope>> {
    Ok(Json(state.pipeline.run(&request).await?))
}
