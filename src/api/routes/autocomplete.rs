//! Autocomplete Routes
//!
//! - POST /api/autocomplete - Mocked completion suggestion

use axum::Json;

use crate::api::dto::{AutocompleteRequest, AutocompleteResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::autocomplete;

/// Upper bound on the code accepted for a suggestion (1 MB)
const MAX_CODE_LEN: usize = 1024 * 1024;

/// POST /api/autocomplete
///
/// Suggest a completion at the cursor position.
pub async fn suggest(
    Json(req): Json<AutocompleteRequest>,
) -> ApiResult<Json<AutocompleteResponse>> {
    validate_request(&req)?;

    let s = autocomplete::suggest(&req.code, req.cursor_position, &req.language);

    Ok(Json(AutocompleteResponse {
        suggestion: s.suggestion,
        confidence: s.confidence,
        description: Some(s.description),
    }))
}

fn validate_request(req: &AutocompleteRequest) -> ApiResult<()> {
    if req.code.len() > MAX_CODE_LEN {
        return Err(ApiError::Validation(format!(
            "Code exceeds maximum of {} bytes",
            MAX_CODE_LEN
        )));
    }
    if req.language.trim().is_empty() {
        return Err(ApiError::Validation("Language cannot be empty".to_string()));
    }
    Ok(())
}
