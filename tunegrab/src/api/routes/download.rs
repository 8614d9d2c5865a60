//! Download route.
//!
//! Serves the file a finished job produced, addressed by job identifier and
//! filename. Both segments must be plain path components; anything that
//! could traverse out of the scratch root is rejected before any path join.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tower_http::services::ServeFile;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

/// Serve a produced audio file as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> ApiResult<Response> {
    let path = state
        .extractor
        .scratch()
        .job_file(&id, &filename)
        .map_err(|_| ApiError::bad_request("Invalid job id or filename"))?;

    if !path.is_file() {
        return Err(ApiError::not_found(format!("No such file for job {id}")));
    }

    let req = axum::http::Request::builder()
        .body(Body::empty())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    match ServeFile::new(&path).try_call(req).await {
        Ok(mut response) => {
            let disposition = format!("attachment; filename=\"{filename}\"");
            if let Ok(value) = header::HeaderValue::from_str(&disposition) {
                response
                    .headers_mut()
                    .insert(header::CONTENT_DISPOSITION, value);
            }
            Ok(response.into_response())
        }
        Err(e) => Err(ApiError::internal(format!("Failed to serve file: {e}"))),
    }
}
