//! Extraction route.
//!
//! Accepts a source URL and streams the job's events back as
//! newline-delimited JSON, one record per event, in emission order. The
//! stream ends after the terminal `error` or `done` record. A client that
//! disconnects mid-stream does not cancel the job; the produced file stays
//! fetchable through the download route.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub url: String,
}

/// Start an extraction job and stream its events.
pub async fn extract(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> ApiResult<Response> {
    let url = req.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }

    let parsed = url::Url::parse(&url).map_err(|_| ApiError::bad_request("Invalid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::bad_request("Only HTTP(S) URLs are supported"));
    }

    let (job_id, rx) = state.extractor.run(url);
    debug!(%job_id, "streaming extraction events");

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let mut line = serde_json::to_string(&event).ok()?;
        line.push('\n');
        Some((Ok::<String, std::convert::Infallible>(line), rx))
    });

    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(stream),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::build_router;
    use crate::config::AppConfig;
    use axum::body::to_bytes;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state_in(temp: &TempDir) -> AppState {
        AppState::new(AppConfig {
            data_dir: temp.path().join("jobs"),
            ytdlp_path: temp.path().join("fake-yt-dlp").display().to_string(),
            ..AppConfig::default()
        })
    }

    fn post_extract(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/extract")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_url_is_rejected() {
        let temp = TempDir::new().unwrap();
        let app = build_router(state_in(&temp));

        let response = app.oneshot(post_extract(r#"{"url": "  "}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unparsable_url_is_rejected() {
        let temp = TempDir::new().unwrap();
        let app = build_router(state_in(&temp));

        let response = app
            .oneshot(post_extract(r#"{"url": "not a url"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_http_scheme_is_rejected() {
        let temp = TempDir::new().unwrap();
        let app = build_router(state_in(&temp));

        let response = app
            .oneshot(post_extract(r#"{"url": "file:///etc/passwd"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streams_ndjson_until_the_terminal_event() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let script = temp.path().join("fake-yt-dlp");
        std::fs::write(
            &script,
            r#"#!/bin/sh
for a in "$@"; do
  if [ "$a" = "-x" ]; then
    out=""
    prev=""
    for b in "$@"; do
      [ "$prev" = "-o" ] && out=$b
      prev=$b
    done
    echo "[download] 100% of 1.00MiB"
    : > "$(dirname "$out")/out.mp3"
    exit 0
  fi
done
echo "Test"
echo "10"
exit 0
"#,
        )
        .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let app = build_router(state_in(&temp));
        let response = app
            .oneshot(post_extract(r#"{"url": "https://example.com/v/1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/x-ndjson"
        );

        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines.len() >= 4, "body: {text}");
        assert_eq!(
            lines[0],
            r#"{"type":"progress","message":"Fetching video info..."}"#
        );
        let last: serde_json::Value = serde_json::from_str(lines.last().unwrap()).unwrap();
        assert_eq!(last["type"], "done");
        assert_eq!(last["title"], "Test");
        assert_eq!(last["duration"], "0:10");
        assert_eq!(last["filename"], "out.mp3");
    }
}
