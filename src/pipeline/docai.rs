//! Document AI Layout Parser client: one `:process` call per window.
//!
//! ## Request shape
//!
//! The sub-document is sent inline as a base64 `rawDocument` together with a
//! layout-chunking profile:
//!
//! ```text
//! POST {endpoint}/v1/projects/{p}/locations/{l}/processors/{id}/processorVersions/{v}:process
//! { "rawDocument":    { "content": "<base64>", "mimeType": "application/pdf" },
//!   "processOptions": { "layoutConfig": { "chunkingConfig":
//!                       { "chunkSize": 1024, "includeAncestorHeadings": true } } } }
//! ```
//!
//! The response's `document.chunkedDocument.chunks[]` is returned verbatim,
//! in service order. The client never retries; a failed call becomes a
//! [`WindowError`] and the orchestrator moves on.

use crate::config::{ExtractionConfig, ServiceConfig};
use crate::error::{PipelineError, WindowError};
use crate::output::ContentChunk;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// MIME type of every sub-document the pipeline produces.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Longest error body kept in an [`WindowError::Api`] message.
const MAX_ERROR_BODY: usize = 300;

/// Submits one serialized window and returns its chunks.
///
/// Implementations perform exactly one outbound call per invocation.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Called once while the job initializes, before any window is built.
    /// Failures are configuration errors and end the job.
    async fn prepare(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn extract(&self, payload: &[u8]) -> Result<Vec<ContentChunk>, WindowError>;
}

/// Layout-chunking options sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisProfile {
    pub chunk_size: u32,
    pub include_ancestor_headings: bool,
}

impl From<&ExtractionConfig> for AnalysisProfile {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            include_ancestor_headings: config.include_ancestor_headings,
        }
    }
}

/// REST client for a Layout Parser processor version.
pub struct DocumentAiClient {
    http: reqwest::Client,
    url: String,
    token: AccessToken,
    profile: AnalysisProfile,
}

impl std::fmt::Debug for DocumentAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAiClient")
            .field("url", &self.url)
            .field("profile", &self.profile)
            .finish()
    }
}

impl DocumentAiClient {
    /// Build a client from the job config.
    ///
    /// No token is fetched here; a configured `access_token` is used as is,
    /// otherwise `gcloud` is asked during [`ExtractionClient::prepare`] and
    /// again whenever the token is older than [`TOKEN_MAX_AGE`].
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, PipelineError> {
        let token = match config.service.access_token.as_deref() {
            Some(token) => AccessToken::fixed(token),
            None => AccessToken::refreshing(Arc::new(GcloudTokenSource), TOKEN_MAX_AGE),
        };
        Self::new(
            &config.service,
            token,
            AnalysisProfile::from(config),
            Duration::from_secs(config.api_timeout_secs),
        )
    }

    pub fn new(
        service: &ServiceConfig,
        token: AccessToken,
        profile: AnalysisProfile,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: service.process_url(),
            token,
            profile,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ExtractionClient for DocumentAiClient {
    async fn prepare(&self) -> Result<(), PipelineError> {
        self.token.get().await.map(|_| ())
    }

    async fn extract(&self, payload: &[u8]) -> Result<Vec<ContentChunk>, WindowError> {
        let token = self
            .token
            .get()
            .await
            .map_err(|e| WindowError::Credentials {
                detail: e.to_string(),
            })?;
        let body = ProcessRequest::new(payload, self.profile);
        debug!("POST {} ({} bytes of PDF)", self.url, payload.len());

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(WindowError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let parsed: ProcessResponse =
            serde_json::from_str(&text).map_err(|e| WindowError::Api {
                status: status.as_u16(),
                message: format!("unreadable response body: {e}"),
            })?;
        chunks_from_response(parsed)
    }
}

fn transport_error(e: reqwest::Error) -> WindowError {
    WindowError::Transport {
        detail: e.to_string(),
        timed_out: e.is_timeout(),
    }
}

/// Map a successful response to ordered chunks.
///
/// A missing `document`, a missing `chunkedDocument`, or an empty chunk list
/// are all [`WindowError::EmptyResult`].
pub fn chunks_from_response(response: ProcessResponse) -> Result<Vec<ContentChunk>, WindowError> {
    let chunks = response
        .document
        .and_then(|d| d.chunked_document)
        .map(|c| c.chunks)
        .unwrap_or_default();
    if chunks.is_empty() {
        return Err(WindowError::EmptyResult);
    }
    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(ordinal, c)| ContentChunk {
            ordinal,
            chunk_id: c.chunk_id,
            content: c.content,
        })
        .collect())
}

/// Pull `error.message` out of a Google API error body, else the raw body.
fn api_error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        let status = parsed.error.status.unwrap_or_default();
        return if status.is_empty() {
            parsed.error.message
        } else {
            format!("{status}: {}", parsed.error.message)
        };
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}…")
    } else {
        trimmed.to_string()
    }
}

// ── Access token ─────────────────────────────────────────────────────────

/// Age after which a `gcloud` token is fetched again. Tokens from
/// `gcloud auth print-access-token` expire after 60 minutes.
pub const TOKEN_MAX_AGE: Duration = Duration::from_secs(50 * 60);

/// Produces a fresh OAuth2 bearer token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<String, PipelineError>;
}

/// Asks `gcloud auth print-access-token`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GcloudTokenSource;

#[async_trait]
impl TokenSource for GcloudTokenSource {
    async fn fetch(&self) -> Result<String, PipelineError> {
        debug!("Running `gcloud auth print-access-token`");
        let output = tokio::process::Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| PipelineError::MissingSetting {
                name: "GCP_ACCESS_TOKEN",
                hint: format!("Set GCP_ACCESS_TOKEN or install the gcloud CLI ({e})."),
            })?;

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || token.is_empty() {
            return Err(PipelineError::MissingSetting {
                name: "GCP_ACCESS_TOKEN",
                hint: format!(
                    "`gcloud auth print-access-token` failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(token)
    }
}

/// Bearer token used by [`DocumentAiClient`]: either fixed, or fetched from
/// a [`TokenSource`] on first use and again once older than `max_age`.
pub struct AccessToken {
    source: Option<Arc<dyn TokenSource>>,
    max_age: Duration,
    current: Mutex<Option<(String, Instant)>>,
}

impl AccessToken {
    /// A token that is never refreshed (`GCP_ACCESS_TOKEN`).
    pub fn fixed(token: &str) -> Self {
        Self {
            source: None,
            max_age: Duration::MAX,
            current: Mutex::new(Some((token.trim().to_string(), Instant::now()))),
        }
    }

    pub fn refreshing(source: Arc<dyn TokenSource>, max_age: Duration) -> Self {
        Self {
            source: Some(source),
            max_age,
            current: Mutex::new(None),
        }
    }

    /// The current token, fetching a new one first if it is missing or stale.
    pub async fn get(&self) -> Result<String, PipelineError> {
        let mut current = self.current.lock().await;
        let source = match (&*current, &self.source) {
            (Some((token, _)), None) => return Ok(token.clone()),
            (Some((token, fetched)), Some(_)) if fetched.elapsed() < self.max_age => {
                return Ok(token.clone())
            }
            (_, Some(source)) => source,
            (None, None) => {
                return Err(PipelineError::Internal("access token has no source".into()))
            }
        };

        if current.is_some() {
            info!("Access token older than {:?}; refreshing", self.max_age);
        }
        let token = source.fetch().await?;
        *current = Some((token.clone(), Instant::now()));
        Ok(token)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    raw_document: RawDocument,
    process_options: ProcessOptions,
}

impl ProcessRequest {
    pub fn new(payload: &[u8], profile: AnalysisProfile) -> Self {
        Self {
            raw_document: RawDocument {
                content: STANDARD.encode(payload),
                mime_type: PDF_MIME_TYPE,
            },
            process_options: ProcessOptions {
                layout_config: LayoutConfig {
                    chunking_config: ChunkingConfig {
                        chunk_size: profile.chunk_size,
                        include_ancestor_headings: profile.include_ancestor_headings,
                    },
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    content: String,
    mime_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessOptions {
    layout_config: LayoutConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfig {
    chunking_config: ChunkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChunkingConfig {
    chunk_size: u32,
    include_ancestor_headings: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessResponse {
    #[serde(default)]
    pub document: Option<ResponseDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDocument {
    #[serde(default)]
    pub chunked_document: Option<ChunkedDocument>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkedDocument {
    #[serde(default)]
    pub chunks: Vec<ResponseChunk>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseChunk {
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn profile() -> AnalysisProfile {
        AnalysisProfile {
            chunk_size: 1024,
            include_ancestor_headings: true,
        }
    }

    #[test]
    fn request_body_matches_layout_parser_schema() {
        let body = serde_json::to_value(ProcessRequest::new(b"%PDF-1.7", profile())).unwrap();
        assert_eq!(
            body,
            json!({
                "rawDocument": {
                    "content": STANDARD.encode(b"%PDF-1.7"),
                    "mimeType": "application/pdf"
                },
                "processOptions": {
                    "layoutConfig": {
                        "chunkingConfig": {
                            "chunkSize": 1024,
                            "includeAncestorHeadings": true
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn chunks_keep_service_order() {
        let resp: ProcessResponse = serde_json::from_value(json!({
            "document": {
                "chunkedDocument": {
                    "chunks": [
                        { "chunkId": "c2", "content": "second in id, first in list" },
                        { "chunkId": "c1", "content": "first in id, second in list" }
                    ]
                }
            }
        }))
        .unwrap();

        let chunks = chunks_from_response(resp).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].ordinal, 0);
        assert_eq!(chunks[0].chunk_id.as_deref(), Some("c2"));
        assert_eq!(chunks[1].ordinal, 1);
        assert_eq!(chunks[1].content, "first in id, second in list");
    }

    #[test]
    fn missing_or_empty_chunks_are_empty_result() {
        for body in [
            json!({}),
            json!({ "document": {} }),
            json!({ "document": { "chunkedDocument": {} } }),
            json!({ "document": { "chunkedDocument": { "chunks": [] } } }),
        ] {
            let resp: ProcessResponse = serde_json::from_value(body.clone()).unwrap();
            assert_eq!(
                chunks_from_response(resp),
                Err(WindowError::EmptyResult),
                "body: {body}"
            );
        }
    }

    #[test]
    fn google_error_body_is_summarised() {
        let body = r#"{"error":{"code":400,"message":"Document pages exceed the limit","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            api_error_message(body),
            "INVALID_ARGUMENT: Document pages exceed the limit"
        );
    }

    #[test]
    fn non_json_error_body_is_truncated() {
        let body = "x".repeat(1000);
        let msg = api_error_message(&body);
        assert_eq!(msg.chars().count(), MAX_ERROR_BODY + 1);
        assert!(msg.ends_with('…'));
    }

    /// Hands out `token-1`, `token-2`, … and counts fetches.
    #[derive(Default)]
    struct CountingTokens {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl TokenSource for CountingTokens {
        async fn fetch(&self) -> Result<String, PipelineError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{n}"))
        }
    }

    struct NoGcloud;

    #[async_trait]
    impl TokenSource for NoGcloud {
        async fn fetch(&self) -> Result<String, PipelineError> {
            Err(PipelineError::MissingSetting {
                name: "GCP_ACCESS_TOKEN",
                hint: "gcloud not installed".into(),
            })
        }
    }

    #[tokio::test]
    async fn fixed_token_is_trimmed_and_never_refreshed() {
        let token = AccessToken::fixed("  ya29.token \n");
        assert_eq!(token.get().await.unwrap(), "ya29.token");
        assert_eq!(token.get().await.unwrap(), "ya29.token");
    }

    #[tokio::test(start_paused = true)]
    async fn stale_token_is_fetched_again() {
        let source = Arc::new(CountingTokens::default());
        let token = AccessToken::refreshing(source.clone(), TOKEN_MAX_AGE);

        assert_eq!(token.get().await.unwrap(), "token-1");
        tokio::time::advance(Duration::from_secs(49 * 60)).await;
        assert_eq!(token.get().await.unwrap(), "token-1");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert_eq!(token.get().await.unwrap(), "token-2");
        assert_eq!(token.get().await.unwrap(), "token-2");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn prepare_fetches_token_once_and_reports_failure() {
        let service = ServiceConfig::default();
        let source = Arc::new(CountingTokens::default());
        let client = DocumentAiClient::new(
            &service,
            AccessToken::refreshing(source.clone(), TOKEN_MAX_AGE),
            profile(),
            Duration::from_secs(5),
        )
        .unwrap();
        client.prepare().await.unwrap();
        client.prepare().await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        let client = DocumentAiClient::new(
            &service,
            AccessToken::refreshing(Arc::new(NoGcloud), TOKEN_MAX_AGE),
            profile(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.prepare().await.unwrap_err();
        assert!(err.is_configuration_error());

        let err = client.extract(b"%PDF").await.unwrap_err();
        assert!(matches!(err, WindowError::Credentials { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let service = ServiceConfig {
            project_id: Some("p".into()),
            processor_id: Some("x".into()),
            // Port 9 (discard) on localhost is closed on CI runners.
            endpoint: Some("http://127.0.0.1:9".into()),
            ..ServiceConfig::default()
        };
        let client = DocumentAiClient::new(
            &service,
            AccessToken::fixed("token"),
            profile(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(client.url().starts_with("http://127.0.0.1:9/v1/projects/p/"));

        let err = client.extract(b"%PDF").await.unwrap_err();
        assert!(matches!(err, WindowError::Transport { .. }), "got: {err:?}");
    }
}
