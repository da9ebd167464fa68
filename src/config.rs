//! Configuration types for windowed Document AI extraction.
//!
//! All job behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The config is constructed once at startup and
//! passed down by reference; no component reads the environment on its own.
//!
//! Service identity ([`ServiceConfig`]) is checked separately when a job
//! starts, so a library user can build the config first and fill in the
//! processor later.

use crate::error::PipelineError;
use crate::pipeline::pacing::{FixedDelayPacer, Pacer, QuotaPacer};
use crate::progress::ProgressCallback;
use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;

/// Layout Parser version pinned by default.
pub const DEFAULT_PROCESSOR_VERSION: &str = "pretrained-layout-parser-v1.5-2025-08-25";

/// Pages per Document AI request when nothing else is configured.
pub const DEFAULT_WINDOW_SIZE: usize = 15;

/// Delay after each request when nothing else is configured.
pub const DEFAULT_MIN_CALL_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for a windowed extraction job.
///
/// # Example
/// ```rust
/// use edgequake_docai::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .window_size(10)
///     .min_call_interval_ms(1000)
///     .project_id("my-project")
///     .processor_id("abc123")
///     .build()
///     .unwrap();
/// assert_eq!(config.window_size.get(), 10);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Maximum pages per Document AI request. Default: 15.
    ///
    /// The synchronous `process` endpoint caps page counts per request; 15
    /// stays under the Layout Parser limit with margin.
    pub window_size: NonZeroUsize,

    /// Fixed delay applied after every request. Default: 500 ms.
    pub min_call_interval: Duration,

    /// When set, pacing uses a token bucket of this many calls per minute
    /// instead of the fixed delay.
    pub max_calls_per_minute: Option<NonZeroU32>,

    /// Endpoint, credentials and processor identity.
    pub service: ServiceConfig,

    /// Target chunk size passed to the Layout Parser chunking config. Default: 1024.
    pub chunk_size: u32,

    /// Prefix every chunk with its ancestor headings. Default: true.
    ///
    /// Keeps each chunk self-describing when windows split a section.
    pub include_ancestor_headings: bool,

    /// Per-request transport timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Observer notified at window and job boundaries.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            window_size: NonZeroUsize::new(DEFAULT_WINDOW_SIZE).unwrap_or(NonZeroUsize::MIN),
            min_call_interval: DEFAULT_MIN_CALL_INTERVAL,
            max_calls_per_minute: None,
            service: ServiceConfig::default(),
            chunk_size: 1024,
            include_ancestor_headings: true,
            api_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("window_size", &self.window_size)
            .field("min_call_interval", &self.min_call_interval)
            .field("max_calls_per_minute", &self.max_calls_per_minute)
            .field("service", &self.service)
            .field("chunk_size", &self.chunk_size)
            .field("include_ancestor_headings", &self.include_ancestor_headings)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineObserver>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// The pacer implied by this config.
    pub fn pacer(&self) -> Arc<dyn Pacer> {
        match self.max_calls_per_minute {
            Some(per_minute) => Arc::new(QuotaPacer::per_minute(per_minute)),
            None => Arc::new(FixedDelayPacer::new(self.min_call_interval)),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
    window_size: usize,
}

impl ExtractionConfigBuilder {
    pub fn window_size(mut self, pages: usize) -> Self {
        self.window_size = pages;
        self
    }

    pub fn min_call_interval(mut self, interval: Duration) -> Self {
        self.config.min_call_interval = interval;
        self
    }

    pub fn min_call_interval_ms(self, ms: u64) -> Self {
        self.min_call_interval(Duration::from_millis(ms))
    }

    pub fn max_calls_per_minute(mut self, n: u32) -> Self {
        self.config.max_calls_per_minute = NonZeroU32::new(n);
        self
    }

    pub fn service(mut self, service: ServiceConfig) -> Self {
        self.config.service = service;
        self
    }

    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.config.service.project_id = Some(id.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.config.service.location = location.into();
        self
    }

    pub fn processor_id(mut self, id: impl Into<String>) -> Self {
        self.config.service.processor_id = Some(id.into());
        self
    }

    pub fn processor_version(mut self, version: impl Into<String>) -> Self {
        self.config.service.processor_version = version.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.service.endpoint = Some(url.into());
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.service.access_token = Some(token.into());
        self
    }

    pub fn chunk_size(mut self, n: u32) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn include_ancestor_headings(mut self, v: bool) -> Self {
        self.config.include_ancestor_headings = v;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ExtractionConfig, PipelineError> {
        self.config.window_size = NonZeroUsize::new(self.window_size).ok_or_else(|| {
            PipelineError::InvalidConfig("Window size must be ≥ 1 page".into())
        })?;
        if self.config.chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "Chunk size must be ≥ 1".into(),
            ));
        }
        if self.config.api_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Service identity ─────────────────────────────────────────────────────

/// Where and as whom to call Document AI.
#[derive(Clone)]
pub struct ServiceConfig {
    /// GCP project id (`GCP_PROJECT_ID`). Required.
    pub project_id: Option<String>,
    /// Processor region, `"us"` or `"eu"` (`GCP_LOCATION`). Default: `"us"`.
    pub location: String,
    /// Layout Parser processor id (`GCP_PROCESSOR_ID`). Required.
    pub processor_id: Option<String>,
    /// Processor version. Default: [`DEFAULT_PROCESSOR_VERSION`].
    pub processor_version: String,
    /// Base URL override; defaults to `https://{location}-documentai.googleapis.com`.
    pub endpoint: Option<String>,
    /// OAuth2 bearer token (`GCP_ACCESS_TOKEN`). When absent the client asks
    /// `gcloud auth print-access-token`.
    pub access_token: Option<String>,
}

impl ServiceConfig {
    /// Read `GCP_PROJECT_ID`, `GCP_LOCATION`, `GCP_PROCESSOR_ID`,
    /// `GCP_PROCESSOR_VERSION`, `DOCUMENTAI_ENDPOINT` and `GCP_ACCESS_TOKEN`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            project_id: var("GCP_PROJECT_ID"),
            location: var("GCP_LOCATION").unwrap_or(defaults.location),
            processor_id: var("GCP_PROCESSOR_ID"),
            processor_version: var("GCP_PROCESSOR_VERSION").unwrap_or(defaults.processor_version),
            endpoint: var("DOCUMENTAI_ENDPOINT"),
            access_token: var("GCP_ACCESS_TOKEN"),
        }
    }

    /// Check that every setting needed to build a request is present.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.project_id.as_deref().is_none_or(|s| s.trim().is_empty()) {
            return Err(PipelineError::MissingSetting {
                name: "GCP_PROJECT_ID",
                hint: "Set GCP_PROJECT_ID in the environment or .env, or pass --project-id.".into(),
            });
        }
        if self.processor_id.as_deref().is_none_or(|s| s.trim().is_empty()) {
            return Err(PipelineError::MissingSetting {
                name: "GCP_PROCESSOR_ID",
                hint: "Set GCP_PROCESSOR_ID in the environment or .env, or pass --processor-id."
                    .into(),
            });
        }
        if self.location.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("location must not be empty".into()));
        }
        if self.processor_version.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "processor version must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Base URL of the regional endpoint.
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}-documentai.googleapis.com", self.location),
        }
    }

    /// Fully-qualified processor version resource name.
    pub fn processor_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/processors/{}/processorVersions/{}",
            self.project_id.as_deref().unwrap_or_default(),
            self.location,
            self.processor_id.as_deref().unwrap_or_default(),
            self.processor_version
        )
    }

    /// `…:process` URL for the configured processor version.
    pub fn process_url(&self) -> String {
        format!("{}/v1/{}:process", self.endpoint_url(), self.processor_name())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: "us".to_string(),
            processor_id: None,
            processor_version: DEFAULT_PROCESSOR_VERSION.to_string(),
            endpoint: None,
            access_token: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("processor_id", &self.processor_id)
            .field("processor_version", &self.processor_version)
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_layout_parser_profile() {
        let c = ExtractionConfig::default();
        assert_eq!(c.window_size.get(), 15);
        assert_eq!(c.min_call_interval, Duration::from_millis(500));
        assert_eq!(c.chunk_size, 1024);
        assert!(c.include_ancestor_headings);
        assert_eq!(c.service.location, "us");
        assert_eq!(c.service.processor_version, DEFAULT_PROCESSOR_VERSION);
    }

    #[test]
    fn zero_window_size_is_rejected() {
        let err = ExtractionConfig::builder().window_size(0).build().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(ExtractionConfig::builder().chunk_size(0).build().is_err());
    }

    #[test]
    fn quota_replaces_fixed_delay() {
        let c = ExtractionConfig::builder()
            .max_calls_per_minute(120)
            .build()
            .unwrap();
        assert_eq!(c.max_calls_per_minute, NonZeroU32::new(120));

        let c = ExtractionConfig::builder()
            .max_calls_per_minute(0)
            .build()
            .unwrap();
        assert_eq!(c.max_calls_per_minute, None);
    }

    #[test]
    fn service_requires_project_and_processor() {
        let missing_project = ServiceConfig {
            processor_id: Some("p".into()),
            ..ServiceConfig::default()
        };
        assert!(matches!(
            missing_project.validate(),
            Err(PipelineError::MissingSetting { name: "GCP_PROJECT_ID", .. })
        ));

        let missing_processor = ServiceConfig {
            project_id: Some("proj".into()),
            processor_id: Some("   ".into()),
            ..ServiceConfig::default()
        };
        assert!(matches!(
            missing_processor.validate(),
            Err(PipelineError::MissingSetting { name: "GCP_PROCESSOR_ID", .. })
        ));
    }

    #[test]
    fn process_url_uses_regional_endpoint() {
        let s = ServiceConfig {
            project_id: Some("proj".into()),
            processor_id: Some("abc".into()),
            location: "eu".into(),
            ..ServiceConfig::default()
        };
        assert!(s.validate().is_ok());
        assert_eq!(
            s.process_url(),
            "https://eu-documentai.googleapis.com/v1/projects/proj/locations/eu/processors/abc/processorVersions/pretrained-layout-parser-v1.5-2025-08-25:process"
        );
    }

    #[test]
    fn endpoint_override_trims_trailing_slash() {
        let s = ServiceConfig {
            endpoint: Some("http://127.0.0.1:8080/".into()),
            ..ServiceConfig::default()
        };
        assert_eq!(s.endpoint_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn debug_redacts_token() {
        let c = ExtractionConfig::builder()
            .access_token("ya29.secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("ya29.secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
