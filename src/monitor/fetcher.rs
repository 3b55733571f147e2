//! Result site client
//!
//! Fetches the templated result page for a registration number and turns the
//! response into a [`CheckOutcome`]. Transient failures are retried with
//! bounded exponential backoff.

use crate::config::FetchConfig;
use crate::monitor::classifier::{extract_title, Classifier, PageKind};
use crate::monitor::registration::RegistrationNumber;
use crate::monitor::retry::with_retry;
use crate::utils::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use tracing::{debug, info, instrument, warn};

/// Details about a published result page
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMetadata {
    pub reg_no: RegistrationNumber,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub size: usize,
    pub title: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Outcome of one check of one registration number
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    NotYetPublished,
    Published {
        body: Vec<u8>,
        metadata: ResultMetadata,
    },
    /// Retries exhausted or permanent failure
    Error(String),
}

/// State of the results portal landing page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingStatus {
    /// No landing page configured
    Ungated,
    Live,
    NotLive,
}

impl CheckOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, CheckOutcome::Published { .. })
    }
}

/// Source of result pages
///
/// Abstracts the result site so the monitor loop can be tested with a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultSource: Send + Sync {
    /// Check a single registration number. Never fails; errors are folded
    /// into [`CheckOutcome::Error`].
    async fn check(&self, reg_no: &RegistrationNumber) -> CheckOutcome;

    /// Whether the results portal is open
    async fn landing_status(&self) -> Result<LandingStatus, AppError>;

    /// Human-readable target, used in announcements
    fn target(&self) -> String;
}

/// [`ResultSource`] backed by HTTP requests to the result site
#[derive(Debug, Clone)]
pub struct HttpResultSource {
    client: Client,
    config: FetchConfig,
    classifier: Classifier,
}

impl HttpResultSource {
    pub fn new(config: FetchConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("result-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;
        let classifier = Classifier::new(&config.markers);

        Ok(Self {
            client,
            config,
            classifier,
        })
    }

    /// Single attempt, no retry
    async fn fetch_once(
        &self,
        reg_no: &RegistrationNumber,
        url: &str,
    ) -> Result<CheckOutcome, AppError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(reg_no = %reg_no, "Result page not found yet");
            return Ok(CheckOutcome::NotYetPublished);
        }
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        let text = String::from_utf8_lossy(&body);

        match self.classifier.classify(&text) {
            PageKind::NotPublished => Ok(CheckOutcome::NotYetPublished),
            PageKind::SiteDown => {
                let marker = self
                    .classifier
                    .site_down_marker(&text)
                    .unwrap_or("overload page")
                    .to_string();
                Err(AppError::SiteUnavailable(marker))
            }
            PageKind::Published => {
                let metadata = ResultMetadata {
                    reg_no: reg_no.clone(),
                    url: url.to_string(),
                    status: status.as_u16(),
                    content_type,
                    size: body.len(),
                    title: extract_title(&text),
                    fetched_at: Utc::now(),
                };
                Ok(CheckOutcome::Published {
                    body: body.to_vec(),
                    metadata,
                })
            }
        }
    }
}

#[async_trait]
impl ResultSource for HttpResultSource {
    #[instrument(skip(self, reg_no), fields(reg_no = %reg_no))]
    async fn check(&self, reg_no: &RegistrationNumber) -> CheckOutcome {
        let url = self.config.result_url(reg_no);

        match with_retry(&self.config.retry, || self.fetch_once(reg_no, &url)).await {
            Ok(outcome) => {
                if outcome.is_published() {
                    info!(reg_no = %reg_no, "Result published");
                }
                outcome
            }
            Err(e) => {
                warn!(reg_no = %reg_no, error = %e, code = e.error_code(), "Result check failed");
                CheckOutcome::Error(e.to_string())
            }
        }
    }

    async fn landing_status(&self) -> Result<LandingStatus, AppError> {
        let Some(url) = self.config.landing_url.as_deref() else {
            return Ok(LandingStatus::Ungated);
        };

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(status = %status, "Landing page not live");
            return Ok(LandingStatus::NotLive);
        }

        let body = response.text().await?;
        if self.classifier.classify(&body) == PageKind::SiteDown {
            debug!("Landing page shows overload marker");
            return Ok(LandingStatus::NotLive);
        }
        Ok(LandingStatus::Live)
    }

    fn target(&self) -> String {
        self.config
            .landing_url
            .clone()
            .unwrap_or_else(|| self.config.result_url_template.clone())
    }
}
