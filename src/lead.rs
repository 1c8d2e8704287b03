//! Lead submission collaborators
//!
//! Completed intakes go to an HTTP endpoint when one is configured and
//! are only logged otherwise.

mod error;

pub use error::{SubmitError, SubmitErrorKind};

use crate::runtime::{LeadSubmission, LeadSubmitter};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// POSTs each lead as JSON to a fixed endpoint
pub struct HttpLeadSubmitter {
    client: Client,
    endpoint: String,
}

impl HttpLeadSubmitter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SubmitError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::unknown(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl LeadSubmitter for HttpLeadSubmitter {
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(lead)
            .send()
            .await
            .map_err(|e| SubmitError::from_reqwest(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SubmitError::from_status(status.as_u16(), &body))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Used when no endpoint is configured: the lead only shows up in the logs
#[derive(Debug, Default)]
pub struct LogOnlySubmitter;

#[async_trait]
impl LeadSubmitter for LogOnlySubmitter {
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), SubmitError> {
        let intake = serde_json::to_string(&lead.intake)
            .map_err(|e| SubmitError::unknown(format!("Failed to encode intake: {e}")))?;
        tracing::info!(
            session_id = %lead.session_id,
            consultation_requested = lead.consultation_requested,
            intake = %intake,
            "Lead captured (no submission endpoint configured)"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Logging wrapper for lead submitters
pub struct LoggingSubmitter {
    inner: Arc<dyn LeadSubmitter>,
}

impl LoggingSubmitter {
    pub fn new(inner: Arc<dyn LeadSubmitter>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LeadSubmitter for LoggingSubmitter {
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), SubmitError> {
        let start = std::time::Instant::now();
        let result = self.inner.submit(lead).await;
        let duration = start.elapsed();

        match &result {
            Ok(()) => {
                tracing::info!(
                    submitter = self.inner.name(),
                    session_id = %lead.session_id,
                    duration_ms = %duration.as_millis(),
                    "Lead submitted"
                );
            }
            Err(e) => {
                tracing::error!(
                    submitter = self.inner.name(),
                    session_id = %lead.session_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    transient = e.kind.is_transient(),
                    "Lead submission failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Pick the submitter for the given endpoint configuration
pub fn build_submitter(
    endpoint: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn LeadSubmitter>, SubmitError> {
    let inner: Arc<dyn LeadSubmitter> = match endpoint {
        Some(url) => Arc::new(HttpLeadSubmitter::new(url, timeout)?),
        None => Arc::new(LogOnlySubmitter),
    };
    Ok(Arc::new(LoggingSubmitter::new(inner)))
}
