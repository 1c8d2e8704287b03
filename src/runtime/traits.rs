//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::lead::SubmitError;
use crate::state_machine::LeadIntake;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Payload handed to the lead collaborator once a conversation completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSubmission {
    pub session_id: String,
    pub intake: LeadIntake,
    pub consultation_requested: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Destination for completed intake records
#[async_trait]
pub trait LeadSubmitter: Send + Sync {
    /// Deliver one lead. Called at most once per completed conversation.
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), SubmitError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: LeadSubmitter + ?Sized> LeadSubmitter for Arc<T> {
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), SubmitError> {
        (**self).submit(lead).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
