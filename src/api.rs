//! HTTP API for the chat widget
//!
//! Each widget instance gets a session; actions are posted as JSON and
//! everything the bot says comes back over the SSE stream.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::{LeadSubmitter, RuntimeManager};
use crate::state_machine::DialogueContext;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeManager>,
}

impl AppState {
    pub fn new(context: DialogueContext, lead_submitter: Arc<dyn LeadSubmitter>) -> Self {
        Self {
            runtime: Arc::new(RuntimeManager::new(context, lead_submitter)),
        }
    }
}
