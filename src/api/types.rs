//! API request and response types

use crate::engine::ConversationSnapshot;
use serde::{Deserialize, Serialize};

/// Free-text entry
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// Choice button pressed
#[derive(Debug, Deserialize)]
pub struct OptionRequest {
    pub option: String,
}

/// Country picked from the destination sub-prompt
#[derive(Debug, Deserialize)]
pub struct CountryRequest {
    pub country: String,
}

/// Response for a newly created chat session
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub snapshot: ConversationSnapshot,
}

/// Response for user actions; the outcome arrives over the stream
#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
