//! Effects produced by state transitions

use super::state::{BotLine, IntakeField};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Who wrote a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Bot,
    User,
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a message to the transcript
    AppendMessage {
        sender: Sender,
        text: String,
        choices: Option<Vec<String>>,
    },

    /// Store an answer in the intake record
    RecordIntake {
        field: IntakeField,
        value: Option<String>,
    },

    /// Start the typing delay for the pending reply
    ScheduleReply { delay: Duration },

    /// Drop any outstanding typing delay
    CancelReply,

    /// Abandon a lead submission still in flight; its result is discarded
    CancelSubmission,

    /// Empty the transcript and intake
    ClearConversation,

    /// Hand the completed intake to the lead collaborator
    SubmitLead { consultation_requested: bool },
}

impl Effect {
    pub fn user_message(text: impl Into<String>) -> Self {
        Effect::AppendMessage {
            sender: Sender::User,
            text: text.into(),
            choices: None,
        }
    }

    pub fn bot_message(text: impl Into<String>) -> Self {
        Effect::AppendMessage {
            sender: Sender::Bot,
            text: text.into(),
            choices: None,
        }
    }

    pub fn bot_line(line: BotLine) -> Self {
        Effect::AppendMessage {
            sender: Sender::Bot,
            text: line.text,
            choices: line.choices,
        }
    }

    pub fn record(field: IntakeField, value: impl Into<String>) -> Self {
        Effect::RecordIntake {
            field,
            value: Some(value.into()),
        }
    }
}
