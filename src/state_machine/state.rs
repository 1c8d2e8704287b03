//! Dialogue state types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::script;

// ============================================================================
// Stage - where the conversation is in the scripted question table
// ============================================================================

/// Outcome of handing the completed intake to the lead collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Submission {
    /// Farewell still being typed; nothing sent yet
    #[default]
    NotSent,
    InFlight,
    Delivered,
    Failed { message: String },
}

/// Position in the scripted flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for the user to say hi
    #[default]
    Greeting,
    Name,
    Location,
    StudyLevel,
    /// "Do you have a country in mind?" (Yes/No)
    DestinationQuestion,
    /// Country sub-prompt opened by answering Yes
    DestinationCountry,
    Subject,
    LanguageScore,
    StartDate,
    /// Confirmation plus booking call-to-action
    BookingOffer,
    Complete {
        booked: bool,
        #[serde(default)]
        submission: Submission,
    },
}

impl Stage {
    /// Numeric step as shown to renderers (0 idle .. 9 complete)
    pub fn step(&self) -> u8 {
        match self {
            Stage::Greeting => 0,
            Stage::Name => 1,
            Stage::Location => 2,
            Stage::StudyLevel => 3,
            Stage::DestinationQuestion | Stage::DestinationCountry => 4,
            Stage::Subject => 5,
            Stage::LanguageScore => 6,
            Stage::StartDate => 7,
            Stage::BookingOffer => 8,
            Stage::Complete { .. } => 9,
        }
    }

    /// Intake field this stage collects, if any
    pub fn field(&self) -> Option<IntakeField> {
        match self {
            Stage::Name => Some(IntakeField::Name),
            Stage::Location => Some(IntakeField::Location),
            Stage::StudyLevel => Some(IntakeField::StudyLevel),
            Stage::DestinationQuestion | Stage::DestinationCountry => {
                Some(IntakeField::DestinationCountry)
            }
            Stage::Subject => Some(IntakeField::Subject),
            Stage::LanguageScore => Some(IntakeField::LanguageScore),
            Stage::StartDate => Some(IntakeField::StartDate),
            Stage::Greeting | Stage::BookingOffer | Stage::Complete { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Stage::Complete { .. })
    }
}

// ============================================================================
// Input modes and the pending "typing" reply
// ============================================================================

/// What the user is allowed to answer with once the bot has finished typing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    Text,
    Choices {
        options: Vec<String>,
    },
    /// Conversation finished; only reset is meaningful
    Closed,
}

impl InputMode {
    pub fn choices(options: &[&str]) -> Self {
        InputMode::Choices {
            options: script::owned(options),
        }
    }

    pub fn offers(&self, option: &str) -> bool {
        match self {
            InputMode::Choices { options } => options.iter().any(|o| o == option),
            InputMode::Text | InputMode::Closed => false,
        }
    }
}

/// One bot bubble
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotLine {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

impl BotLine {
    pub fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: None,
        }
    }

    pub fn ask(text: impl Into<String>, options: &[&str]) -> Self {
        Self {
            text: text.into(),
            choices: Some(script::owned(options)),
        }
    }
}

/// Bot reply waiting out the typing delay.
///
/// Each beat is delivered after its own delay; once the last beat lands
/// `prompt` and `input` become the visible prompt and input mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReply {
    pub beats: Vec<Vec<BotLine>>,
    pub prompt: Option<String>,
    pub input: InputMode,
}

// ============================================================================
// Dialogue state
// ============================================================================

/// State of one conversation, minus its transcript and intake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChatState {
    pub stage: Stage,
    /// Question currently on screen
    pub prompt: Option<String>,
    pub input: InputMode,
    /// Set while the bot is "typing"; no input is accepted meanwhile
    pub reply: Option<PendingReply>,
}

impl ChatState {
    pub fn is_typing(&self) -> bool {
        self.reply.is_some()
    }

    pub fn awaiting_text_input(&self) -> bool {
        !self.is_typing() && self.input == InputMode::Text
    }

    /// Choice set currently offered to the user (hidden while typing)
    pub fn visible_choices(&self) -> Option<&[String]> {
        match (&self.reply, &self.input) {
            (None, InputMode::Choices { options }) => Some(options),
            _ => None,
        }
    }
}

// ============================================================================
// Intake record
// ============================================================================

/// Field of the intake record collected by a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntakeField {
    Name,
    Location,
    StudyLevel,
    DestinationCountry,
    Subject,
    LanguageScore,
    StartDate,
}

/// Structured lead collected over the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LeadIntake {
    pub name: String,
    pub location: String,
    pub study_level: String,
    pub destination_country: Option<String>,
    pub subject: String,
    pub language_score: String,
    pub start_date: String,
}

impl LeadIntake {
    pub fn record(&mut self, field: IntakeField, value: Option<String>) {
        let value_or_empty = || value.clone().unwrap_or_default();
        match field {
            IntakeField::Name => self.name = value_or_empty(),
            IntakeField::Location => self.location = value_or_empty(),
            IntakeField::StudyLevel => self.study_level = value_or_empty(),
            IntakeField::DestinationCountry => self.destination_country = value.clone(),
            IntakeField::Subject => self.subject = value_or_empty(),
            IntakeField::LanguageScore => self.language_score = value_or_empty(),
            IntakeField::StartDate => self.start_date = value_or_empty(),
        }
    }

    /// Every mandatory field filled (destination country may stay empty)
    pub fn is_complete(&self) -> bool {
        [
            &self.name,
            &self.location,
            &self.study_level,
            &self.subject,
            &self.language_score,
            &self.start_date,
        ]
        .iter()
        .all(|v| !v.is_empty())
    }
}

// ============================================================================
// Context
// ============================================================================

/// Contact details shown when the user books a consultation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
    pub whatsapp_number: String,
    pub page_url: String,
}

impl Default for ContactInfo {
    fn default() -> Self {
        Self {
            email: "support@studyguruindia.com".to_string(),
            phone: "+91 99999-99999".to_string(),
            whatsapp_number: "919999999999".to_string(),
            page_url: "/contact".to_string(),
        }
    }
}

/// Immutable per-conversation configuration
#[derive(Debug, Clone)]
pub struct DialogueContext {
    /// Delay between a user action and each bot reply beat
    pub reply_delay: Duration,
    /// First question, asked once the user has greeted the bot
    pub greeting_prompt: String,
    pub contact: ContactInfo,
}

/// Default typing delay when none is configured
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1000);

impl DialogueContext {
    pub fn new(reply_delay: Duration) -> Self {
        Self {
            reply_delay,
            greeting_prompt: script::DEFAULT_GREETING_PROMPT.to_string(),
            contact: ContactInfo::default(),
        }
    }

    pub fn with_greeting_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.greeting_prompt = prompt.into();
        self
    }

    pub fn with_contact(mut self, contact: ContactInfo) -> Self {
        self.contact = contact;
        self
    }
}

impl Default for DialogueContext {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_DELAY)
    }
}
