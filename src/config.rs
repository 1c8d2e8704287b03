//! Environment configuration
//!
//! Everything is optional; unset variables fall back to defaults, and
//! variables that are set but unparseable are an error.

use crate::state_machine::state::{ContactInfo, DEFAULT_REPLY_DELAY};
use crate::state_machine::DialogueContext;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub port: u16,
    pub reply_delay: Duration,
    pub greeting_prompt: Option<String>,
    pub contact: ContactInfo,
    pub lead_submission_url: Option<String>,
    pub lead_submission_timeout: Duration,
    /// Sessions with no activity and no open stream for this long are closed
    pub session_idle_ttl: Duration,
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("GURU_CHAT_PORT") {
            Some(v) => parse(&v, "GURU_CHAT_PORT", "a port number")?,
            None => DEFAULT_PORT,
        };

        let reply_delay = match lookup("GURU_CHAT_REPLY_DELAY_MS") {
            Some(v) => Duration::from_millis(parse(
                &v,
                "GURU_CHAT_REPLY_DELAY_MS",
                "a delay in milliseconds",
            )?),
            None => DEFAULT_REPLY_DELAY,
        };

        let lead_submission_timeout = match lookup("LEAD_SUBMISSION_TIMEOUT_SECS") {
            Some(v) => positive_secs(&v, "LEAD_SUBMISSION_TIMEOUT_SECS")?,
            None => DEFAULT_SUBMISSION_TIMEOUT,
        };

        let session_idle_ttl = match lookup("GURU_CHAT_SESSION_IDLE_SECS") {
            Some(v) => positive_secs(&v, "GURU_CHAT_SESSION_IDLE_SECS")?,
            None => DEFAULT_SESSION_IDLE_TTL,
        };

        let greeting_prompt = non_empty(&lookup, "GURU_CHAT_GREETING")?;
        let lead_submission_url = non_empty(&lookup, "LEAD_SUBMISSION_URL")?;

        let defaults = ContactInfo::default();
        let contact = ContactInfo {
            email: non_empty(&lookup, "CONTACT_EMAIL")?.unwrap_or(defaults.email),
            phone: non_empty(&lookup, "CONTACT_PHONE")?.unwrap_or(defaults.phone),
            whatsapp_number: non_empty(&lookup, "WHATSAPP_NUMBER")?
                .unwrap_or(defaults.whatsapp_number),
            page_url: non_empty(&lookup, "CONTACT_PAGE_URL")?.unwrap_or(defaults.page_url),
        };

        Ok(Self {
            port,
            reply_delay,
            greeting_prompt,
            contact,
            lead_submission_url,
            lead_submission_timeout,
            session_idle_ttl,
        })
    }

    /// Context shared by every conversation this server runs
    pub fn dialogue_context(&self) -> DialogueContext {
        let context = DialogueContext::new(self.reply_delay).with_contact(self.contact.clone());
        match &self.greeting_prompt {
            Some(prompt) => context.with_greeting_prompt(prompt.clone()),
            None => context,
        }
    }
}

fn parse<T: std::str::FromStr>(
    value: &str,
    var: &'static str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        expected,
        value: value.to_string(),
    })
}

fn positive_secs(value: &str, var: &'static str) -> Result<Duration, ConfigError> {
    const EXPECTED: &str = "a positive number of seconds";
    match parse::<u64>(value, var, EXPECTED)? {
        0 => Err(ConfigError::Invalid {
            var,
            expected: EXPECTED,
            value: value.to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Set-but-blank counts as a configuration error
fn non_empty(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<String>, ConfigError> {
    match lookup(var) {
        Some(v) if v.trim().is_empty() => Err(ConfigError::Empty(var)),
        Some(v) => Ok(Some(v.trim().to_string())),
        None => Ok(None),
    }
}
