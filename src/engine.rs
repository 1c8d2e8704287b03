//! Dialogue engine: one conversation, its transcript and intake
//!
//! The engine runs events through the pure state machine, applies the
//! effects that only touch the conversation itself, and hands the rest
//! (timers, lead submission) back to whoever drives it.

use crate::state_machine::state::IntakeField;
use crate::state_machine::{
    transition, ChatState, DialogueContext, Effect, Event, LeadIntake, Sender, Stage, Submission,
    TransitionError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transcript entry. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// 1-based position in the transcript
    pub sequence_id: u64,
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_set: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// Everything known about one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Conversation {
    pub state: ChatState,
    pub transcript: Vec<Message>,
    pub intake: LeadIntake,
}

impl Conversation {
    pub fn step(&self) -> u8 {
        self.state.stage.step()
    }

    fn append(&mut self, sender: Sender, text: String, choice_set: Option<Vec<String>>) -> Message {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            sequence_id: self.transcript.last().map_or(1, |m| m.sequence_id + 1),
            sender,
            text,
            choice_set,
            created_at: Utc::now(),
        };
        self.transcript.push(message.clone());
        message
    }
}

/// Question on screen together with its choice set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPrompt {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice_set: Option<Vec<String>>,
}

/// Read-only view handed to renderers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub step: u8,
    pub stage: Stage,
    pub transcript: Vec<Message>,
    pub intake: LeadIntake,
    pub pending_prompt: Option<PendingPrompt>,
    pub awaiting_text_input: bool,
    pub bot_typing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<Submission>,
}

impl From<&Conversation> for ConversationSnapshot {
    fn from(conv: &Conversation) -> Self {
        let state = &conv.state;
        let pending_prompt = if state.is_typing() {
            None
        } else {
            state.prompt.as_ref().map(|text| PendingPrompt {
                text: text.clone(),
                choice_set: state.visible_choices().map(<[String]>::to_vec),
            })
        };
        let submission = match &state.stage {
            Stage::Complete { submission, .. } => Some(submission.clone()),
            _ => None,
        };
        Self {
            step: state.stage.step(),
            stage: state.stage.clone(),
            transcript: conv.transcript.clone(),
            intake: conv.intake.clone(),
            pending_prompt,
            awaiting_text_input: state.awaiting_text_input(),
            bot_typing: state.is_typing(),
            submission,
        }
    }
}

/// What a dispatched event produced
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Messages appended to the transcript, in order
    pub appended: Vec<Message>,
    /// Effects the driver must carry out (timers, submission)
    pub effects: Vec<Effect>,
    /// Typing indicator before and after the event
    pub was_typing: bool,
    pub now_typing: bool,
}

/// Owner of a single in-memory conversation
pub struct DialogueEngine {
    context: DialogueContext,
    conversation: Conversation,
}

impl DialogueEngine {
    pub fn new(context: DialogueContext) -> Self {
        Self {
            context,
            conversation: Conversation::default(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot::from(&self.conversation)
    }

    pub fn step(&self) -> u8 {
        self.conversation.step()
    }

    /// Run one event through the state machine.
    ///
    /// On error nothing about the conversation has changed.
    pub fn dispatch(&mut self, event: Event) -> Result<Dispatch, TransitionError> {
        let step_before = self.conversation.step();
        let result = match transition(&self.conversation.state, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(step = step_before, error = %e, "Event ignored");
                return Err(e);
            }
        };

        let was_typing = self.conversation.state.is_typing();
        self.conversation.state = result.new_state;

        let mut dispatch = Dispatch {
            was_typing,
            now_typing: self.conversation.state.is_typing(),
            ..Dispatch::default()
        };

        for effect in result.effects {
            match effect {
                Effect::AppendMessage {
                    sender,
                    text,
                    choices,
                } => {
                    let message = self.conversation.append(sender, text, choices);
                    dispatch.appended.push(message);
                }
                Effect::RecordIntake { field, value } => {
                    self.record(field, value);
                }
                Effect::ClearConversation => {
                    self.conversation.transcript.clear();
                    self.conversation.intake = LeadIntake::default();
                }
                other => dispatch.effects.push(other),
            }
        }

        if self.conversation.step() != step_before {
            tracing::debug!(
                from = step_before,
                to = self.conversation.step(),
                "Dialogue step changed"
            );
            if self.conversation.state.stage.is_complete() {
                tracing::info!(
                    intake_complete = self.conversation.intake.is_complete(),
                    "Intake conversation finished"
                );
            }
        }

        Ok(dispatch)
    }

    fn record(&mut self, field: IntakeField, value: Option<String>) {
        tracing::debug!(?field, "Intake field recorded");
        self.conversation.intake.record(field, value);
    }

    pub fn start(&mut self) -> Result<Dispatch, TransitionError> {
        self.dispatch(Event::Start)
    }

    pub fn submit_text(&mut self, text: impl Into<String>) -> Result<Dispatch, TransitionError> {
        self.dispatch(Event::UserText { text: text.into() })
    }

    pub fn select_option(&mut self, option: impl Into<String>) -> Result<Dispatch, TransitionError> {
        self.dispatch(Event::OptionSelected {
            option: option.into(),
        })
    }

    pub fn select_country(
        &mut self,
        country: impl Into<String>,
    ) -> Result<Dispatch, TransitionError> {
        self.dispatch(Event::CountrySelected {
            country: country.into(),
        })
    }

    pub fn reset(&mut self) -> Result<Dispatch, TransitionError> {
        self.dispatch(Event::Reset)
    }

    /// Deliver the next beat of a pending reply (the typing delay elapsed)
    pub fn deliver_reply(&mut self) -> Result<Dispatch, TransitionError> {
        self.dispatch(Event::ReplyDue)
    }

    /// Deliver every pending beat without waiting; returns the outbound
    /// effects that were produced along the way
    #[cfg(test)]
    pub fn settle(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        while self.conversation.state.is_typing() {
            match self.deliver_reply() {
                Ok(d) => effects.extend(
                    d.effects
                        .into_iter()
                        .filter(|e| !matches!(e, Effect::ScheduleReply { .. })),
                ),
                Err(_) => break,
            }
        }
        effects
    }
}
