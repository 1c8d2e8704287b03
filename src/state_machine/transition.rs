//! Pure state transition function
//!
//! Given the same state, context and event this always yields the same new
//! state and effects. Timers, transcript storage and lead submission are
//! left to whoever executes the effects.

use super::script::{self, OTHER};
use super::state::{BotLine, IntakeField, InputMode, PendingReply, Stage, Submission};
use super::{ChatState, DialogueContext, Effect, Event};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Reasons an event is ignored. State is never changed when one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Bot is still typing, input ignored")]
    Busy,
    #[error("Blank input ignored")]
    BlankInput,
    #[error("Conversation already started")]
    AlreadyStarted,
    #[error("Option not offered by the current prompt: {0}")]
    UnknownOption(String),
    #[error("No country prompt is open")]
    NoCountryPrompt,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
#[allow(clippy::too_many_lines)]
pub fn transition(
    state: &ChatState,
    context: &DialogueContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    // Typed text is trimmed once, so every echo matches what gets stored
    let event = match event {
        Event::UserText { text } => Event::UserText {
            text: text.trim().to_string(),
        },
        other => other,
    };

    match (&state.stage, event) {
        // ============================================================
        // Lifecycle
        // ============================================================

        // Reset is accepted from anywhere, including mid-reply
        (_, Event::Reset) => Ok(TransitionResult::new(ChatState::default())
            .with_effect(Effect::CancelReply)
            .with_effect(Effect::CancelSubmission)
            .with_effect(Effect::ClearConversation)),

        (_, Event::ReplyDue) => deliver_next_beat(state, context),

        // ============================================================
        // Lead submission results
        // ============================================================
        (
            Stage::Complete {
                booked,
                submission: Submission::InFlight,
            },
            Event::SubmissionSucceeded,
        ) => Ok(TransitionResult::new(ChatState {
            stage: Stage::Complete {
                booked: *booked,
                submission: Submission::Delivered,
            },
            ..state.clone()
        })),

        (
            Stage::Complete {
                booked,
                submission: Submission::InFlight,
            },
            Event::SubmissionFailed { message },
        ) => Ok(TransitionResult::new(ChatState {
            stage: Stage::Complete {
                booked: *booked,
                submission: Submission::Failed { message },
            },
            ..state.clone()
        })
        .with_effect(Effect::bot_message(script::submission_failed(
            &context.contact,
        )))),

        (_, event @ (Event::SubmissionSucceeded | Event::SubmissionFailed { .. })) => {
            Err(TransitionError::InvalidTransition(format!(
                "No submission in flight for {event:?}"
            )))
        }

        // ============================================================
        // User actions are refused while the bot is typing
        // ============================================================
        _ if state.is_typing() => Err(TransitionError::Busy),

        // ============================================================
        // Greeting gate
        // ============================================================
        (Stage::Greeting, Event::Start) => Ok(begin(context)),

        (_, Event::Start) => Err(TransitionError::AlreadyStarted),

        (_, Event::UserText { text }) if text.is_empty() => Err(TransitionError::BlankInput),

        // A typed greeting opens the conversation without a user bubble
        (Stage::Greeting, Event::UserText { text }) if script::is_greeting(&text) => {
            Ok(begin(context))
        }

        (Stage::Greeting, Event::UserText { text }) => {
            Ok(deflect(state, context, text, script::SAY_HI))
        }

        // ============================================================
        // Free text
        // ============================================================
        (_, Event::UserText { text }) if state.input == InputMode::Text => {
            match advance(state, context, &text) {
                Some(result) => Ok(result),
                None => Ok(deflect(state, context, text, script::NOT_UNDERSTOOD)),
            }
        }

        (_, Event::UserText { text }) => Ok(deflect(state, context, text, script::NOT_UNDERSTOOD)),

        // ============================================================
        // Option selection
        // ============================================================
        (Stage::DestinationCountry, Event::OptionSelected { option }) => Err(
            TransitionError::InvalidTransition(format!("{option:?} must be chosen as a country")),
        ),

        (_, Event::OptionSelected { option }) if !state.input.offers(&option) => {
            Err(TransitionError::UnknownOption(option))
        }

        (_, Event::OptionSelected { option }) if option == OTHER => Ok(switch_to_text(state)),

        (Stage::DestinationQuestion, Event::OptionSelected { option }) => {
            Ok(answer_destination_question(state, context, option))
        }

        (Stage::BookingOffer, Event::OptionSelected { option }) => {
            Ok(answer_booking_offer(state, context, option))
        }

        (stage, Event::OptionSelected { option }) => {
            advance(state, context, &option).ok_or_else(|| {
                TransitionError::InvalidTransition(format!(
                    "Option {option:?} has no meaning at {stage:?}"
                ))
            })
        }

        // ============================================================
        // Country sub-prompt
        // ============================================================
        (Stage::DestinationCountry, Event::CountrySelected { country })
            if !state.input.offers(&country) =>
        {
            Err(TransitionError::UnknownOption(country))
        }

        (Stage::DestinationCountry, Event::CountrySelected { country }) if country == OTHER => {
            Ok(switch_to_text(state))
        }

        (Stage::DestinationCountry, Event::CountrySelected { country }) => {
            advance(state, context, &country).ok_or_else(|| {
                TransitionError::InvalidTransition("Country prompt did not advance".to_string())
            })
        }

        (_, Event::CountrySelected { .. }) => Err(TransitionError::NoCountryPrompt),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Greeting accepted: the first question is asked without a typing delay
fn begin(context: &DialogueContext) -> TransitionResult {
    let state = ChatState {
        stage: Stage::Name,
        prompt: Some(context.greeting_prompt.clone()),
        input: InputMode::Text,
        reply: None,
    };
    TransitionResult::new(state).with_effect(Effect::bot_message(context.greeting_prompt.clone()))
}

/// Echo the input and reply with a fixed line, leaving stage and intake alone
fn deflect(
    state: &ChatState,
    context: &DialogueContext,
    text: String,
    line: &str,
) -> TransitionResult {
    let reply = PendingReply {
        beats: vec![vec![BotLine::say(line)]],
        prompt: state.prompt.clone(),
        input: state.input.clone(),
    };
    typing(state, state.stage.clone(), reply, context).with_effects_before(vec![
        Effect::user_message(text),
    ])
}

/// "Other" keeps the step and swaps the choice set for text entry
fn switch_to_text(state: &ChatState) -> TransitionResult {
    TransitionResult::new(ChatState {
        input: InputMode::Text,
        ..state.clone()
    })
}

/// Store `value` for the current stage and move to the next question.
///
/// Returns `None` for stages that don't collect a value this way.
fn advance(state: &ChatState, context: &DialogueContext, value: &str) -> Option<TransitionResult> {
    let field = state.stage.field()?;
    let (next, beats, input) = match &state.stage {
        Stage::Name => (
            Stage::Location,
            vec![vec![BotLine::say(script::ask_location(value))]],
            InputMode::Text,
        ),
        Stage::Location => (
            Stage::StudyLevel,
            vec![vec![BotLine::ask(script::ASK_STUDY_LEVEL, script::STUDY_LEVELS)]],
            InputMode::choices(script::STUDY_LEVELS),
        ),
        Stage::StudyLevel => (
            Stage::DestinationQuestion,
            vec![vec![BotLine::ask(
                script::ASK_DESTINATION,
                script::DESTINATION_ANSWERS,
            )]],
            InputMode::choices(script::DESTINATION_ANSWERS),
        ),
        Stage::DestinationCountry => (
            Stage::Subject,
            vec![vec![BotLine::say(script::ASK_SUBJECT)]],
            InputMode::Text,
        ),
        Stage::Subject => (
            Stage::LanguageScore,
            vec![vec![BotLine::ask(
                script::ASK_LANGUAGE_SCORE,
                script::LANGUAGE_SCORES,
            )]],
            InputMode::choices(script::LANGUAGE_SCORES),
        ),
        Stage::LanguageScore => (
            Stage::StartDate,
            vec![vec![BotLine::ask(
                script::ASK_START_DATE,
                script::START_TIMEFRAMES,
            )]],
            InputMode::choices(script::START_TIMEFRAMES),
        ),
        // Thank-you first, booking offer after a second delay
        Stage::StartDate => (
            Stage::BookingOffer,
            vec![
                vec![BotLine::say(script::THANK_YOU)],
                vec![BotLine::ask(script::OFFER_BOOKING, script::BOOKING_ANSWERS)],
            ],
            InputMode::choices(script::BOOKING_ANSWERS),
        ),
        Stage::Greeting
        | Stage::DestinationQuestion
        | Stage::BookingOffer
        | Stage::Complete { .. } => return None,
    };

    let reply = PendingReply {
        prompt: last_line(&beats),
        beats,
        input,
    };
    Some(
        typing(state, next, reply, context).with_effects_before(vec![
            Effect::user_message(value),
            Effect::record(field, value),
        ]),
    )
}

fn answer_destination_question(
    state: &ChatState,
    context: &DialogueContext,
    option: String,
) -> TransitionResult {
    if option == script::YES {
        let beats = vec![vec![BotLine::ask(script::ASK_COUNTRY, script::COUNTRIES)]];
        let reply = PendingReply {
            prompt: last_line(&beats),
            beats,
            input: InputMode::choices(script::COUNTRIES),
        };
        return typing(state, Stage::DestinationCountry, reply, context)
            .with_effects_before(vec![Effect::user_message(option)]);
    }

    let beats = vec![vec![
        BotLine::say(script::SUGGEST_DESTINATIONS),
        BotLine::say(script::ASK_SUBJECT),
    ]];
    let reply = PendingReply {
        prompt: last_line(&beats),
        beats,
        input: InputMode::Text,
    };
    typing(state, Stage::Subject, reply, context).with_effects_before(vec![
        Effect::user_message(option),
        Effect::RecordIntake {
            field: IntakeField::DestinationCountry,
            value: None,
        },
    ])
}

fn answer_booking_offer(
    state: &ChatState,
    context: &DialogueContext,
    option: String,
) -> TransitionResult {
    let booked = option == script::BOOK_NOW;
    let lines = if booked {
        vec![
            BotLine::say(script::BOOKING_CONFIRMED),
            BotLine::say(script::reach_us_directly(&context.contact)),
        ]
    } else {
        vec![BotLine::say(script::BOOKING_DECLINED)]
    };
    let reply = PendingReply {
        beats: vec![lines],
        prompt: None,
        input: InputMode::Closed,
    };
    let next = Stage::Complete {
        booked,
        submission: Submission::NotSent,
    };
    typing(state, next, reply, context).with_effects_before(vec![Effect::user_message(option)])
}

/// Deliver one beat of the pending reply; the last beat re-enables input
fn deliver_next_beat(
    state: &ChatState,
    context: &DialogueContext,
) -> Result<TransitionResult, TransitionError> {
    let Some(reply) = &state.reply else {
        return Err(TransitionError::InvalidTransition(
            "No reply is pending".to_string(),
        ));
    };
    let Some((beat, remaining)) = reply.beats.split_first() else {
        return Err(TransitionError::InvalidTransition(
            "Pending reply has no beats".to_string(),
        ));
    };

    let mut new_state = state.clone();
    let mut effects: Vec<Effect> = beat.iter().cloned().map(Effect::bot_line).collect();

    if remaining.is_empty() {
        new_state.reply = None;
        new_state.prompt.clone_from(&reply.prompt);
        new_state.input = reply.input.clone();

        if let Stage::Complete {
            booked,
            submission: Submission::NotSent,
        } = new_state.stage
        {
            new_state.stage = Stage::Complete {
                booked,
                submission: Submission::InFlight,
            };
            effects.push(Effect::SubmitLead {
                consultation_requested: booked,
            });
        }
    } else {
        new_state.reply = Some(PendingReply {
            beats: remaining.to_vec(),
            ..reply.clone()
        });
        effects.push(Effect::ScheduleReply {
            delay: context.reply_delay,
        });
    }

    Ok(TransitionResult::new(new_state).with_effects(effects))
}

/// Move to `next` with the bot typing `reply`
fn typing(
    state: &ChatState,
    next: Stage,
    reply: PendingReply,
    context: &DialogueContext,
) -> TransitionResult {
    TransitionResult::new(ChatState {
        stage: next,
        prompt: state.prompt.clone(),
        input: state.input.clone(),
        reply: Some(reply),
    })
    .with_effect(Effect::ScheduleReply {
        delay: context.reply_delay,
    })
}

fn last_line(beats: &[Vec<BotLine>]) -> Option<String> {
    beats.last().and_then(|b| b.last()).map(|l| l.text.clone())
}

impl TransitionResult {
    /// Effects that must run before the ones already queued (user echo, intake)
    fn with_effects_before(mut self, mut effects: Vec<Effect>) -> Self {
        effects.append(&mut self.effects);
        self.effects = effects;
        self
    }
}
