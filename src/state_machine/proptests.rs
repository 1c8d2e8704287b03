//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::script::{self, OTHER};
use super::*;
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> DialogueContext {
    DialogueContext::new(Duration::from_millis(250))
}

/// Apply events in order, skipping the ones the machine refuses
fn drive(events: impl IntoIterator<Item = Event>) -> ChatState {
    let ctx = test_context();
    let mut state = ChatState::default();
    for event in events {
        if let Ok(result) = transition(&state, &ctx, event) {
            state = result.new_state;
        }
    }
    state
}

/// Every option label the widget can show, plus a few it never shows
fn all_labels() -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = Vec::new();
    labels.extend_from_slice(script::STUDY_LEVELS);
    labels.extend_from_slice(script::COUNTRIES);
    labels.extend_from_slice(script::LANGUAGE_SCORES);
    labels.extend_from_slice(script::START_TIMEFRAMES);
    labels.extend_from_slice(script::DESTINATION_ANSWERS);
    labels.extend_from_slice(script::BOOKING_ANSWERS);
    labels.extend_from_slice(&["Atlantis", "Maybe", ""]);
    labels
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_label() -> impl Strategy<Value = String> {
    proptest::sample::select(all_labels()).prop_map(String::from)
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("hi".to_string()),
        Just("Hello".to_string()),
        Just("   ".to_string()),
        "[A-Za-z ]{1,20}",
    ]
}

fn arb_user_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Start),
        arb_text().prop_map(|text| Event::UserText { text }),
        arb_label().prop_map(|option| Event::OptionSelected { option }),
        arb_label().prop_map(|country| Event::CountrySelected { country }),
    ]
}

/// Any event except reset; timer ticks are weighted up so replies land
fn arb_forward_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        4 => arb_user_event(),
        4 => Just(Event::ReplyDue),
        1 => Just(Event::SubmissionSucceeded),
        1 => "[a-z ]{1,20}".prop_map(|message| Event::SubmissionFailed { message }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        12 => arb_forward_event(),
        1 => Just(Event::Reset),
    ]
}

/// Choices that move the flow forward (everything but "Other")
fn arb_answer(options: &'static [&'static str]) -> impl Strategy<Value = String> {
    proptest::sample::select(
        options
            .iter()
            .copied()
            .filter(|o| *o != OTHER)
            .collect::<Vec<_>>(),
    )
    .prop_map(String::from)
}

/// The whole intake flow with random answers, typing delays included
fn arb_happy_path() -> impl Strategy<Value = Vec<Event>> {
    (
        arb_answer(script::STUDY_LEVELS),
        arb_answer(script::DESTINATION_ANSWERS),
        arb_answer(script::COUNTRIES),
        arb_answer(script::LANGUAGE_SCORES),
        arb_answer(script::START_TIMEFRAMES),
        arb_answer(script::BOOKING_ANSWERS),
    )
        .prop_map(|(level, destination, country, score, start, booking)| {
            let mut events = vec![
                Event::Start,
                Event::UserText { text: "Aria".to_string() },
                Event::ReplyDue,
                Event::UserText { text: "Pune".to_string() },
                Event::ReplyDue,
                Event::OptionSelected { option: level },
                Event::ReplyDue,
            ];
            let yes = destination == script::YES;
            events.push(Event::OptionSelected { option: destination });
            events.push(Event::ReplyDue);
            if yes {
                events.push(Event::CountrySelected { country });
                events.push(Event::ReplyDue);
            }
            events.extend([
                Event::UserText { text: "Physics".to_string() },
                Event::ReplyDue,
                Event::OptionSelected { option: score },
                Event::ReplyDue,
                Event::OptionSelected { option: start },
                Event::ReplyDue,
                Event::ReplyDue,
                Event::OptionSelected { option: booking },
                Event::ReplyDue,
            ]);
            events
        })
}

/// Some prefix of the flow followed by a little noise
fn arb_reachable_state() -> impl Strategy<Value = ChatState> {
    (
        arb_happy_path(),
        any::<prop::sample::Index>(),
        proptest::collection::vec(arb_forward_event(), 0..6),
    )
        .prop_map(|(path, cut, noise)| {
            let cut = cut.index(path.len() + 1);
            drive(path.into_iter().take(cut).chain(noise))
        })
}

/// A reachable state with any pending reply fully delivered
fn arb_settled_state() -> impl Strategy<Value = ChatState> {
    arb_reachable_state().prop_map(|state| {
        let ctx = test_context();
        let mut state = state;
        while state.is_typing() {
            match transition(&state, &ctx, Event::ReplyDue) {
                Ok(result) => state = result.new_state,
                Err(_) => break,
            }
        }
        state
    })
}

fn submits_lead(effects: &[Effect]) -> bool {
    effects
        .iter()
        .any(|e| matches!(e, Effect::SubmitLead { .. }))
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // The step never goes backwards until a reset
    #[test]
    fn prop_step_monotonic_until_reset(events in proptest::collection::vec(arb_event(), 0..60)) {
        let ctx = test_context();
        let mut state = ChatState::default();

        for event in events {
            let is_reset = event == Event::Reset;
            if let Ok(result) = transition(&state, &ctx, event) {
                if !is_reset {
                    prop_assert!(
                        result.new_state.stage.step() >= state.stage.step(),
                        "Step went from {} to {}",
                        state.stage.step(),
                        result.new_state.stage.step()
                    );
                }
                state = result.new_state;
            }
        }
    }

    // Text entry and a choice set are never offered together
    #[test]
    fn prop_text_and_choices_exclusive(state in arb_reachable_state()) {
        prop_assert!(!(state.awaiting_text_input() && state.visible_choices().is_some()));
        if state.is_typing() {
            prop_assert!(!state.awaiting_text_input());
            prop_assert!(state.visible_choices().is_none());
        }
    }

    // Reset always lands on the initial state and clears everything
    #[test]
    fn prop_reset_returns_initial_state(state in arb_reachable_state()) {
        let result = transition(&state, &test_context(), Event::Reset).unwrap();
        prop_assert_eq!(&result.new_state, &ChatState::default());
        prop_assert_eq!(
            result.effects,
            vec![
                Effect::CancelReply,
                Effect::CancelSubmission,
                Effect::ClearConversation
            ]
        );
    }

    // No user action is accepted while the bot is typing
    #[test]
    fn prop_busy_while_typing(state in arb_reachable_state(), event in arb_user_event()) {
        if !state.is_typing() {
            return Ok(());
        }
        let result = transition(&state, &test_context(), event);
        prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
    }

    // An option that isn't on screen is refused
    #[test]
    fn prop_unoffered_option_refused(state in arb_settled_state(), option in arb_label()) {
        if state.stage == Stage::DestinationCountry || state.input.offers(&option) {
            return Ok(());
        }
        let result = transition(&state, &test_context(), Event::OptionSelected { option: option.clone() });
        prop_assert_eq!(result.unwrap_err(), TransitionError::UnknownOption(option));
    }

    // "Other" keeps the step and switches to free text
    #[test]
    fn prop_other_switches_to_text(state in arb_settled_state()) {
        if !state.input.offers(OTHER) {
            return Ok(());
        }
        let event = if state.stage == Stage::DestinationCountry {
            Event::CountrySelected { country: OTHER.to_string() }
        } else {
            Event::OptionSelected { option: OTHER.to_string() }
        };

        let result = transition(&state, &test_context(), event).unwrap();
        prop_assert_eq!(result.new_state.stage.step(), state.stage.step());
        prop_assert!(result.new_state.awaiting_text_input());
        prop_assert_eq!(&result.new_state.prompt, &state.prompt);
        prop_assert!(result.effects.is_empty());
    }

    // A lead is submitted at most once per conversation
    #[test]
    fn prop_lead_submitted_at_most_once(events in proptest::collection::vec(arb_forward_event(), 0..80)) {
        let ctx = test_context();
        let mut state = ChatState::default();
        let mut submissions = 0;

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                if submits_lead(&result.effects) {
                    submissions += 1;
                }
                state = result.new_state;
            }
        }
        prop_assert!(submissions <= 1, "Lead submitted {} times", submissions);
    }

    // Same state and event always give the same outcome
    #[test]
    fn prop_transition_deterministic(state in arb_reachable_state(), event in arb_event()) {
        let ctx = test_context();
        let first = transition(&state, &ctx, event.clone());
        let second = transition(&state, &ctx, event);
        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.new_state, b.new_state);
                prop_assert_eq!(a.effects, b.effects);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a, b),
            (a, b) => prop_assert!(false, "Diverged: {:?} vs {:?}", a, b),
        }
    }

    // A reply is scheduled exactly when the bot starts or keeps typing
    #[test]
    fn prop_schedule_reply_iff_typing(
        state in arb_reachable_state(),
        event in prop_oneof![arb_user_event(), Just(Event::ReplyDue)]
    ) {
        if let Ok(result) = transition(&state, &test_context(), event) {
            let schedules = result
                .effects
                .iter()
                .any(|e| matches!(e, Effect::ScheduleReply { .. }));
            prop_assert_eq!(schedules, result.new_state.is_typing());
        }
    }

    // Blank text is refused everywhere outside a typing delay
    #[test]
    fn prop_blank_text_refused(state in arb_settled_state(), blank in "[ \t\n]{0,5}") {
        let result = transition(&state, &test_context(), Event::UserText { text: blank });
        prop_assert_eq!(result.unwrap_err(), TransitionError::BlankInput);
    }
}
