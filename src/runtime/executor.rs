//! Conversation runtime executor

use super::traits::{LeadSubmission, LeadSubmitter};
use super::SseEvent;

use crate::engine::{ConversationSnapshot, DialogueEngine, Dispatch};
use crate::lead::SubmitError;
use crate::state_machine::{Effect, Event, Sender};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Drives one conversation: feeds events to the engine, runs the typing
/// delays and hands finished intakes to the lead submitter
pub struct ConversationRuntime<L>
where
    L: LeadSubmitter + ?Sized + 'static,
{
    session_id: String,
    engine: DialogueEngine,
    lead_submitter: Arc<L>,
    event_rx: mpsc::Receiver<Event>,
    /// Fired reply timers, tagged with the ticket they were scheduled under
    timer_rx: mpsc::Receiver<u64>,
    timer_tx: mpsc::Sender<u64>,
    /// Lead submission outcomes, tagged the same way
    outcome_rx: mpsc::Receiver<(u64, Result<(), SubmitError>)>,
    outcome_tx: mpsc::Sender<(u64, Result<(), SubmitError>)>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
    /// Cancelled when the session is torn down
    shutdown: CancellationToken,
    /// Token for the outstanding typing delay, if any
    reply_token: Option<CancellationToken>,
    reply_ticket: u64,
    /// Token for the lead submission in flight, if any
    submit_token: Option<CancellationToken>,
    submit_ticket: u64,
}

impl<L> ConversationRuntime<L>
where
    L: LeadSubmitter + ?Sized + 'static,
{
    pub fn new(
        session_id: impl Into<String>,
        engine: DialogueEngine,
        lead_submitter: Arc<L>,
        event_rx: mpsc::Receiver<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        snapshot_tx: watch::Sender<ConversationSnapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::channel(8);
        let (outcome_tx, outcome_rx) = mpsc::channel(4);
        Self {
            session_id: session_id.into(),
            engine,
            lead_submitter,
            event_rx,
            timer_rx,
            timer_tx,
            outcome_rx,
            outcome_tx,
            broadcast_tx,
            snapshot_tx,
            shutdown,
            reply_token: None,
            reply_ticket: 0,
            submit_token: None,
            submit_ticket: 0,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting conversation runtime");

        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                event = self.event_rx.recv() => match event {
                    Some(event) => self.process_event(event),
                    // Every handle is gone
                    None => break,
                },
                Some(ticket) = self.timer_rx.recv() => {
                    self.process_timer(ticket);
                }
                Some((ticket, outcome)) = self.outcome_rx.recv() => {
                    self.process_outcome(ticket, outcome);
                }
            }
        }

        self.cancel_reply();
        self.cancel_submission();
        tracing::info!(session_id = %self.session_id, "Conversation runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let user_action = event.is_user_action();
        let result = match event {
            Event::Start => self.engine.start(),
            Event::UserText { text } => self.engine.submit_text(text),
            Event::OptionSelected { option } => self.engine.select_option(option),
            Event::CountrySelected { country } => self.engine.select_country(country),
            Event::Reset => self.engine.reset(),
            Event::ReplyDue => self.engine.deliver_reply(),
            other => self.engine.dispatch(other),
        };
        match result {
            Ok(dispatch) => self.publish(dispatch),
            // Rejected input never reaches the transcript
            Err(e) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    user_action,
                    error = %e,
                    "Event rejected"
                );
            }
        }
    }

    fn process_timer(&mut self, ticket: u64) {
        if self.reply_token.is_none() || ticket != self.reply_ticket {
            tracing::debug!(
                session_id = %self.session_id,
                ticket,
                current = self.reply_ticket,
                "Dropping stale reply timer"
            );
            return;
        }
        self.reply_token = None;
        self.process_event(Event::ReplyDue);
    }

    /// Apply a lead submission result, unless the conversation that asked
    /// for it has since been reset
    fn process_outcome(&mut self, ticket: u64, outcome: Result<(), SubmitError>) {
        if self.submit_token.is_none() || ticket != self.submit_ticket {
            tracing::debug!(
                session_id = %self.session_id,
                ticket,
                current = self.submit_ticket,
                "Dropping stale submission result"
            );
            return;
        }
        self.submit_token = None;

        let event = match outcome {
            Ok(()) => Event::SubmissionSucceeded,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    kind = ?e.kind,
                    error = %e,
                    "Lead submission failed"
                );
                let _ = self.broadcast_tx.send(SseEvent::Error {
                    message: "Lead submission failed".to_string(),
                });
                Event::SubmissionFailed {
                    message: e.to_string(),
                }
            }
        };
        self.process_event(event);
    }

    /// Broadcast what changed, then run the outbound effects.
    ///
    /// The typing indicator goes off before bot lines are sent and back on
    /// only after them.
    fn publish(&mut self, dispatch: Dispatch) {
        let Dispatch {
            appended,
            effects,
            was_typing,
            now_typing,
        } = dispatch;
        let bot_spoke = appended.iter().any(|m| m.sender == Sender::Bot);

        if was_typing && (bot_spoke || !now_typing) {
            let _ = self.broadcast_tx.send(SseEvent::Typing { active: false });
        }
        for message in &appended {
            let message = serde_json::to_value(message).unwrap_or(Value::Null);
            let _ = self.broadcast_tx.send(SseEvent::Message { message });
        }
        if now_typing && (!was_typing || bot_spoke) {
            let _ = self.broadcast_tx.send(SseEvent::Typing { active: true });
        }

        for effect in effects {
            self.execute_effect(effect);
        }

        let snapshot = self.engine.snapshot();
        let _ = self.broadcast_tx.send(SseEvent::StateChange {
            snapshot: serde_json::to_value(&snapshot).unwrap_or(Value::Null),
        });
        self.snapshot_tx.send_replace(snapshot);
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ScheduleReply { delay } => self.schedule_reply(delay),

            Effect::CancelReply => self.cancel_reply(),

            Effect::CancelSubmission => self.cancel_submission(),

            Effect::SubmitLead {
                consultation_requested,
            } => self.submit_lead(consultation_requested),

            Effect::AppendMessage { .. } | Effect::RecordIntake { .. } | Effect::ClearConversation => {
                tracing::warn!(?effect, "Conversation effect reached the runtime");
            }
        }
    }

    fn schedule_reply(&mut self, delay: Duration) {
        self.cancel_reply();
        self.reply_ticket += 1;
        let ticket = self.reply_ticket;
        let token = self.shutdown.child_token();
        self.reply_token = Some(token.clone());

        let timer_tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = timer_tx.send(ticket).await;
                }
            }
        });
    }

    fn cancel_reply(&mut self) {
        if let Some(token) = self.reply_token.take() {
            tracing::debug!(session_id = %self.session_id, ticket = self.reply_ticket, "Cancelling reply timer");
            token.cancel();
        }
    }

    /// Fire-and-forget from the dialogue's point of view; the outcome comes
    /// back on the outcome channel under this submission's ticket. No retry.
    fn submit_lead(&mut self, consultation_requested: bool) {
        let lead = LeadSubmission {
            session_id: self.session_id.clone(),
            intake: self.engine.conversation().intake.clone(),
            consultation_requested,
            submitted_at: Utc::now(),
        };
        let submitter = Arc::clone(&self.lead_submitter);

        self.cancel_submission();
        self.submit_ticket += 1;
        let ticket = self.submit_ticket;
        let token = self.shutdown.child_token();
        self.submit_token = Some(token.clone());

        tracing::info!(
            session_id = %self.session_id,
            submitter = submitter.name(),
            consultation_requested,
            ticket,
            "Submitting lead"
        );

        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!(session_id = %lead.session_id, ticket, "Lead submission abandoned");
                }
                outcome = submitter.submit(&lead) => {
                    let _ = outcome_tx.send((ticket, outcome)).await;
                }
            }
        });
    }

    fn cancel_submission(&mut self) {
        if let Some(token) = self.submit_token.take() {
            tracing::debug!(session_id = %self.session_id, ticket = self.submit_ticket, "Cancelling lead submission");
            token.cancel();
        }
    }
}
