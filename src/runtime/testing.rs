//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::lead::SubmitError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Lead Submitter
// ============================================================================

/// Mock submitter that returns queued results (success when the queue is
/// empty), each after an optional delay
#[derive(Default)]
pub struct MockLeadSubmitter {
    results: Mutex<VecDeque<(Duration, Result<(), SubmitError>)>>,
    /// Record of all submissions made
    pub submissions: Mutex<Vec<LeadSubmission>>,
}

impl MockLeadSubmitter {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// Queue an error result
    pub fn queue_error(&self, error: SubmitError) {
        self.queue_delayed(Duration::ZERO, Err(error));
    }

    /// Queue a result that is only returned after `delay`
    pub fn queue_delayed(&self, delay: Duration, result: Result<(), SubmitError>) {
        self.results.lock().unwrap().push_back((delay, result));
    }

    /// Get recorded submissions
    pub fn recorded(&self) -> Vec<LeadSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl LeadSubmitter for MockLeadSubmitter {
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), SubmitError> {
        self.submissions.lock().unwrap().push(lead.clone());
        let next = self.results.lock().unwrap().pop_front();
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Runtime tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ConversationSnapshot;
    use crate::lead::SubmitErrorKind;
    use crate::runtime::{
        spawn_conversation, ConversationHandle, RuntimeError, RuntimeManager, SseEvent,
    };
    use crate::state_machine::{script, DialogueContext, Event, Sender, Submission};
    use std::sync::Arc;
    use tokio::sync::broadcast;

    const DELAY: Duration = Duration::from_millis(1000);

    fn context() -> DialogueContext {
        DialogueContext::new(DELAY)
    }

    async fn send(handle: &ConversationHandle, event: Event) {
        handle.event_tx.send(event).await.unwrap();
    }

    /// Wait (in paused time) until the snapshot satisfies `check`
    async fn wait_until(
        handle: &ConversationHandle,
        check: impl FnMut(&ConversationSnapshot) -> bool,
    ) -> ConversationSnapshot {
        let mut rx = handle.snapshot_rx.clone();
        let snapshot = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(check))
            .await
            .expect("timed out waiting for snapshot")
            .expect("runtime dropped the snapshot channel");
        (*snapshot).clone()
    }

    async fn wait_for_step(handle: &ConversationHandle, step: u8) -> ConversationSnapshot {
        wait_until(handle, |s| s.step == step && !s.bot_typing).await
    }

    fn bot_texts(snapshot: &ConversationSnapshot) -> Vec<String> {
        snapshot
            .transcript
            .iter()
            .filter(|m| m.sender == Sender::Bot)
            .map(|m| m.text.clone())
            .collect()
    }

    /// Drain the events already broadcast
    fn drain(rx: &mut broadcast::Receiver<SseEvent>) -> Vec<SseEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait until the runtime task has exited and dropped its channels
    async fn wait_for_exit(handle: &ConversationHandle) {
        let mut rx = handle.snapshot_rx.clone();
        tokio::time::timeout(Duration::from_secs(60), async {
            while rx.changed().await.is_ok() {}
        })
        .await
        .expect("runtime still running");
        assert!(handle.event_tx.is_closed());
    }

    /// Answer every question and pick the closing option
    async fn run_to_booking(handle: &ConversationHandle, booking: &str) {
        send(handle, Event::Start).await;
        wait_for_step(handle, 1).await;
        send(handle, Event::UserText { text: "Aria".into() }).await;
        wait_for_step(handle, 2).await;
        send(handle, Event::UserText { text: "Pune".into() }).await;
        wait_for_step(handle, 3).await;
        send(handle, Event::OptionSelected { option: "Master's".into() }).await;
        wait_for_step(handle, 4).await;
        send(handle, Event::OptionSelected { option: "Yes".into() }).await;
        wait_until(handle, |s| {
            s.pending_prompt
                .as_ref()
                .is_some_and(|p| p.text == script::ASK_COUNTRY)
        })
        .await;
        send(handle, Event::CountrySelected { country: "Canada".into() }).await;
        wait_for_step(handle, 5).await;
        send(handle, Event::UserText { text: "Data Science".into() }).await;
        wait_for_step(handle, 6).await;
        send(handle, Event::OptionSelected { option: "TOEFL 100+".into() }).await;
        wait_for_step(handle, 7).await;
        send(handle, Event::OptionSelected { option: "6-12 months".into() }).await;
        wait_for_step(handle, 8).await;
        send(handle, Event::OptionSelected { option: booking.into() }).await;
    }

    async fn run_full_flow(handle: &ConversationHandle, booking: &str) -> ConversationSnapshot {
        run_to_booking(handle, booking).await;
        wait_until(handle, |s| {
            matches!(
                s.submission,
                Some(Submission::Delivered | Submission::Failed { .. })
            )
        })
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_flow_submits_lead_once() {
        let submitter = Arc::new(MockLeadSubmitter::new());
        let handle = spawn_conversation("s1", context(), submitter.clone());

        let snapshot = run_full_flow(&handle, script::BOOK_NOW).await;

        assert_eq!(snapshot.step, 9);
        assert_eq!(snapshot.submission, Some(Submission::Delivered));
        assert!(!snapshot.awaiting_text_input);
        assert!(snapshot.pending_prompt.is_none());

        let recorded = submitter.recorded();
        assert_eq!(recorded.len(), 1);
        let lead = &recorded[0];
        assert_eq!(lead.session_id, "s1");
        assert!(lead.consultation_requested);
        assert_eq!(lead.intake.name, "Aria");
        assert_eq!(lead.intake.location, "Pune");
        assert_eq!(lead.intake.destination_country.as_deref(), Some("Canada"));
        assert_eq!(lead.intake.start_date, "6-12 months");
        assert!(lead.intake.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_waits_for_delay() {
        let handle = spawn_conversation("s1", context(), Arc::new(MockLeadSubmitter::new()));
        send(&handle, Event::Start).await;
        wait_for_step(&handle, 1).await;

        send(&handle, Event::UserText { text: "Aria".into() }).await;
        let typing = wait_until(&handle, |s| s.bot_typing).await;
        assert_eq!(typing.step, 2);
        assert!(!typing.awaiting_text_input);

        tokio::time::sleep(DELAY / 2).await;
        assert!(handle.snapshot().bot_typing, "reply arrived before the delay");

        let settled = wait_for_step(&handle, 2).await;
        assert_eq!(
            bot_texts(&settled).last().map(String::as_str),
            Some(script::ask_location("Aria").as_str())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_indicator_wraps_bot_lines() {
        let handle = spawn_conversation("s1", context(), Arc::new(MockLeadSubmitter::new()));
        let mut rx = handle.broadcast_tx.subscribe();

        send(&handle, Event::Start).await;
        wait_for_step(&handle, 1).await;
        drain(&mut rx);

        send(&handle, Event::UserText { text: "Aria".into() }).await;
        wait_until(&handle, |s| s.bot_typing).await;
        wait_for_step(&handle, 2).await;

        let kinds: Vec<&'static str> = drain(&mut rx)
            .iter()
            .map(|e| match e {
                SseEvent::Message { message } if message["sender"] == "user" => "user",
                SseEvent::Message { .. } => "bot",
                SseEvent::Typing { active: true } => "typing_on",
                SseEvent::Typing { active: false } => "typing_off",
                SseEvent::StateChange { .. } => "state",
                SseEvent::Init { .. } => "init",
                SseEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["user", "typing_on", "state", "typing_off", "bot", "state"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_reply() {
        let handle = spawn_conversation("s1", context(), Arc::new(MockLeadSubmitter::new()));
        send(&handle, Event::Start).await;
        wait_for_step(&handle, 1).await;
        send(&handle, Event::UserText { text: "Aria".into() }).await;
        wait_until(&handle, |s| s.bot_typing).await;

        send(&handle, Event::Reset).await;
        let reset = wait_until(&handle, |s| s.step == 0).await;
        assert!(reset.transcript.is_empty());
        assert!(!reset.bot_typing);

        // The cancelled reply never lands in the fresh conversation
        tokio::time::sleep(DELAY * 3).await;
        let later = handle.snapshot();
        assert_eq!(later.step, 0);
        assert!(later.transcript.is_empty());
        assert_eq!(later.intake, Default::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_ignored_while_typing() {
        let handle = spawn_conversation("s1", context(), Arc::new(MockLeadSubmitter::new()));
        send(&handle, Event::Start).await;
        wait_for_step(&handle, 1).await;
        send(&handle, Event::UserText { text: "Aria".into() }).await;
        wait_until(&handle, |s| s.bot_typing).await;

        send(&handle, Event::UserText { text: "Pune".into() }).await;
        let settled = wait_for_step(&handle, 2).await;

        assert!(settled.transcript.iter().all(|m| m.text != "Pune"));
        assert_eq!(settled.intake.location, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_failure_keeps_intake() {
        let submitter = Arc::new(MockLeadSubmitter::new());
        submitter.queue_error(SubmitError::new(SubmitErrorKind::ServerError, "HTTP 503"));
        let handle = spawn_conversation("s1", context(), submitter.clone());
        let mut rx = handle.broadcast_tx.subscribe();

        let snapshot = run_full_flow(&handle, script::NO_THANKS).await;

        assert!(matches!(
            snapshot.submission,
            Some(Submission::Failed { ref message }) if message == "HTTP 503"
        ));
        assert_eq!(snapshot.intake.name, "Aria");
        let notice = script::submission_failed(&context().contact);
        let notices = bot_texts(&snapshot).iter().filter(|t| **t == notice).count();
        assert_eq!(notices, 1);

        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, SseEvent::Error { .. })));
        // No retry
        tokio::time::sleep(DELAY * 5).await;
        assert_eq!(submitter.recorded().len(), 1);
        assert!(!submitter.recorded()[0].consultation_requested);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_discards_earlier_submission_result() {
        let submitter = Arc::new(MockLeadSubmitter::new());
        submitter.queue_delayed(
            Duration::from_secs(15),
            Err(SubmitError::new(
                SubmitErrorKind::ServerError,
                "first conversation failed",
            )),
        );
        submitter.queue_delayed(Duration::from_secs(600), Ok(()));
        let handle = spawn_conversation("s1", context(), submitter.clone());
        let mut rx = handle.broadcast_tx.subscribe();

        run_to_booking(&handle, script::BOOK_NOW).await;
        wait_until(&handle, |s| s.submission == Some(Submission::InFlight)).await;

        send(&handle, Event::Reset).await;
        wait_until(&handle, |s| s.step == 0).await;
        run_to_booking(&handle, script::NO_THANKS).await;
        wait_until(&handle, |s| s.submission == Some(Submission::InFlight)).await;

        // Well past the point where the first request gives up
        tokio::time::sleep(Duration::from_secs(20)).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.submission, Some(Submission::InFlight));
        let notice = script::submission_failed(&context().contact);
        assert!(!bot_texts(&snapshot).contains(&notice));
        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, SseEvent::Error { .. })));

        let recorded = submitter.recorded();
        assert_eq!(recorded.len(), 2);
        assert!(!recorded[1].consultation_requested);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_reply() {
        let manager = RuntimeManager::new(context(), Arc::new(MockLeadSubmitter::new()));
        let (id, handle) = manager.create().await;
        manager.send_event(&id, Event::Start).await.unwrap();
        wait_for_step(&handle, 1).await;

        let (_, mut rx) = manager.subscribe(&id).await.unwrap();
        manager
            .send_event(&id, Event::UserText { text: "Aria".into() })
            .await
            .unwrap();
        wait_until(&handle, |s| s.bot_typing).await;
        drain(&mut rx);

        manager.close(&id).await.unwrap();
        tokio::time::sleep(DELAY * 3).await;

        let late = drain(&mut rx);
        assert!(
            !late.iter().any(|e| matches!(e, SseEvent::Message { .. })),
            "bot spoke after teardown: {late:?}"
        );
        wait_for_exit(&handle).await;
        assert!(handle.snapshot().bot_typing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_expire() {
        let ttl = Duration::from_secs(60);
        let manager = Arc::new(RuntimeManager::new(
            context(),
            Arc::new(MockLeadSubmitter::new()),
        ));
        let sweeper = manager.spawn_idle_sweeper(ttl);

        let (idle, idle_handle) = manager.create().await;
        let (active, _) = manager.create().await;
        let (watched, _) = manager.create().await;
        let (_, stream) = manager.subscribe(&watched).await.unwrap();

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_secs(30)).await;
            manager.send_event(&active, Event::Reset).await.unwrap();
        }

        assert!(matches!(
            manager.get(&idle).await,
            Err(RuntimeError::SessionNotFound(_))
        ));
        wait_for_exit(&idle_handle).await;
        assert!(manager.get(&active).await.is_ok());
        assert!(manager.get(&watched).await.is_ok());

        // Once the stream goes away the session ages out too
        drop(stream);
        tokio::time::sleep(ttl * 2).await;
        assert!(matches!(
            manager.get(&watched).await,
            Err(RuntimeError::SessionNotFound(_))
        ));

        drop(manager);
        tokio::time::timeout(Duration::from_secs(120), sweeper)
            .await
            .expect("sweeper outlived the manager")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_lifecycle() {
        let manager = RuntimeManager::new(context(), Arc::new(MockLeadSubmitter::new()));
        let (id, handle) = manager.create().await;
        assert_eq!(manager.session_count().await, 1);

        manager.send_event(&id, Event::Start).await.unwrap();
        wait_for_step(&handle, 1).await;
        let (snapshot, _rx) = manager.subscribe(&id).await.unwrap();
        assert_eq!(snapshot.step, 1);

        manager.close(&id).await.unwrap();
        assert_eq!(manager.session_count().await, 0);
        assert!(matches!(
            manager.get(&id).await,
            Err(RuntimeError::SessionNotFound(_))
        ));
        assert!(matches!(
            manager.send_event(&id, Event::Reset).await,
            Err(RuntimeError::SessionNotFound(_))
        ));
        assert!(matches!(
            manager.close(&id).await,
            Err(RuntimeError::SessionNotFound(_))
        ));
    }
}
