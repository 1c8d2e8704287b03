//! Events that can occur in a conversation

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    /// Widget opened / "Hi" button pressed
    Start,
    UserText {
        text: String,
    },
    OptionSelected {
        option: String,
    },
    CountrySelected {
        country: String,
    },
    Reset,

    // Timer events
    /// Typing delay elapsed; deliver the next reply beat
    ReplyDue,

    // Lead submission events
    SubmissionSucceeded,
    SubmissionFailed {
        message: String,
    },
}

impl Event {
    /// Events that originate from the person chatting
    pub fn is_user_action(&self) -> bool {
        matches!(
            self,
            Event::Start
                | Event::UserText { .. }
                | Event::OptionSelected { .. }
                | Event::CountrySelected { .. }
        )
    }
}
