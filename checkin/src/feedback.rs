//! Operator-facing feedback.
//!
//! Outcomes are rendered into a [`Feedback`] banner and handed to a
//! [`FeedbackSink`]. The reducer decides *what* to show and when it expires;
//! sinks only present it.

use crate::types::CheckOutcome;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Message shown after the used set is cleared
pub const RESET_MESSAGE: &str = "Used tickets reset on this device.";

/// Message shown for blank input
pub const EMPTY_INPUT_MESSAGE: &str = "Please enter a ticket code.";

/// Visual treatment of a banner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    /// Prompts and notices
    Neutral,
    /// Ticket accepted
    Valid,
    /// Ticket already redeemed
    Used,
    /// Ticket unknown
    Invalid,
}

impl Tone {
    /// Short tag used by text sinks
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Neutral => "INFO",
            Self::Valid => "VALID",
            Self::Used => "USED",
            Self::Invalid => "INVALID",
        }
    }
}

/// A banner to show the operator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Text of the banner
    pub message: String,
    /// How to present it
    pub tone: Tone,
}

impl Feedback {
    /// Render an outcome
    #[must_use]
    pub fn for_outcome(outcome: &CheckOutcome) -> Self {
        match outcome {
            CheckOutcome::EmptyInput => Self::neutral(EMPTY_INPUT_MESSAGE),
            CheckOutcome::Invalid(code) => Self {
                message: format!("Ticket \"{code}\" is NOT valid."),
                tone: Tone::Invalid,
            },
            CheckOutcome::AlreadyUsed(code) => Self {
                message: format!("Ticket \"{code}\" was already used."),
                tone: Tone::Used,
            },
            CheckOutcome::Valid(code) => Self {
                message: format!("Ticket \"{code}\" is VALID. Welcome!"),
                tone: Tone::Valid,
            },
        }
    }

    /// Banner confirming a reset
    #[must_use]
    pub fn reset() -> Self {
        Self::neutral(RESET_MESSAGE)
    }

    fn neutral(message: &str) -> Self {
        Self {
            message: message.to_string(),
            tone: Tone::Neutral,
        }
    }
}

/// Presents feedback to the operator
pub trait FeedbackSink: Send + Sync {
    /// Show a banner, replacing any current one
    fn show(&self, feedback: &Feedback);

    /// Remove the current banner
    fn clear(&self);
}

/// Writes one tagged line per banner to stdout
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalSink;

impl FeedbackSink for TerminalSink {
    fn show(&self, feedback: &Feedback) {
        let mut out = std::io::stdout().lock();
        if let Err(error) = writeln!(out, "[{}] {}", feedback.tone.tag(), feedback.message) {
            tracing::warn!(error = %error, "Failed to write feedback");
        }
    }

    fn clear(&self) {
        // A line-based terminal has nothing to erase.
        tracing::trace!("Feedback cleared");
    }
}

/// What a [`RecordingSink`] saw
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    /// A banner was shown
    Shown(Feedback),
    /// The banner was cleared
    Cleared,
}

/// Sink that records every call, for embedding and tests
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Messages of every banner shown so far
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Shown(feedback) => Some(feedback.message),
                SinkEvent::Cleared => None,
            })
            .collect()
    }

    fn record(&self, event: SinkEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl FeedbackSink for RecordingSink {
    fn show(&self, feedback: &Feedback) {
        self.record(SinkEvent::Shown(feedback.clone()));
    }

    fn clear(&self) {
        self.record(SinkEvent::Cleared);
    }
}
