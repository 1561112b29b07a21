//! Reducer hosting the ticket validator.
//!
//! Commands from the operator and events from collaborators all pass through
//! [`CheckinReducer`]. It updates [`CheckinState`] synchronously and describes
//! the side effects (persist, show feedback, clear feedback later) as
//! [`Effect`] values for the Store to run.

use crate::feedback::{Feedback, FeedbackSink};
use crate::persistence::UsedTicketRepository;
use crate::scanner::ScanCooldown;
use crate::types::{CheckOutcome, InputSource, TicketCode};
use crate::validator::TicketValidator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use turnstile_core::{effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use turnstile_runtime::{HealthCheck, HealthReport};

/// How long a banner stays up by default
pub const DEFAULT_FEEDBACK_CLEAR: Duration = Duration::from_millis(1500);

/// Health component name of the ticket list
pub const TICKET_SOURCE_COMPONENT: &str = "ticket_source";

/// Health component name of the used-ticket store
pub const USED_TICKET_STORE_COMPONENT: &str = "used_ticket_store";

/// Status line shown until the ticket list arrives
pub const LOADING_STATUS: &str = "Loading tickets...";

/// Status line shown when the ticket list could not be loaded
pub const LOAD_FAILED_STATUS: &str = "Error loading tickets.";

// ============================================================================
// State
// ============================================================================

/// Whether a collaborator is usable
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Availability {
    /// Not heard from yet
    #[default]
    Pending,
    /// Working
    Available,
    /// Failing; the reason is the last error seen
    Degraded(String),
}

impl Availability {
    /// Whether the collaborator is failing
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    fn to_check(&self, component: &str) -> HealthCheck {
        match self {
            Self::Pending => HealthCheck::degraded(component, "not loaded yet"),
            Self::Available => HealthCheck::healthy(component),
            Self::Degraded(reason) => HealthCheck::degraded(component, reason.clone()),
        }
    }
}

/// Everything the check-in screen knows
#[derive(Clone, Debug)]
pub struct CheckinState {
    /// Valid and used codes
    pub validator: TicketValidator,
    /// Banner currently shown, if any
    pub feedback: Option<Feedback>,
    /// Bumped every time a banner is shown
    pub feedback_generation: u64,
    /// Outcome of the most recent accepted check
    pub last_outcome: Option<CheckOutcome>,
    /// Ticket-list status line
    pub status: String,
    /// Ticket list availability
    pub ticket_source: Availability,
    /// Used-ticket store availability
    pub persistence: Availability,
    /// Throttle for scanned input
    pub scan_cooldown: ScanCooldown,
    /// Revision of the last persist or clear issued
    pub persist_revision: u64,
    /// Revision of the newest write result applied to `persistence`
    pub persist_acknowledged: u64,
}

impl Default for CheckinState {
    fn default() -> Self {
        Self::new(ScanCooldown::default())
    }
}

impl CheckinState {
    /// Fresh state with the given scan throttle
    #[must_use]
    pub fn new(scan_cooldown: ScanCooldown) -> Self {
        Self {
            validator: TicketValidator::new(),
            feedback: None,
            feedback_generation: 0,
            last_outcome: None,
            status: LOADING_STATUS.to_string(),
            ticket_source: Availability::Pending,
            persistence: Availability::Pending,
            scan_cooldown,
            persist_revision: 0,
            persist_acknowledged: 0,
        }
    }

    /// Health of the two collaborators as of `now`
    #[must_use]
    pub fn health_report(&self, now: DateTime<Utc>) -> HealthReport {
        HealthReport::at(
            vec![
                self.ticket_source
                    .to_check(TICKET_SOURCE_COMPONENT)
                    .with_metadata("valid_codes", self.validator.valid_count().to_string()),
                self.persistence
                    .to_check(USED_TICKET_STORE_COMPONENT)
                    .with_metadata("used_codes", self.validator.used_count().to_string()),
            ],
            now,
        )
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Inputs to the check-in reducer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckinAction {
    // Commands
    /// Check (and possibly redeem) a code
    CheckTicket {
        /// Input exactly as received
        raw: String,
        /// Where it came from
        source: InputSource,
    },
    /// Forget every redemption on this device
    ResetUsed,

    // Events
    /// The ticket list was read
    ValidCodesLoaded {
        /// Raw codes from the list
        codes: Vec<String>,
    },
    /// The ticket list could not be read
    ValidCodesUnavailable {
        /// Why
        reason: String,
    },
    /// The persisted used list was read
    UsedCodesRestored {
        /// Raw codes from storage
        codes: Vec<String>,
    },
    /// The persisted used list could not be read
    UsedCodesUnreadable {
        /// Why
        reason: String,
    },
    /// A write of the used list succeeded
    UsedCodesPersisted {
        /// Codes written
        count: usize,
        /// Revision of the write
        revision: u64,
    },
    /// A write of the used list failed after retries
    PersistenceFailed {
        /// Why
        reason: String,
        /// Revision of the write
        revision: u64,
    },
    /// A banner's display time ran out
    FeedbackExpired {
        /// Generation of the banner the timer was started for
        generation: u64,
    },
}

impl CheckinAction {
    /// Typed input
    #[must_use]
    pub fn manual(raw: impl Into<String>) -> Self {
        Self::CheckTicket {
            raw: raw.into(),
            source: InputSource::Manual,
        }
    }

    /// Scanned input
    #[must_use]
    pub fn scan(raw: impl Into<String>) -> Self {
        Self::CheckTicket {
            raw: raw.into(),
            source: InputSource::Scan,
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the check-in reducer
#[derive(Clone)]
pub struct CheckinEnvironment {
    /// Persisted used set
    pub used_tickets: UsedTicketRepository,
    /// Where banners go
    pub feedback: Arc<dyn FeedbackSink>,
    /// Time source for the scan throttle
    pub clock: Arc<dyn Clock>,
    /// How long a banner stays up
    pub feedback_clear_after: Duration,
}

impl CheckinEnvironment {
    /// Creates a new `CheckinEnvironment`
    #[must_use]
    pub fn new(
        used_tickets: UsedTicketRepository,
        feedback: Arc<dyn FeedbackSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            used_tickets,
            feedback,
            clock,
            feedback_clear_after: DEFAULT_FEEDBACK_CLEAR,
        }
    }

    /// Override the banner display time
    #[must_use]
    pub const fn with_feedback_clear_after(mut self, after: Duration) -> Self {
        self.feedback_clear_after = after;
        self
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the check-in screen
#[derive(Clone, Debug, Default)]
pub struct CheckinReducer;

impl CheckinReducer {
    /// Creates a new `CheckinReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Show a banner and schedule its removal
    fn show_feedback(
        state: &mut CheckinState,
        env: &CheckinEnvironment,
        feedback: Feedback,
    ) -> [Effect<CheckinAction>; 2] {
        state.feedback_generation += 1;
        state.feedback = Some(feedback.clone());

        let sink = Arc::clone(&env.feedback);
        [
            Effect::future(async move {
                sink.show(&feedback);
                None
            }),
            Effect::Delay {
                duration: env.feedback_clear_after,
                action: Box::new(CheckinAction::FeedbackExpired {
                    generation: state.feedback_generation,
                }),
            },
        ]
    }

    /// Write the full used set
    fn persist_used(state: &mut CheckinState, env: &CheckinEnvironment) -> Effect<CheckinAction> {
        state.persist_revision += 1;
        let revision = state.persist_revision;
        let codes: Vec<TicketCode> = state.validator.used_codes().to_vec();
        let repository = env.used_tickets.clone();

        Effect::future(async move {
            match repository.save(revision, &codes).await {
                Ok(true) => Some(CheckinAction::UsedCodesPersisted {
                    count: codes.len(),
                    revision,
                }),
                Ok(false) => None,
                Err(error) => Some(CheckinAction::PersistenceFailed {
                    reason: error.to_string(),
                    revision,
                }),
            }
        })
    }

    /// Remove the persisted used set
    fn clear_persisted(state: &mut CheckinState, env: &CheckinEnvironment) -> Effect<CheckinAction> {
        state.persist_revision += 1;
        let revision = state.persist_revision;
        let repository = env.used_tickets.clone();

        Effect::future(async move {
            match repository.clear(revision).await {
                Ok(true) => Some(CheckinAction::UsedCodesPersisted { count: 0, revision }),
                Ok(false) => None,
                Err(error) => Some(CheckinAction::PersistenceFailed {
                    reason: error.to_string(),
                    revision,
                }),
            }
        })
    }

    /// Record a write result. False when a newer result was already applied.
    fn acknowledge(state: &mut CheckinState, revision: u64) -> bool {
        if revision <= state.persist_acknowledged {
            tracing::debug!(revision, newest = state.persist_acknowledged, "Stale write result ignored");
            return false;
        }
        state.persist_acknowledged = revision;
        true
    }

    fn check_ticket(
        state: &mut CheckinState,
        env: &CheckinEnvironment,
        raw: &str,
        source: InputSource,
    ) -> SmallVec<[Effect<CheckinAction>; 4]> {
        if source == InputSource::Scan && !state.scan_cooldown.try_accept(env.clock.now()) {
            tracing::debug!(raw, "Scan dropped during cooldown");
            metrics::counter!("checkin.scans.throttled").increment(1);
            return smallvec![Effect::None];
        }

        let outcome = state.validator.check_ticket(raw);
        tracing::info!(
            outcome = outcome.label(),
            source = source.label(),
            code = outcome.code().map(TicketCode::as_str),
            "Ticket checked"
        );
        metrics::counter!("checkin.outcomes", "outcome" => outcome.label()).increment(1);

        let mut effects: SmallVec<[Effect<CheckinAction>; 4]> = SmallVec::new();
        if outcome.is_admitted() {
            effects.push(Self::persist_used(state, env));
        }
        effects.extend(Self::show_feedback(state, env, Feedback::for_outcome(&outcome)));
        state.last_outcome = Some(outcome);
        effects
    }
}

impl Reducer for CheckinReducer {
    type State = CheckinState;
    type Action = CheckinAction;
    type Environment = CheckinEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            CheckinAction::CheckTicket { raw, source } => {
                Self::check_ticket(state, env, &raw, source)
            },

            CheckinAction::ResetUsed => {
                state.validator.reset_used();
                state.last_outcome = None;
                tracing::info!("Used tickets reset");

                let mut effects: SmallVec<[Effect<CheckinAction>; 4]> =
                    smallvec![Self::clear_persisted(state, env)];
                effects.extend(Self::show_feedback(state, env, Feedback::reset()));
                effects
            },

            CheckinAction::ValidCodesLoaded { codes } => {
                state.validator.load_valid_codes(&codes);
                state.status = format!("Loaded {} tickets.", state.validator.valid_count());
                state.ticket_source = Availability::Available;
                tracing::info!(count = state.validator.valid_count(), "Ticket list loaded");
                smallvec![Effect::None]
            },

            CheckinAction::ValidCodesUnavailable { reason } => {
                state.validator.load_valid_codes(std::iter::empty::<&str>());
                state.status = LOAD_FAILED_STATUS.to_string();
                tracing::error!(reason = %reason, "Ticket list unavailable");
                state.ticket_source = Availability::Degraded(reason);
                smallvec![Effect::None]
            },

            CheckinAction::UsedCodesRestored { codes } => {
                let redeemed_before_restore = state.validator.used_count();
                state.validator.restore_used(&codes);
                state.persistence = Availability::Available;
                tracing::info!(count = state.validator.used_count(), "Used tickets restored");

                // Redemptions made before the restore were written without the
                // restored codes.
                if redeemed_before_restore > 0 {
                    smallvec![Self::persist_used(state, env)]
                } else {
                    smallvec![Effect::None]
                }
            },

            CheckinAction::UsedCodesUnreadable { reason } => {
                tracing::warn!(reason = %reason, "Used tickets unreadable, starting empty");
                state.persistence = Availability::Degraded(reason);
                smallvec![Effect::None]
            },

            CheckinAction::UsedCodesPersisted { count, revision } => {
                tracing::debug!(count, revision, "Used tickets persisted");
                if Self::acknowledge(state, revision) {
                    state.persistence = Availability::Available;
                }
                smallvec![Effect::None]
            },

            CheckinAction::PersistenceFailed { reason, revision } => {
                tracing::error!(reason = %reason, revision, "Failed to persist used tickets");
                metrics::counter!("checkin.persistence.failures").increment(1);
                if Self::acknowledge(state, revision) {
                    state.persistence = Availability::Degraded(reason);
                }
                smallvec![Effect::None]
            },

            CheckinAction::FeedbackExpired { generation } => {
                if generation != state.feedback_generation || state.feedback.is_none() {
                    tracing::trace!(generation, current = state.feedback_generation, "Stale feedback clear ignored");
                    return smallvec![Effect::None];
                }

                state.feedback = None;
                let sink = Arc::clone(&env.feedback);
                smallvec![Effect::future(async move {
                    sink.clear();
                    None
                })]
            },
        }
    }
}
