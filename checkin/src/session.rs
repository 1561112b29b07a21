//! Wiring a check-in session together.
//!
//! Builds the Store from configuration and feeds it the ticket list and the
//! persisted used set at startup.

use crate::config::Config;
use crate::feedback::FeedbackSink;
use crate::persistence::{FileKeyValueStore, UsedTicketRepository};
use crate::reducer::{CheckinAction, CheckinEnvironment, CheckinReducer, CheckinState};
use crate::scanner::ScanCooldown;
use crate::source::{JsonFileTicketSource, TicketSource};
use std::sync::Arc;
use std::time::Duration;
use turnstile_core::environment::Clock;
use turnstile_runtime::retry::RetryPolicy;
use turnstile_runtime::{Store, StoreError};

/// The Store running a check-in session
pub type CheckinStore = Store<CheckinState, CheckinAction, CheckinEnvironment, CheckinReducer>;

/// Create a session Store
#[must_use]
pub fn build_store(state: CheckinState, env: CheckinEnvironment) -> CheckinStore {
    Store::new(state, CheckinReducer::new(), env)
}

/// Retry policy for used-ticket writes
#[must_use]
pub fn persist_policy(max_retries: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(2))
        .build()
}

/// Build a file-backed session from configuration
///
/// Returns the Store and the ticket source to pass to [`start`].
#[must_use]
pub fn from_config(
    config: &Config,
    feedback: Arc<dyn FeedbackSink>,
    clock: Arc<dyn Clock>,
) -> (CheckinStore, JsonFileTicketSource) {
    let repository = UsedTicketRepository::new(
        Arc::new(FileKeyValueStore::new(&config.data_dir)),
        persist_policy(config.persist_retries),
    );
    let env = CheckinEnvironment::new(repository, feedback, clock)
        .with_feedback_clear_after(config.feedback_clear_after);
    let state = CheckinState::new(ScanCooldown::new(config.scan_cooldown));

    (build_store(state, env), JsonFileTicketSource::new(&config.tickets_path))
}

/// Read the ticket list and describe the result as an action
pub async fn load_valid_codes(source: &dyn TicketSource) -> CheckinAction {
    match source.load().await {
        Ok(codes) => CheckinAction::ValidCodesLoaded { codes },
        Err(error) => {
            tracing::error!(source = %source.describe(), error = %error, "Failed to load tickets");
            CheckinAction::ValidCodesUnavailable {
                reason: error.to_string(),
            }
        },
    }
}

/// Read the persisted used set and describe the result as an action
pub async fn restore_used_codes(repository: &UsedTicketRepository) -> CheckinAction {
    match repository.load().await {
        Ok(codes) => CheckinAction::UsedCodesRestored { codes },
        Err(error) => {
            tracing::error!(error = %error, "Failed to load used tickets");
            CheckinAction::UsedCodesUnreadable {
                reason: error.to_string(),
            }
        },
    }
}

/// Load the ticket list and the used set into a running session
///
/// Both reads run concurrently. Neither failure is fatal: the session keeps
/// checking tickets with whatever it has.
///
/// # Errors
///
/// Returns [`StoreError::ShutdownInProgress`] if the Store is shutting down.
#[tracing::instrument(skip_all, fields(source = %source.describe()))]
pub async fn start(store: &CheckinStore, source: &dyn TicketSource) -> Result<(), StoreError> {
    let repository = store.environment().used_tickets.clone();
    let (valid, used) = tokio::join!(load_valid_codes(source), restore_used_codes(&repository));

    store.send(used).await?;
    store.send(valid).await?;
    Ok(())
}
