//! # Turnstile Runtime
//!
//! Runs reducers. A [`Store`] owns the state, feeds each action through the
//! reducer and executes the effects it describes, feeding any resulting
//! actions back in. Alongside it live the pieces effects lean on:
//!
//! - [`retry`]: exponential backoff for flaky collaborators
//! - [`health`]: per-component status rolled up into a report
//!
//! ```ignore
//! use turnstile_runtime::Store;
//!
//! let store = Store::new(CheckinState::default(), CheckinReducer::new(), env);
//! store.send(CheckinAction::manual("A1")).await?;
//! let used = store.state(|s| s.validator.used_count()).await;
//! ```

pub mod health;
pub mod retry;
pub mod store;

/// Store failures
pub mod error {
    use thiserror::Error;

    /// Why a Store call did not go through
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// `send` after shutdown began
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Effects still running when the shutdown timeout expired
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Nothing matching arrived in time
        #[error("Timeout waiting for action")]
        Timeout,

        /// The action broadcast closed under an observer
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;
pub use health::{HealthCheck, HealthReport, HealthStatus};
pub use store::{EffectHandle, Store, StoreConfig};
