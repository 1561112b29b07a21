//! # Turnstile Core
//!
//! The vocabulary shared by every Turnstile crate.
//!
//! Behavior lives in a [`Reducer`](reducer::Reducer): given the current state,
//! one action and an environment of injected collaborators, it updates the
//! state in place and hands back [`Effect`](effect::Effect) values describing
//! the I/O it wants done. Nothing here performs I/O. `turnstile-runtime`
//! executes effects and feeds the actions they produce back in.
//!
//! ```ignore
//! use turnstile_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! struct DoorReducer;
//!
//! impl Reducer for DoorReducer {
//!     type State = u64;
//!     type Action = DoorAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, admitted: &mut u64, action: DoorAction, _env: &()) -> SmallVec<[Effect<DoorAction>; 4]> {
//!         if let DoorAction::Admit = action {
//!             *admitted += 1;
//!         }
//!         smallvec![]
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// Device-local storage of small named values
pub mod key_value;

/// The reducer trait
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// Deterministic state transition.
    ///
    /// A reducer must not block or perform I/O. Anything that touches the
    /// outside world is returned as an [`Effect`]. Four inline slots cover
    /// every reducer in this workspace without allocating.
    pub trait Reducer {
        /// State owned by the Store
        type State;
        /// Inputs, both user commands and effect results
        type Action;
        /// Injected collaborators
        type Environment;

        /// Apply `action` to `state` and describe follow-up work.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Descriptions of side effects
pub mod effect {
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Work for the runtime to do after a reducer returns.
    ///
    /// An effect may produce one more action, which the runtime sends back
    /// through the reducer.
    pub enum Effect<Action> {
        /// Nothing
        None,
        /// All at once
        Parallel(Vec<Effect<Action>>),
        /// One after another, each finishing before the next starts
        Sequential(Vec<Effect<Action>>),
        /// Send `action` once `duration` has passed
        Delay {
            /// Wait before sending
            duration: Duration,
            /// Sent afterwards
            action: Box<Action>,
        },
        /// Async work, optionally ending in an action
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action> Effect<Action> {
        /// Box an async block into [`Effect::Future`].
        ///
        /// ```ignore
        /// Effect::future(async move {
        ///     repository.save(revision, &codes).await.ok().map(|_| Action::Saved)
        /// })
        /// ```
        #[must_use]
        pub fn future<F>(work: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Self::Future(Box::pin(work))
        }

        /// True when executing this would do nothing.
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Self::None => true,
                Self::Parallel(inner) | Self::Sequential(inner) => inner.iter().all(Self::is_none),
                Self::Delay { .. } | Self::Future(_) => false,
            }
        }
    }

    impl<Action: fmt::Debug> fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::None => f.write_str("Effect::None"),
                Self::Parallel(inner) => f.debug_tuple("Effect::Parallel").field(inner).finish(),
                Self::Sequential(inner) => f.debug_tuple("Effect::Sequential").field(inner).finish(),
                Self::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Self::Future(_) => f.write_str("Effect::Future(<future>)"),
            }
        }
    }
}

/// Injected collaborators shared across features
pub mod environment {
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    /// Source of the current time.
    ///
    /// Reducers read time through this so tests can pin or advance it.
    pub trait Clock: Send + Sync {
        /// Now.
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    impl<C: Clock + ?Sized> Clock for Arc<C> {
        fn now(&self) -> DateTime<Utc> {
            C::now(self)
        }
    }
}
