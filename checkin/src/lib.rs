//! # Turnstile Check-in
//!
//! Single-operator ticket check-in. Loads a list of valid codes, checks codes
//! typed by the operator or decoded from QR scans, and remembers which codes
//! were redeemed on this device so none is admitted twice.
//!
//! # Architecture
//!
//! ```text
//!  console line ──► Command ──► CheckinAction ──► Store ──► CheckinReducer
//!                                                  ▲            │
//!                                                  │            ▼
//!                                          feedback actions  TicketValidator
//!                                                  │            │
//!                                                  └── Effects ◄┘
//!                                     (persist used set, show banner, clear later)
//! ```
//!
//! - [`validator`]: the state machine. Pure, synchronous, no I/O.
//! - [`reducer`]: hosts the validator and describes side effects.
//! - [`persistence`]: the used set under the `usedTickets` key.
//! - [`source`]: the list of valid codes.
//! - [`scanner`]: throttling for scanned input.
//! - [`feedback`]: banners and sinks.
//! - [`session`]: wiring and startup loading.
//!
//! ## Example
//!
//! ```ignore
//! let (store, source) = session::from_config(&config, Arc::new(TerminalSink), Arc::new(SystemClock));
//! session::start(&store, &source).await?;
//!
//! store.send(CheckinAction::manual("ABC123")).await?;
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod feedback;
pub mod persistence;
pub mod reducer;
pub mod scanner;
pub mod session;
pub mod source;
pub mod types;
pub mod validator;

pub use config::Config;
pub use error::{ConfigError, PersistenceError, SourceError};
pub use feedback::{Feedback, FeedbackSink, RecordingSink, TerminalSink, Tone};
pub use persistence::{FileKeyValueStore, UsedTicketRepository, USED_TICKETS_KEY};
pub use reducer::{Availability, CheckinAction, CheckinEnvironment, CheckinReducer, CheckinState};
pub use scanner::ScanCooldown;
pub use session::CheckinStore;
pub use source::{JsonFileTicketSource, StaticTicketSource, TicketSource};
pub use types::{CheckOutcome, InputSource, TicketCode};
pub use validator::TicketValidator;
