//! Key-value store trait for small device-local blobs.
//!
//! A key-value store holds opaque byte values addressed by string keys. It is
//! scoped to a single device: there is no replication and no expiry. Callers
//! own the encoding of their values (typically JSON).
//!
//! # Implementations
//!
//! - `FileKeyValueStore` (in `turnstile-checkin`): one file per key in a data directory
//! - `InMemoryKeyValueStore` (in `turnstile-testing`): `HashMap`-backed, for tests
//!
//! # Example
//!
//! ```no_run
//! use turnstile_core::key_value::{KeyValueError, KeyValueStore};
//!
//! async fn example<S: KeyValueStore>(store: &S) -> Result<(), KeyValueError> {
//!     store.put("usedTickets", br#"["A1"]"#).await?;
//!
//!     let raw = store.get("usedTickets").await?;
//!     assert!(raw.is_some());
//!
//!     store.remove("usedTickets").await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`KeyValueStore`] methods.
pub type KeyValueFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, KeyValueError>> + Send + 'a>>;

/// Errors that can occur during key-value store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyValueError {
    /// The key is not acceptable to the backend (empty, path separators, ...).
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    /// The backend could not be read or written.
    #[error("I/O error: {0}")]
    Io(String),

    /// The backend refused the operation (read-only, quota exceeded, ...).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Device-local key-value storage.
///
/// # Semantics
///
/// - `put` is an upsert: it replaces any existing value for the key
/// - `get` returns `None` for a missing key (not an error)
/// - `remove` of a missing key succeeds
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be held as `Arc<dyn KeyValueStore>` inside an environment and
/// captured by effects.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueError`] if the backend cannot be read.
    fn get<'a>(&'a self, key: &'a str) -> KeyValueFuture<'a, Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueError`] if the backend cannot be written.
    fn put<'a>(&'a self, key: &'a str, value: &'a [u8]) -> KeyValueFuture<'a, ()>;

    /// Delete the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueError`] if the backend cannot be written.
    fn remove<'a>(&'a self, key: &'a str) -> KeyValueFuture<'a, ()>;
}
