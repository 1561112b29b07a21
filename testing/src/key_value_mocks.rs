//! In-memory key-value stores for tests
//!
//! - [`InMemoryKeyValueStore`]: `HashMap`-backed storage, shareable between sessions
//! - [`FailingKeyValueStore`]: store whose reads and writes can be switched to fail

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use turnstile_core::key_value::{KeyValueError, KeyValueFuture, KeyValueStore};

/// In-memory key-value store for fast, deterministic testing.
///
/// Clones share the same data, which lets a test simulate a device restart by
/// building a second session over a clone of the first session's store.
///
/// # Example
///
/// ```
/// use turnstile_testing::InMemoryKeyValueStore;
/// use turnstile_core::key_value::KeyValueStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryKeyValueStore::new();
/// store.put("usedTickets", b"[]").await?;
/// assert!(store.contains_key("usedTickets"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryKeyValueStore {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryKeyValueStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one value
    #[must_use]
    pub fn with_value(key: &str, value: impl Into<Vec<u8>>) -> Self {
        let store = Self::new();
        store.insert(key, value);
        store
    }

    /// Insert a value synchronously (test setup)
    pub fn insert(&self, key: &str, value: impl Into<Vec<u8>>) {
        self.data
            .write()
            .unwrap()
            .insert(key.to_string(), value.into());
    }

    /// Read a value synchronously (test assertions)
    #[must_use]
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.data.read().unwrap().get(key).cloned()
    }

    /// Read a value as UTF-8 text (test assertions)
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        self.value(key)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Check if a key exists in the store
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().unwrap().contains_key(key)
    }

    /// Get the number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().is_empty()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get<'a>(&'a self, key: &'a str) -> KeyValueFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move { Ok(self.value(key)) })
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a [u8]) -> KeyValueFuture<'a, ()> {
        Box::pin(async move {
            self.insert(key, value);
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> KeyValueFuture<'a, ()> {
        Box::pin(async move {
            self.data.write().unwrap().remove(key);
            Ok(())
        })
    }
}

/// Key-value store that fails on demand.
///
/// Wraps an [`InMemoryKeyValueStore`]. While failing, every operation returns
/// [`KeyValueError::Unavailable`] and leaves the inner data untouched.
#[derive(Clone, Debug, Default)]
pub struct FailingKeyValueStore {
    inner: InMemoryKeyValueStore,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    write_attempts: Arc<AtomicUsize>,
}

impl FailingKeyValueStore {
    /// Store whose reads and writes all fail
    #[must_use]
    pub fn always_failing() -> Self {
        let store = Self::default();
        store.set_fail_reads(true);
        store.set_fail_writes(true);
        store
    }

    /// Store that works until switched to failing
    #[must_use]
    pub fn wrapping(inner: InMemoryKeyValueStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Toggle read failures
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Toggle write failures
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `put`/`remove` calls seen, failed or not
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// The wrapped store
    #[must_use]
    pub const fn inner(&self) -> &InMemoryKeyValueStore {
        &self.inner
    }

    fn check_write(&self) -> Result<(), KeyValueError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeyValueError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for FailingKeyValueStore {
    fn get<'a>(&'a self, key: &'a str) -> KeyValueFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(KeyValueError::Unavailable("reads disabled".to_string()));
            }
            self.inner.get(key).await
        })
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a [u8]) -> KeyValueFuture<'a, ()> {
        Box::pin(async move {
            self.check_write()?;
            self.inner.put(key, value).await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> KeyValueFuture<'a, ()> {
        Box::pin(async move {
            self.check_write()?;
            self.inner.remove(key).await
        })
    }
}
