//! Local persistence of the used set.
//!
//! - [`FileKeyValueStore`]: one file per key in a data directory
//! - [`UsedTicketRepository`]: the used set as a JSON list under [`USED_TICKETS_KEY`]
//!
//! Writes carry a revision number. Effects may finish out of order, so a
//! write older than the last one applied is skipped instead of clobbering a
//! newer snapshot.

use crate::error::PersistenceError;
use crate::types::TicketCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use turnstile_core::key_value::{KeyValueError, KeyValueFuture, KeyValueStore};
use turnstile_runtime::retry::{retry_with_predicate, RetryPolicy};

/// Key under which the used set is stored
pub const USED_TICKETS_KEY: &str = "usedTickets";

// ============================================================================
// File-backed key-value store
// ============================================================================

/// Key-value store keeping each key in its own file
///
/// Values are written to a temporary file and renamed into place, so a
/// reader never sees a half-written value.
#[derive(Clone, Debug)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The data directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, KeyValueError> {
        let acceptable = !key.is_empty()
            && key != "."
            && key != ".."
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if acceptable {
            Ok(self.dir.join(key))
        } else {
            Err(KeyValueError::InvalidKey(key.to_string()))
        }
    }
}

fn io_error(context: &str, path: &Path, err: &std::io::Error) -> KeyValueError {
    KeyValueError::Io(format!("{context} {}: {err}", path.display()))
}

impl KeyValueStore for FileKeyValueStore {
    fn get<'a>(&'a self, key: &'a str) -> KeyValueFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(io_error("read", &path, &err)),
            }
        })
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a [u8]) -> KeyValueFuture<'a, ()> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|err| io_error("create", &self.dir, &err))?;

            let staging = self.dir.join(format!(".{key}.tmp"));
            tokio::fs::write(&staging, value)
                .await
                .map_err(|err| io_error("write", &staging, &err))?;
            tokio::fs::rename(&staging, &path)
                .await
                .map_err(|err| io_error("rename", &path, &err))
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> KeyValueFuture<'a, ()> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(io_error("remove", &path, &err)),
            }
        })
    }
}

// ============================================================================
// Used-ticket repository
// ============================================================================

/// Loads and saves the used set
#[derive(Clone)]
pub struct UsedTicketRepository {
    store: Arc<dyn KeyValueStore>,
    policy: RetryPolicy,
    // Revision of the last write applied to the store.
    applied: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for UsedTicketRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsedTicketRepository")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl UsedTicketRepository {
    /// Repository over `store`, retrying failed writes per `policy`
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            applied: Arc::new(Mutex::new(0)),
        }
    }

    /// Read the persisted list
    ///
    /// A missing key is an empty list. Reads are not retried.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Store`] if the store fails and
    /// [`PersistenceError::Malformed`] if the value is not a JSON list of strings.
    pub async fn load(&self) -> Result<Vec<String>, PersistenceError> {
        let Some(bytes) = self.store.get(USED_TICKETS_KEY).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_slice(&bytes).map_err(|err| PersistenceError::Malformed(err.to_string()))
    }

    /// Write `codes` as revision `revision`
    ///
    /// Returns `false` when a newer revision was already written and this one
    /// was skipped.
    ///
    /// # Errors
    ///
    /// Returns the last store error once retries are exhausted.
    #[tracing::instrument(skip(self, codes), fields(count = codes.len()))]
    pub async fn save(&self, revision: u64, codes: &[TicketCode]) -> Result<bool, PersistenceError> {
        let bytes = serde_json::to_vec(codes)
            .map_err(|err| PersistenceError::Malformed(err.to_string()))?;

        let store = &self.store;
        let bytes = bytes.as_slice();
        self.apply(revision, move || async move {
            store.put(USED_TICKETS_KEY, bytes).await.map_err(PersistenceError::from)
        })
        .await
    }

    /// Remove the persisted list as revision `revision`
    ///
    /// # Errors
    ///
    /// Returns the last store error once retries are exhausted.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, revision: u64) -> Result<bool, PersistenceError> {
        let store = &self.store;
        self.apply(revision, move || async move {
            store.remove(USED_TICKETS_KEY).await.map_err(PersistenceError::from)
        })
        .await
    }

    async fn apply<F, Fut>(&self, revision: u64, operation: F) -> Result<bool, PersistenceError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), PersistenceError>>,
    {
        let mut applied = self.applied.lock().await;
        if revision <= *applied {
            tracing::debug!(revision, applied = *applied, "Skipping stale used-ticket write");
            return Ok(false);
        }

        retry_with_predicate(self.policy.clone(), operation, PersistenceError::is_transient).await?;
        *applied = revision;
        Ok(true)
    }
}
