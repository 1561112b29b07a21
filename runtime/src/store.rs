//! The Store: state, reducer and environment behind one handle.
//!
//! Every action goes through the reducer under a write lock, so concurrent
//! callers see a single serial order. Effects returned by the reducer run on
//! spawned tasks. An action produced by an effect is reduced first and then
//! broadcast, so an observer reading state on receipt sees it applied.

use crate::error::StoreError;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, broadcast, watch};
use tracing::Instrument;
use turnstile_core::{effect::Effect, reducer::Reducer};

/// Tuning knobs for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Effect-produced actions buffered per observer before it lags
    pub broadcast_capacity: usize,
    /// Timeout used by [`Store::shutdown_default`]
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Set the observer buffer size.
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the timeout used by [`Store::shutdown_default`].
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Count of running effect tasks, with a signal for reaching zero.
#[derive(Clone)]
struct InFlight {
    count: Arc<AtomicUsize>,
    idle: Arc<watch::Sender<()>>,
}

impl InFlight {
    fn new() -> Self {
        let (idle, _) = watch::channel(());
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(idle),
        }
    }

    fn pending(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Register one task. The returned guard releases it on drop, panics included.
    fn enter(&self) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard(self.clone())
    }

    async fn wait_idle(&self) {
        // Subscribe before reading the count so a release in between still wakes us.
        let mut idle = self.idle.subscribe();
        while self.pending() > 0 {
            if idle.changed().await.is_err() {
                break;
            }
        }
    }
}

struct InFlightGuard(InFlight);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.send_replace(());
        }
    }
}

/// Tracks the effects started by one [`Store::send`] call.
///
/// Only effects returned for that action are counted. Work triggered by
/// actions those effects feed back is tracked by the Store as a whole.
///
/// ```ignore
/// let handle = store.send(CheckinAction::manual("A1")).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    in_flight: InFlight,
}

impl EffectHandle {
    /// A handle with nothing to wait for.
    #[must_use]
    pub fn completed() -> Self {
        Self {
            in_flight: InFlight::new(),
        }
    }

    /// Effects still running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.in_flight.pending()
    }

    /// Wait until every tracked effect has finished.
    pub async fn wait(&self) {
        self.in_flight.wait_idle().await;
    }

    /// [`wait`](Self::wait), bounded.
    ///
    /// # Errors
    ///
    /// [`StoreError::Timeout`] if effects are still running after `timeout`.
    pub async fn wait_with_timeout(&self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Runtime for one reducer.
///
/// Clones share state, environment and the shutdown flag.
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: R,
    environment: E,
    closing: Arc<AtomicBool>,
    in_flight: InFlight,
    default_shutdown_timeout: Duration,
    observers: broadcast::Sender<A>,
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Store with [`StoreConfig::default`].
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_config(initial_state, reducer, environment, StoreConfig::default())
    }

    /// Store with explicit tuning.
    #[must_use]
    pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
        let (observers, _) = broadcast::channel(config.broadcast_capacity.max(1));

        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer,
            environment,
            closing: Arc::new(AtomicBool::new(false)),
            in_flight: InFlight::new(),
            default_shutdown_timeout: config.default_shutdown_timeout,
            observers,
        }
    }

    /// The injected environment.
    #[must_use]
    pub const fn environment(&self) -> &E {
        &self.environment
    }

    /// Stop accepting actions and wait for running effects.
    ///
    /// Calling it again is harmless. Actions that effects produce after this
    /// point are dropped.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownTimeout`] with the number of effects still
    /// running when `timeout` expires.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.closing.store(true, Ordering::Release);
        tracing::info!(pending = self.in_flight.pending(), "Shutting down store");
        metrics::counter!("store.shutdown.initiated").increment(1);

        if tokio::time::timeout(timeout, self.in_flight.wait_idle()).await.is_ok() {
            tracing::info!("Store drained");
            metrics::counter!("store.shutdown.completed").increment(1);
            return Ok(());
        }

        let pending = self.in_flight.pending();
        tracing::error!(pending, "Shutdown timed out");
        metrics::counter!("store.shutdown.timeout").increment(1);
        Err(StoreError::ShutdownTimeout(pending))
    }

    /// [`shutdown`](Self::shutdown) with the configured default timeout.
    ///
    /// # Errors
    ///
    /// See [`shutdown`](Self::shutdown).
    pub async fn shutdown_default(&self) -> Result<(), StoreError> {
        self.shutdown(self.default_shutdown_timeout).await
    }

    /// Reduce `action` and start its effects.
    ///
    /// Returns once the effects are started, not finished. Concurrent sends
    /// are serialized at the reducer.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once shutdown has begun.
    #[tracing::instrument(skip_all, name = "store_send")]
    pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
        if self.closing.load(Ordering::Acquire) {
            tracing::warn!("Rejected action during shutdown");
            metrics::counter!("store.shutdown.rejected_actions").increment(1);
            return Err(StoreError::ShutdownInProgress);
        }
        metrics::counter!("store.commands.total").increment(1);

        let effects = {
            let mut state = self.state.write().await;
            let _reducing = tracing::debug_span!("reduce").entered();
            let started = Instant::now();
            let effects = self.reducer.reduce(&mut *state, action, &self.environment);
            metrics::histogram!("store.reducer.duration_seconds")
                .record(started.elapsed().as_secs_f64());
            effects
        };
        tracing::trace!(effects = effects.len(), "Reduced action");

        let handle = EffectHandle::completed();
        for effect in effects {
            self.run(effect, &handle.in_flight);
        }
        Ok(handle)
    }

    /// Send `action`, then wait for the first effect-produced action that
    /// matches `predicate`.
    ///
    /// The subscription is taken before sending, so an effect that finishes
    /// immediately is still observed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ShutdownInProgress`] if the Store is shutting down
    /// - [`StoreError::Timeout`] if nothing matched within `timeout`
    /// - [`StoreError::ChannelClosed`] if the broadcast channel closed
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        let mut observed = self.observers.subscribe();
        self.send(action).await?;

        let matching = async {
            loop {
                match observed.recv().await {
                    Ok(action) if predicate(&action) => break Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Observer lagged behind effect actions");
                    },
                    Err(broadcast::error::RecvError::Closed) => break Err(StoreError::ChannelClosed),
                }
            }
        };

        tokio::time::timeout(timeout, matching)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Observe actions produced by effects.
    ///
    /// Actions passed to [`send`](Self::send) directly are not included.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.observers.subscribe()
    }

    /// Read state through a closure.
    ///
    /// ```ignore
    /// let used = store.state(|s| s.validator.used_count()).await;
    /// ```
    pub async fn state<F, T>(&self, read: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        read(&*self.state.read().await)
    }

    async fn feed_back(&self, action: A) {
        if let Err(error) = self.send(action.clone()).await {
            tracing::debug!(%error, "Dropped effect-produced action");
        }
        // No observers is fine.
        let _ = self.observers.send(action);
    }

    /// Spawn `task`, counted by both `owner` and the Store.
    fn spawn_counted<F>(&self, owner: &InFlight, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guards = (owner.enter(), self.in_flight.enter());
        tokio::spawn(
            async move {
                let _guards = guards;
                task.await;
            }
            .instrument(tracing::debug_span!("effect")),
        );
    }

    /// Start one effect. Failures and panics stay inside the effect's task.
    fn run(&self, effect: Effect<A>, owner: &InFlight) {
        match effect {
            Effect::None => {},
            Effect::Future(work) => {
                metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                let store = self.clone();
                self.spawn_counted(owner, async move {
                    if let Some(action) = work.await {
                        store.feed_back(action).await;
                    }
                });
            },
            Effect::Delay { duration, action } => {
                metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                let store = self.clone();
                self.spawn_counted(owner, async move {
                    tokio::time::sleep(duration).await;
                    store.feed_back(*action).await;
                });
            },
            Effect::Parallel(effects) => {
                metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                for effect in effects {
                    self.run(effect, owner);
                }
            },
            Effect::Sequential(effects) => {
                metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);
                let store = self.clone();
                self.spawn_counted(owner, async move {
                    for effect in effects {
                        let step = InFlight::new();
                        store.run(effect, &step);
                        step.wait_idle().await;
                    }
                });
            },
        }
    }
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: self.reducer.clone(),
            environment: self.environment.clone(),
            closing: Arc::clone(&self.closing),
            in_flight: self.in_flight.clone(),
            default_shutdown_timeout: self.default_shutdown_timeout,
            observers: self.observers.clone(),
        }
    }
}
