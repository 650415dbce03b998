//! Preference store: the in-memory source of truth for one page session.
//!
//! DESIGN
//! ======
//! Every setter is two-phase. The apply phase runs synchronously: state is
//! mutated and the document root updated before the setter returns. The
//! persist phase runs on a spawned task and is reported through the returned
//! `PersistHandle`; dropping the handle makes it fire-and-forget.
//!
//! Persistence is optimistic. A failed write is logged and surfaced through
//! the handle, but the in-memory value is never rolled back.
//!
//! ORDERING
//! ========
//! Each preference kind has a write gate: a sequence number bumped by every
//! setter and an async lock serializing writes. A queued write that is no
//! longer the latest is skipped, so the last value set is always the last
//! value written and the cookie converges to the in-memory state.
//!
//! The state lock is held while the value is stored, the document updated
//! and the sequence number taken, so concurrent setters on cloned handles
//! agree on one order for all three.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::document::{ColorScheme, Document};
use super::http::ApiError;
use super::theme_service::PreferencePersister;
use crate::preference::cookie::parse_preferences;
use crate::preference::{Direction, PreferenceState, ThemeMode};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required collaborator was not supplied to the builder.
    MissingProvider,
}

#[derive(Debug, thiserror::Error)]
#[error("preference store requires a {provider} provider")]
pub struct StoreError {
    kind: ErrorKind,
    provider: &'static str,
}

impl StoreError {
    fn missing(provider: &'static str) -> Self {
        Self { kind: ErrorKind::MissingProvider, provider }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::MissingProvider => "E_MISSING_PROVIDER",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("persist failed: {0}")]
    Api(#[from] ApiError),
    #[error("persist task did not complete: {0}")]
    Task(String),
    #[error("no tokio runtime available to persist the change")]
    NoRuntime,
}

// =============================================================================
// PERSIST HANDLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The server acknowledged the write.
    Persisted,
    /// A newer value was set before this write was sent; nothing was sent.
    Superseded,
}

/// Observable result of the asynchronous persist phase.
pub struct PersistHandle {
    /// `None` when no runtime was available to spawn the write.
    task: Option<JoinHandle<Result<PersistOutcome, ApiError>>>,
}

impl PersistHandle {
    /// Wait for the persist phase to finish.
    ///
    /// # Errors
    ///
    /// Returns the client error of a failed write, a task error if the
    /// persist task panicked or was cancelled, or `NoRuntime` if the setter
    /// ran outside a tokio runtime.
    pub async fn outcome(self) -> Result<PersistOutcome, PersistError> {
        let Some(task) = self.task else {
            return Err(PersistError::NoRuntime);
        };
        match task.await {
            Ok(result) => result.map_err(PersistError::from),
            Err(e) => Err(PersistError::Task(e.to_string())),
        }
    }
}

// =============================================================================
// WRITE GATE
// =============================================================================

#[derive(Default)]
struct WriteGate {
    latest: AtomicU64,
    lock: tokio::sync::Mutex<()>,
}

impl WriteGate {
    fn next(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, seq: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == seq
    }
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Theme(ThemeMode),
    Direction(Direction),
}

impl Change {
    fn gate(self, inner: &Inner) -> &WriteGate {
        match self {
            Self::Theme(_) => &inner.theme_gate,
            Self::Direction(_) => &inner.direction_gate,
        }
    }

    fn field(self) -> &'static str {
        match self {
            Self::Theme(_) => "theme",
            Self::Direction(_) => "direction",
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

struct Inner {
    state: Mutex<PreferenceState>,
    document: Arc<dyn Document>,
    color_scheme: Arc<dyn ColorScheme>,
    persister: Arc<dyn PreferencePersister>,
    theme_gate: WriteGate,
    direction_gate: WriteGate,
}

/// Cheap to clone; clones share state and document.
#[derive(Clone)]
pub struct PreferenceStore {
    inner: Arc<Inner>,
}

impl PreferenceStore {
    #[must_use]
    pub fn builder() -> PreferenceStoreBuilder {
        PreferenceStoreBuilder::default()
    }

    #[must_use]
    pub fn state(&self) -> PreferenceState {
        *self.lock_state()
    }

    #[must_use]
    pub fn theme(&self) -> ThemeMode {
        self.state().theme
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.state().direction
    }

    /// Apply phase only: update state and the root theme class.
    pub fn apply_theme(&self, theme: ThemeMode) {
        let mut state = self.lock_state();
        self.apply_locked(&mut state, Change::Theme(theme));
    }

    /// Apply phase only: update state and the root `dir` attribute.
    pub fn apply_direction(&self, direction: Direction) {
        let mut state = self.lock_state();
        self.apply_locked(&mut state, Change::Direction(direction));
    }

    /// Apply `theme` now and persist it in the background.
    ///
    /// Persisting needs a tokio runtime; without one the value is still
    /// applied and the handle reports `PersistError::NoRuntime`.
    pub fn set_theme(&self, theme: ThemeMode) -> PersistHandle {
        self.commit(Change::Theme(theme))
    }

    /// Apply `direction` now and persist it in the background.
    ///
    /// Persisting needs a tokio runtime; without one the value is still
    /// applied and the handle reports `PersistError::NoRuntime`.
    pub fn set_direction(&self, direction: Direction) -> PersistHandle {
        self.commit(Change::Direction(direction))
    }

    fn apply_locked(&self, state: &mut PreferenceState, change: Change) {
        match change {
            Change::Theme(theme) => {
                state.theme = theme;
                let resolved = theme.resolve(self.inner.color_scheme.prefers_dark());
                self.inner.document.set_theme_class(resolved);
            }
            Change::Direction(direction) => {
                state.direction = direction;
                self.inner.document.set_direction(direction);
            }
        }
    }

    fn commit(&self, change: Change) -> PersistHandle {
        let seq = {
            let mut state = self.lock_state();
            self.apply_locked(&mut state, change);
            change.gate(&self.inner).next()
        };
        self.dispatch(change, seq)
    }

    fn dispatch(&self, change: Change, seq: u64) -> PersistHandle {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(field = change.field(), seq, "no tokio runtime; preference not persisted");
            return PersistHandle { task: None };
        };
        let inner = Arc::clone(&self.inner);

        let task = runtime.spawn(async move {
            let gate = change.gate(&inner);
            let _guard = gate.lock.lock().await;
            if !gate.is_latest(seq) {
                debug!(field = change.field(), seq, "persist skipped; superseded by newer value");
                return Ok(PersistOutcome::Superseded);
            }

            let result = match change {
                Change::Theme(theme) => inner.persister.persist_theme(theme).await,
                Change::Direction(direction) => inner.persister.persist_direction(direction).await,
            };
            match result {
                Ok(()) => Ok(PersistOutcome::Persisted),
                Err(e) => {
                    // EDGE: no rollback; the cookie lags the in-memory value until the next change.
                    error!(
                        field = change.field(),
                        error = %e,
                        status = ?e.status,
                        code = e.error_code(),
                        "failed to persist preference"
                    );
                    Err(e)
                }
            }
        });

        PersistHandle { task: Some(task) }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PreferenceState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// BUILDER
// =============================================================================

#[derive(Default)]
pub struct PreferenceStoreBuilder {
    initial: PreferenceState,
    document: Option<Arc<dyn Document>>,
    color_scheme: Option<Arc<dyn ColorScheme>>,
    persister: Option<Arc<dyn PreferencePersister>>,
}

impl PreferenceStoreBuilder {
    /// Seed values, typically decoded from request cookies.
    #[must_use]
    pub fn initial(mut self, state: PreferenceState) -> Self {
        self.initial = state;
        self
    }

    /// Seed values by decoding a raw `Cookie` header.
    #[must_use]
    pub fn initial_from_cookies(self, header: Option<&str>) -> Self {
        self.initial(parse_preferences(header))
    }

    #[must_use]
    pub fn document(mut self, document: Arc<dyn Document>) -> Self {
        self.document = Some(document);
        self
    }

    #[must_use]
    pub fn color_scheme(mut self, color_scheme: Arc<dyn ColorScheme>) -> Self {
        self.color_scheme = Some(color_scheme);
        self
    }

    #[must_use]
    pub fn persister(mut self, persister: Arc<dyn PreferencePersister>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Build the store and apply the initial state to the document.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::MissingProvider` if any collaborator is absent.
    pub fn build(self) -> Result<PreferenceStore, StoreError> {
        let document = self.document.ok_or_else(|| StoreError::missing("document"))?;
        let color_scheme = self.color_scheme.ok_or_else(|| StoreError::missing("color scheme"))?;
        let persister = self.persister.ok_or_else(|| StoreError::missing("persister"))?;

        let store = PreferenceStore {
            inner: Arc::new(Inner {
                state: Mutex::new(self.initial),
                document,
                color_scheme,
                persister,
                theme_gate: WriteGate::default(),
                direction_gate: WriteGate::default(),
            }),
        };
        store.apply_theme(self.initial.theme);
        store.apply_direction(self.initial.direction);
        Ok(store)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
