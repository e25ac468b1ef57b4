// ── Table controller ──
//
// Orchestrates the fetch cycle for one table: decides cache hit vs
// miss, reconciles resolved batches into live state, guards against
// stale responses, and publishes every transition through a watch
// channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::cache::{SnapshotCache, StateSnapshot};
use crate::config::TableConfig;
use crate::error::TableError;
use crate::fingerprint::{Fingerprint, FingerprintFn, QueryKey, SessionKey, default_fingerprint};
use crate::source::{DataSource, ResolvedBatch};
use crate::state::{Criteria, TableState};
use crate::stream::StateStream;

/// Hook invoked on every fetch failure, including stale ones.
///
/// A side channel only: the failure also lands in `TableState::error`
/// when the failing refresh is still the newest.
pub type ErrorHook = dyn Fn(&TableError) + Send + Sync;

// ── TableController ─────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Owns the query state,
/// the snapshot cache, and the fetch cycle; consumers mutate through
/// the methods here and observe through [`state()`](Self::state) or
/// [`subscribe()`](Self::subscribe).
pub struct TableController<R: Clone + Send + Sync + 'static> {
    inner: Arc<ControllerInner<R>>,
}

impl<R: Clone + Send + Sync + 'static> Clone for TableController<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ControllerInner<R: Clone + Send + Sync + 'static> {
    source: Arc<dyn DataSource<R>>,
    /// Cache key function, replaceable at build time.
    fingerprint: Arc<FingerprintFn>,
    on_error: Arc<ErrorHook>,
    /// Mixed into every fingerprint to keep this controller's cache
    /// entries apart from any other instance's.
    session_key: SessionKey,
    /// Optional upper bound on a single fetch.
    fetch_deadline: Option<Duration>,
    /// Live state, published on every transition.
    state: watch::Sender<Arc<TableState<R>>>,
    cache: SnapshotCache<R>,
    /// Stamped at the start of every refresh; strictly increasing.
    refresh_seq: AtomicU64,
    /// Highest generation whose result has been applied to live state.
    applied_seq: AtomicU64,
    /// Set once by `activate()`.
    activated: AtomicBool,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl<R> TableController<R>
where
    R: Clone + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a controller with the default fingerprint and error hook.
    ///
    /// Construction does not fetch; [`activate()`](Self::activate) seeds
    /// the initial query state and runs the first fetch.
    pub fn new(source: impl DataSource<R> + 'static) -> Self {
        Self::builder(source).build()
    }

    /// Start building a controller with custom wiring.
    pub fn builder(source: impl DataSource<R> + 'static) -> TableControllerBuilder<R> {
        TableControllerBuilder {
            source: Arc::new(source),
            fingerprint: None,
            on_error: None,
            fetch_deadline: None,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Seed the initial query state and run the first fetch.
    ///
    /// A controller activates at most once; repeat calls are ignored
    /// with a warning.
    pub async fn activate(&self, config: TableConfig<R>) {
        if self.inner.activated.swap(true, Ordering::AcqRel) {
            warn!("controller already activated, ignoring");
            return;
        }

        if config.page_size == 0 {
            warn!("configured page_size 0 clamped to 1");
        }
        let page_size = config.page_size.max(1);

        self.transition(move |state| {
            TableState {
                page_size,
                filters: config.filters,
                selected: Arc::new(config.selected),
                ..state.clone()
            }
            .derived()
        });
        debug!(page_size, "controller activated");

        self.run_refresh().await;
    }

    /// Whether [`activate()`](Self::activate) has run.
    pub fn is_activated(&self) -> bool {
        self.inner.activated.load(Ordering::Acquire)
    }

    // ── State observation ────────────────────────────────────────────

    /// Current state snapshot (cheap `Arc` clone).
    pub fn state(&self) -> Arc<TableState<R>> {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> StateStream<R> {
        StateStream::new(self.inner.state.subscribe())
    }

    /// The isolation key mixed into this controller's fingerprints.
    pub fn session_key(&self) -> SessionKey {
        self.inner.session_key
    }

    /// When the last applied fetch resolved, or `None` before the first.
    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_refresh.borrow()
    }

    /// Number of snapshots currently cached.
    pub fn cache_size(&self) -> usize {
        self.inner.cache.len()
    }

    // ── Mutators (refresh-triggering) ────────────────────────────────

    /// Set the search term and reset to the first page.
    pub async fn set_search(&self, search: impl Into<String>) {
        let search = search.into();
        self.transition(move |state| {
            TableState {
                page: 0,
                search,
                ..state.clone()
            }
            .derived()
        });
        self.run_refresh().await;
    }

    /// Jump to a page (zero-based).
    pub async fn set_page(&self, page: usize) {
        self.transition(move |state| TableState { page, ..state.clone() }.derived());
        self.run_refresh().await;
    }

    /// Change rows-per-page. Values below 1 are clamped.
    pub async fn set_page_size(&self, page_size: usize) {
        if page_size == 0 {
            warn!("page_size 0 clamped to 1");
        }
        let page_size = page_size.max(1);
        self.transition(move |state| {
            TableState {
                page_size,
                ..state.clone()
            }
            .derived()
        });
        self.run_refresh().await;
    }

    /// Replace the sort descriptor.
    pub async fn set_sorting(&self, sorting: Criteria) {
        self.transition(move |state| TableState { sorting, ..state.clone() }.derived());
        self.run_refresh().await;
    }

    /// Replace the applied filters (and their staging copy) and reset to
    /// the first page.
    ///
    /// With `clear_data` the current result set is dropped before the
    /// fetch, so consumers render an empty table instead of rows from
    /// the previous criteria while the new ones load.
    pub async fn set_filters(&self, filters: Criteria, clear_data: bool) {
        self.transition(move |state| {
            let mut next = TableState {
                page: 0,
                filters: filters.clone(),
                unapplied_filters: filters,
                ..state.clone()
            };
            if clear_data {
                next.data = Arc::new(Vec::new());
            }
            next.derived()
        });
        self.run_refresh().await;
    }

    /// Copy the staged filters into the applied set and fetch once.
    pub async fn apply_filters(&self) {
        let staged = self.state().unapplied_filters.clone();
        self.set_filters(staged, false).await;
    }

    /// Re-run the fetch cycle for the current query state.
    pub async fn refresh(&self) {
        self.run_refresh().await;
    }

    // ── Mutators (staging / selection, no fetch) ─────────────────────

    /// Stage filter edits without fetching.
    /// [`apply_filters()`](Self::apply_filters) makes them live.
    pub fn set_unapplied_filters(&self, filters: Criteria) {
        self.transition(move |state| {
            TableState {
                unapplied_filters: filters,
                ..state.clone()
            }
            .derived()
        });
    }

    /// Replace the selection. Never triggers a fetch.
    pub fn set_selected(&self, rows: Vec<R>) {
        self.transition(move |state| {
            TableState {
                selected: Arc::new(rows),
                ..state.clone()
            }
            .derived()
        });
    }

    /// Select every row of the current result set, or clear the
    /// selection if everything is already selected.
    pub fn toggle_select_all(&self) {
        self.transition(|state| {
            let selected = if state.selected.len() == state.data.len() {
                Arc::new(Vec::new())
            } else {
                Arc::clone(&state.data)
            };
            TableState { selected, ..state.clone() }.derived()
        });
    }

    // ── Fetch orchestration ──────────────────────────────────────────

    /// Run one refresh generation: fingerprint the current query, replay
    /// from cache on a hit, otherwise fetch, normalize, and reconcile.
    async fn run_refresh(&self) {
        let seq = self.inner.refresh_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let request_state = self.state();
        let fingerprint = self.fingerprint_for(&request_state);

        if let Some(snapshot) = self.inner.cache.get(&fingerprint) {
            debug!(fingerprint = %fingerprint, seq, "cache hit");
            if self.claim(seq) {
                self.transition(|live| snapshot.restore(live));
            }
            return;
        }

        debug!(fingerprint = %fingerprint, seq, "cache miss");
        let loading = self.transition(|state| TableState {
            is_loading: true,
            error: None,
            ..state.clone()
        });

        match self.fetch_batch(loading).await {
            Ok(batch) => {
                let data = Arc::new(batch.rows);
                let meta = batch.meta;
                if self.claim(seq) {
                    // Slice against the page coordinates current at
                    // resolution time, not request time.
                    let resolved = self.transition(move |state| {
                        TableState {
                            data,
                            meta,
                            is_loading: false,
                            error: None,
                            ..state.clone()
                        }
                        .derived()
                    });
                    debug!(
                        fingerprint = %fingerprint,
                        seq,
                        rows = resolved.data.len(),
                        "fetch applied"
                    );
                    self.inner
                        .cache
                        .insert(fingerprint, StateSnapshot::capture(&resolved));
                    // No receiver is ever held on this channel, and
                    // send() drops the value without one.
                    self.inner.last_refresh.send_replace(Some(Utc::now()));
                } else {
                    // Superseded by a newer generation, but the result
                    // is still valid for its own query.
                    debug!(fingerprint = %fingerprint, seq, "stale fetch cached, state untouched");
                    self.inner.cache.insert(
                        fingerprint,
                        StateSnapshot::resolved(&request_state, data, meta),
                    );
                }
            }
            Err(error) => {
                (self.inner.on_error)(&error);
                if self.claim(seq) {
                    debug!(seq, "fetch failed, error published");
                    self.transition(move |state| TableState {
                        is_loading: false,
                        error: Some(error),
                        ..state.clone()
                    });
                } else {
                    debug!(seq, "stale fetch failure discarded");
                }
            }
        }
    }

    /// Call the source (bounded by the configured deadline, if any) and
    /// normalize its payload.
    async fn fetch_batch(
        &self,
        state: Arc<TableState<R>>,
    ) -> Result<ResolvedBatch<R>, TableError> {
        let fetched = match self.inner.fetch_deadline {
            Some(deadline) => timeout(deadline, self.inner.source.fetch(state))
                .await
                .map_err(|_| TableError::Timeout { deadline })?,
            None => self.inner.source.fetch(state).await,
        };

        match fetched {
            Ok(payload) => payload.normalize(),
            Err(err) => Err(TableError::from(err)),
        }
    }

    /// Claim a refresh generation for state application.
    ///
    /// Returns `true` only while `seq` is still the newest generation
    /// stamped and nothing newer has already published. An older
    /// in-flight response must not touch live state even when it
    /// resolves before the newer one; the atomic max keeps the
    /// discipline monotonic across out-of-order resolutions.
    fn claim(&self, seq: u64) -> bool {
        seq == self.inner.refresh_seq.load(Ordering::Acquire)
            && self.inner.applied_seq.fetch_max(seq, Ordering::AcqRel) < seq
    }

    fn fingerprint_for(&self, state: &TableState<R>) -> Fingerprint {
        let key = QueryKey {
            meta: &state.meta,
            page: state.page,
            page_size: state.page_size,
            search: &state.search,
            filters: &state.filters,
            sorting: &state.sorting,
            session: self.inner.session_key,
        };
        (self.inner.fingerprint)(&key)
    }

    /// Publish the state produced by `f` and return it.
    ///
    /// `send_modify` gives exclusive access to the current snapshot, so
    /// a transition is atomic with respect to every other mutator.
    fn transition<F>(&self, f: F) -> Arc<TableState<R>>
    where
        F: FnOnce(&TableState<R>) -> TableState<R>,
    {
        let mut published = None;
        self.inner.state.send_modify(|current| {
            let next = Arc::new(f(current));
            *current = Arc::clone(&next);
            published = Some(next);
        });
        published.unwrap_or_else(|| self.inner.state.borrow().clone())
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// Builder for [`TableController`] wiring: fingerprint function, error
/// hook, and fetch deadline.
pub struct TableControllerBuilder<R: Clone + Send + Sync + 'static> {
    source: Arc<dyn DataSource<R>>,
    fingerprint: Option<Arc<FingerprintFn>>,
    on_error: Option<Arc<ErrorHook>>,
    fetch_deadline: Option<Duration>,
}

impl<R> TableControllerBuilder<R>
where
    R: Clone + DeserializeOwned + Send + Sync + 'static,
{
    /// Replace the default fingerprint function.
    pub fn fingerprint(
        mut self,
        f: impl Fn(&QueryKey<'_>) -> Fingerprint + Send + Sync + 'static,
    ) -> Self {
        self.fingerprint = Some(Arc::new(f));
        self
    }

    /// Replace the default error hook (a `tracing` error event).
    pub fn on_error(mut self, hook: impl Fn(&TableError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Abort fetches that outlive `deadline`.
    pub fn fetch_deadline(mut self, deadline: Duration) -> Self {
        self.fetch_deadline = Some(deadline);
        self
    }

    pub fn build(self) -> TableController<R> {
        let (state, _) = watch::channel(Arc::new(TableState::default()));
        let (last_refresh, _) = watch::channel(None);

        TableController {
            inner: Arc::new(ControllerInner {
                source: self.source,
                fingerprint: self
                    .fingerprint
                    .unwrap_or_else(|| Arc::new(default_fingerprint)),
                on_error: self.on_error.unwrap_or_else(|| Arc::new(default_error_hook)),
                session_key: SessionKey::generate(),
                fetch_deadline: self.fetch_deadline,
                state,
                cache: SnapshotCache::new(),
                refresh_seq: AtomicU64::new(0),
                applied_seq: AtomicU64::new(0),
                activated: AtomicBool::new(false),
                last_refresh,
            }),
        }
    }
}

fn default_error_hook(error: &TableError) {
    error!(%error, "table fetch failed");
}
