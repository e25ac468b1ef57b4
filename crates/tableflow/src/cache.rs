// ── Snapshot cache ──
//
// Fingerprint-keyed storage for resolved fetch results. Each controller
// owns exactly one cache: created empty, grows monotonically, dropped
// with the controller.

use std::sync::Arc;

use dashmap::DashMap;

use crate::fingerprint::Fingerprint;
use crate::state::{Criteria, Meta, TableState, page_slice};

/// The state fields captured when a fetch resolves.
///
/// `sorting`, `selected`, and `error` are absent on purpose: replaying a
/// snapshot replaces the fetch-derived fields and leaves those live
/// fields exactly as they are.
#[derive(Debug, Clone)]
pub(crate) struct StateSnapshot<R> {
    pub data: Arc<Vec<R>>,
    pub page_data: Arc<Vec<R>>,
    pub meta: Meta,
    pub unapplied_filters: Criteria,
    pub page: usize,
    pub page_size: usize,
    pub search: String,
    pub filters: Criteria,
    pub first_page: bool,
    pub is_empty: bool,
    pub is_loading: bool,
}

impl<R: Clone> StateSnapshot<R> {
    /// Capture the cacheable fields of a resolved state.
    ///
    /// `is_loading` is stored as `false` unconditionally: a loading state
    /// is never cached.
    pub(crate) fn capture(state: &TableState<R>) -> Self {
        Self {
            data: Arc::clone(&state.data),
            page_data: Arc::clone(&state.page_data),
            meta: state.meta.clone(),
            unapplied_filters: state.unapplied_filters.clone(),
            page: state.page,
            page_size: state.page_size,
            search: state.search.clone(),
            filters: state.filters.clone(),
            first_page: state.first_page,
            is_empty: state.is_empty,
            is_loading: false,
        }
    }

    /// The snapshot a fetch would have produced had it been applied:
    /// resolution fields from the batch, query coordinates from the state
    /// captured when the request was issued.
    ///
    /// Used for stale responses, which may no longer touch live state but
    /// remain valid for their own query.
    pub(crate) fn resolved(request: &TableState<R>, data: Arc<Vec<R>>, meta: Meta) -> Self {
        let page_data = Arc::new(page_slice(&data, request.page, request.page_size));
        let is_empty = data.is_empty();
        Self {
            data,
            page_data,
            meta,
            unapplied_filters: request.unapplied_filters.clone(),
            page: request.page,
            page_size: request.page_size,
            search: request.search.clone(),
            filters: request.filters.clone(),
            first_page: request.page == 0,
            is_empty,
            is_loading: false,
        }
    }

    /// Overlay this snapshot onto `live`, producing the replayed state.
    pub(crate) fn restore(&self, live: &TableState<R>) -> TableState<R> {
        TableState {
            page: self.page,
            page_size: self.page_size,
            search: self.search.clone(),
            filters: self.filters.clone(),
            unapplied_filters: self.unapplied_filters.clone(),
            sorting: live.sorting.clone(),
            data: Arc::clone(&self.data),
            page_data: Arc::clone(&self.page_data),
            meta: self.meta.clone(),
            selected: Arc::clone(&live.selected),
            is_loading: self.is_loading,
            is_empty: self.is_empty,
            first_page: self.first_page,
            error: live.error.clone(),
        }
    }
}

/// Fingerprint-keyed cache of resolved fetch results.
///
/// Concurrent map so overlapping fetches can store without coordination;
/// only the owning controller ever touches it.
pub(crate) struct SnapshotCache<R> {
    entries: DashMap<Fingerprint, StateSnapshot<R>>,
}

impl<R: Clone + Send + Sync + 'static> SnapshotCache<R> {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub(crate) fn get(&self, fingerprint: &Fingerprint) -> Option<StateSnapshot<R>> {
        self.entries.get(fingerprint).map(|r| r.value().clone())
    }

    pub(crate) fn insert(&self, fingerprint: Fingerprint, snapshot: StateSnapshot<R>) {
        self.entries.insert(fingerprint, snapshot);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
