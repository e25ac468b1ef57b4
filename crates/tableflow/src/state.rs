// ── Table state ──
//
// The single aggregate consumers observe. The controller publishes a
// fresh `Arc<TableState<R>>` through a watch channel on every
// transition; a published state is never mutated in place.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::TableError;

/// Filter or sorting criteria, keyed by column or field name.
///
/// `serde_json::Map` keeps keys sorted, so structurally equal criteria
/// serialize identically regardless of insertion order.
pub type Criteria = Map<String, Value>;

/// Result metadata reported by the data source (`count`, cursors, ...).
pub type Meta = Map<String, Value>;

/// Rows per page when no explicit page size is configured.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One immutable view of a table: the query coordinates, the rows
/// fetched for them, and everything derived from both.
#[derive(Debug, Clone)]
pub struct TableState<R> {
    /// Zero-based page index.
    pub page: usize,
    /// Rows per page, always >= 1.
    pub page_size: usize,
    /// Free-text search term.
    pub search: String,
    /// Criteria applied to fetches.
    pub filters: Criteria,
    /// Staged criteria, edited by filter UIs but not yet applied.
    pub unapplied_filters: Criteria,
    /// Sort descriptor, passed through to the source verbatim.
    pub sorting: Criteria,
    /// Full result set of the last successful fetch.
    pub data: Arc<Vec<R>>,
    /// The slice of `data` covering the current page.
    pub page_data: Arc<Vec<R>>,
    /// Source-reported metadata.
    pub meta: Meta,
    /// Rows currently selected. Never touched by the fetch cycle.
    pub selected: Arc<Vec<R>>,
    pub is_loading: bool,
    pub is_empty: bool,
    pub first_page: bool,
    /// Most recent fetch failure, cleared when the next fetch starts.
    pub error: Option<TableError>,
}

impl<R> Default for TableState<R> {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            search: String::new(),
            filters: Criteria::new(),
            unapplied_filters: Criteria::new(),
            sorting: Criteria::new(),
            data: Arc::new(Vec::new()),
            page_data: Arc::new(Vec::new()),
            meta: Meta::new(),
            selected: Arc::new(Vec::new()),
            is_loading: false,
            is_empty: true,
            first_page: true,
            error: None,
        }
    }
}

impl<R: Clone> TableState<R> {
    /// Recompute every field derived from `data`, `page`, and `page_size`.
    ///
    /// Each transition funnels through this, so `page_data`, `is_empty`,
    /// and `first_page` can never drift from the fields they derive from.
    pub(crate) fn derived(mut self) -> Self {
        self.page_data = Arc::new(page_slice(&self.data, self.page, self.page_size));
        self.is_empty = self.data.is_empty();
        self.first_page = self.page == 0;
        self
    }
}

/// The sub-slice of `data` covering `page`, clamped to bounds.
///
/// A page beyond the end of the data yields an empty slice.
pub(crate) fn page_slice<R: Clone>(data: &[R], page: usize, page_size: usize) -> Vec<R> {
    let start = page.saturating_mul(page_size).min(data.len());
    let end = start.saturating_add(page_size).min(data.len());
    data[start..end].to_vec()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::{DEFAULT_PAGE_SIZE, TableState, page_slice};

    #[test]
    fn defaults_are_empty_first_page() {
        let state: TableState<u32> = TableState::default();
        assert_eq!(state.page, 0);
        assert_eq!(state.page_size, DEFAULT_PAGE_SIZE);
        assert!(state.is_empty);
        assert!(state.first_page);
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn page_slice_covers_interior_page() {
        let data: Vec<u32> = (0..25).collect();
        assert_eq!(page_slice(&data, 0, 10), (0..10).collect::<Vec<_>>());
        assert_eq!(page_slice(&data, 1, 10), (10..20).collect::<Vec<_>>());
    }

    #[test]
    fn page_slice_clamps_final_page() {
        let data: Vec<u32> = (0..25).collect();
        assert_eq!(page_slice(&data, 2, 10), (20..25).collect::<Vec<_>>());
    }

    #[test]
    fn page_slice_beyond_end_is_empty() {
        let data: Vec<u32> = (0..25).collect();
        assert!(page_slice(&data, 5, 10).is_empty());
    }

    #[test]
    fn derived_recomputes_page_data_and_flags() {
        let state = TableState {
            page: 2,
            page_size: 10,
            data: Arc::new((0..25).collect()),
            ..TableState::default()
        }
        .derived();

        assert_eq!(*state.page_data, (20..25).collect::<Vec<u32>>());
        assert!(!state.is_empty);
        assert!(!state.first_page);
    }

    #[test]
    fn derived_flags_empty_data() {
        let state = TableState::<u32> {
            page: 0,
            data: Arc::new(Vec::new()),
            ..TableState::default()
        }
        .derived();

        assert!(state.page_data.is_empty());
        assert!(state.is_empty);
        assert!(state.first_page);
    }
}
