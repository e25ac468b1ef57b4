// ── Initial table configuration ──
//
// Seed values consumed once by `activate()`. Everything after
// activation goes through the mutator API; the controller never reads
// this again.

use crate::state::{Criteria, DEFAULT_PAGE_SIZE};

/// Initial configuration for a table controller.
///
/// Built by the consumer and handed to
/// [`activate()`](crate::controller::TableController::activate).
#[derive(Debug, Clone)]
pub struct TableConfig<R> {
    /// Rows per page (minimum 1; lower values are clamped).
    pub page_size: usize,
    /// Criteria applied from the first fetch onward. The staging copy
    /// (`unapplied_filters`) starts empty regardless.
    pub filters: Criteria,
    /// Rows selected before any fetch has run.
    pub selected: Vec<R>,
}

impl<R> Default for TableConfig<R> {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            filters: Criteria::new(),
            selected: Vec::new(),
        }
    }
}
