//! Reactive state controller for paged, filtered, searchable data tables.
//!
//! This crate owns the query state, fetch orchestration, and snapshot
//! caching for one table of rows fetched from an arbitrary async source:
//!
//! - **[`TableController`]** — Central facade over the fetch lifecycle:
//!   [`activate()`](TableController::activate) seeds the initial query
//!   state and runs the first fetch, then mutators
//!   ([`set_page()`](TableController::set_page),
//!   [`set_search()`](TableController::set_search),
//!   [`set_filters()`](TableController::set_filters), ...) drive further
//!   fetch cycles. Resolved queries replay synchronously from an
//!   in-memory snapshot cache; out-of-order responses are discarded by a
//!   per-refresh sequence guard.
//!
//! - **[`TableState`]** — Immutable snapshot of everything a table view
//!   renders from: query coordinates (page, search, filters, sorting),
//!   the result set with its current page slice, loading and error
//!   status, and the selection.
//!
//! - **[`DataSource`]** — The fetch seam. Implement it directly or wrap
//!   an async closure with [`source_fn()`]; return rows bare, in a
//!   `{ data, meta }` envelope, or as raw JSON and the controller
//!   normalizes the shape.
//!
//! - **[`StateStream`]** — Change subscription returned by
//!   [`subscribe()`](TableController::subscribe). Await `changed()` for
//!   each transition, or read `current()` / `latest()` snapshots on
//!   demand.

pub mod config;
pub mod controller;
pub mod error;
pub mod fingerprint;
pub mod source;
pub mod state;
pub mod stream;

mod cache;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::TableConfig;
pub use controller::{ErrorHook, TableController, TableControllerBuilder};
pub use error::{SourceError, TableError};
pub use fingerprint::{Fingerprint, FingerprintFn, QueryKey, SessionKey, default_fingerprint};
pub use source::{DataSource, FnSource, SourcePayload, source_fn};
pub use state::{Criteria, DEFAULT_PAGE_SIZE, Meta, TableState};
pub use stream::{StateStream, StateWatchStream};
