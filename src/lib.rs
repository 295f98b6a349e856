//! Client-side table view-model for roster screens.
//!
//! A [`view::TableViewModel`] owns the screen-local search text, filter
//! selections, sort key and page, and projects a record collection into one
//! display-ready page:
//!
//! 1. free-text search over reference, name and derived label fields,
//! 2. per-dimension filtering (AND across dimensions, OR within one),
//! 3. a stable sort by field or derived column,
//! 4. page windowing with the page clamped into range.
//!
//! Entity screens differ only in their [`schema::TableSchema`]. The terminal
//! viewer in `main.rs` drives the same view-model from key presses.

pub mod controller;
pub mod domain;
pub mod filter;
pub mod inputter;
pub mod loader;
pub mod model;
pub mod paginate;
pub mod record;
pub mod schema;
pub mod search;
pub mod sort;
pub mod ui;
pub mod view;

#[cfg(test)]
mod properties;

pub use record::{Auxiliary, FieldValue, Record, RecordId};
pub use schema::TableSchema;
pub use sort::SortDirection;
pub use view::{Projection, TableViewModel, ViewAction, ViewState, project};
