//! Storage layer: a single DuckDB `pharmacies` table plus the
//! create-or-merge reconciliation that feeds it.

mod duck;
mod error;
mod query;
mod reconcile;

pub use duck::DuckStore;
pub use error::StoreError;
pub use query::{ListQuery, Page, Pagination, SortField, SortOrder, Stats};
pub use reconcile::{PharmacyRepo, reconcile};
