//! Dataset ingestion: CSV loading, validation, and cleaning.
//!
//! The loader runs before any agent is constructed, so a malformed dataset
//! fails the run without a single LLM call being made.

mod loader;

pub use loader::{DataError, DataLoader, SAMPLE_DATASET};
