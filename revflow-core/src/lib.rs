//! Shared storage layer for revflow.
//!
//! A single WAL-mode SQLite database holds the per-PR context cache, the review
//! comments with their triage status, and saved review patterns. All access is
//! async through `tokio_rusqlite`, one background connection per process.

pub mod comments;
pub mod context;
pub mod db;
pub mod error;
pub mod patterns;
pub mod schema;
pub mod types;

pub use error::StoreError;
