//! Vaultfetch Core Library
//!
//! Mirrors the documents stored under a provider's folder in a document
//! vault to local disk, re-downloading only what changed.
//!
//! # Architecture
//!
//! - [`config`] - Explicit session configuration and the config file parser
//! - [`api`] - Token exchange, document search and file streaming
//! - [`materialize`] - Local path planning and idempotent file writes
//! - [`sync`] - The sequential search-then-download run loop

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod materialize;
pub mod sync;
mod user_agent;

// Re-export commonly used types
pub use api::{ApiError, Document, DocumentSource, RequestOptions, RetryPolicy, VaultSession};
pub use config::{FileConfig, VaultConfig, load_config};
pub use materialize::{ByteStream, MaterializeError, MaterializeOutcome, Materializer};
pub use sync::{DocumentStatus, SyncError, SyncOptions, SyncStats, sync_provider};
