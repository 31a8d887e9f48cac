//! Thin typed client for the vault REST API.
//!
//! Only the three calls a mirror needs are covered:
//!
//! - OAuth client-credentials token exchange ([`auth`])
//! - document search with folder-path filters ([`VaultSession::search_all_documents`])
//! - streaming a revision's attached file ([`VaultSession::get_file_stream`])
//!
//! # Example
//!
//! ```no_run
//! use vaultfetch_core::api::{RequestOptions, VaultSession, folder_path_query};
//! use vaultfetch_core::config::VaultConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = VaultConfig::new(
//!     "https://vault.example.com",
//!     "FLDCF",
//!     "SAMH",
//!     "api-key",
//!     "api-secret",
//!     "https://vault.example.com/oauth/token",
//! );
//! let session = VaultSession::login(config).await?;
//! let query = folder_path_query("/Provider Licensing/Providers/PROV-001670");
//! let documents = session
//!     .search_all_documents(&RequestOptions::search(query))
//!     .await?;
//! println!("{} documents", documents.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
mod documents;
mod error;
mod files;
mod retry;
mod session;

use async_trait::async_trait;
use uuid::Uuid;

use crate::materialize::ByteStream;

pub use auth::AccessToken;
pub use documents::{Document, RequestOptions, folder_path_query};
pub use error::ApiError;
pub use files::FileStream;
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};
pub use session::VaultSession;

/// Where the run loop gets documents and their bytes from.
///
/// Implemented by [`VaultSession`]; tests substitute in-memory sources.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Returns every document matching `options`, in server order.
    async fn search(&self, options: &RequestOptions) -> Result<Vec<Document>, ApiError>;

    /// Opens the file attached to a revision; `None` when it has none.
    async fn open_file(&self, revision_id: Uuid) -> Result<Option<ByteStream>, ApiError>;
}
