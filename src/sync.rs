//! Sequential provider mirror: search, then materialize each document.
//!
//! Documents are processed one at a time in the order the search returned
//! them. Each document's byte stream is opened and consumed inside its own
//! step; nothing is shared between documents except the local root.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::api::{ApiError, Document, DocumentSource, RequestOptions, folder_path_query};
use crate::config::DEFAULT_FOLDER_ROOT;
use crate::materialize::{
    ByteStream, LocalState, MaterializeError, MaterializeOutcome, Materializer,
};

/// Errors that abort a provider sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The provider id cannot be used as a folder name.
    #[error("invalid provider id '{provider_id}': must be non-empty and contain no '/'")]
    InvalidProvider {
        /// Rejected id.
        provider_id: String,
    },

    /// The document search failed.
    #[error("search under '{folder_path}' failed: {source}")]
    Search {
        /// Folder that was searched.
        folder_path: String,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// Opening a revision's file failed.
    #[error("fetching '{filename}' (revision {revision_id}) failed: {source}")]
    Fetch {
        /// Revision whose file was requested.
        revision_id: Uuid,
        /// Document filename.
        filename: String,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// Writing a document locally failed.
    #[error("writing '{filename}' (revision {revision_id}) failed: {source}")]
    Materialize {
        /// Revision being written.
        revision_id: Uuid,
        /// Document filename.
        filename: String,
        /// Underlying materializer error.
        #[source]
        source: MaterializeError,
    },
}

impl SyncError {
    /// True when the error comes from rejected credentials.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            Self::Search { source, .. } | Self::Fetch { source, .. } => {
                source.is_unauthenticated()
            }
            Self::InvalidProvider { .. } | Self::Materialize { .. } => false,
        }
    }
}

/// Behavior switches for [`sync_provider`].
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Remote folder containing provider folders.
    pub folder_root: String,
    /// Log and count per-document failures instead of aborting.
    pub keep_going: bool,
    /// Report metadata only; open no streams and touch no files.
    pub list_only: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            folder_root: DEFAULT_FOLDER_ROOT.to_string(),
            keep_going: false,
            list_only: false,
        }
    }
}

/// Per-document result handed to the observer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Metadata reported in list-only mode.
    Listed,
    /// The materializer finished.
    Done(MaterializeOutcome),
    /// The document failed and `keep_going` was set.
    Failed(String),
}

/// Counters for one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Documents returned by the search.
    pub found: usize,
    /// Files written, including replacements.
    pub written: usize,
    /// Writes that first deleted a stale file.
    pub replaced: usize,
    /// Files already present with the declared size.
    pub skipped: usize,
    /// Revisions without an attached file.
    pub no_content: usize,
    /// Documents reported in list-only mode.
    pub listed: usize,
    /// Documents that failed under `keep_going`.
    pub failed: usize,
}

impl SyncStats {
    fn record(&mut self, outcome: &MaterializeOutcome) {
        match outcome {
            MaterializeOutcome::NoContent => self.no_content += 1,
            MaterializeOutcome::Skipped { .. } => self.skipped += 1,
            MaterializeOutcome::Written { replaced, .. } => {
                self.written += 1;
                if *replaced {
                    self.replaced += 1;
                }
            }
        }
    }
}

/// `<folder_root>/<provider_id>`, e.g. `/Provider Licensing/Providers/PROV-001670`.
#[must_use]
pub fn provider_folder_path(folder_root: &str, provider_id: &str) -> String {
    format!("{}/{}", folder_root.trim_end_matches('/'), provider_id)
}

/// Mirrors every document under a provider's folder.
///
/// `on_document` is called once per document after it has been handled.
///
/// # Errors
///
/// [`SyncError::Search`] if the search fails. Per-document fetch and write
/// errors abort the run unless [`SyncOptions::keep_going`] is set, in which
/// case they are counted in [`SyncStats::failed`].
#[instrument(skip(source, materializer, options, on_document), fields(root = %materializer.local_root().display()))]
pub async fn sync_provider<F>(
    source: &dyn DocumentSource,
    materializer: &Materializer,
    provider_id: &str,
    options: &SyncOptions,
    mut on_document: F,
) -> Result<SyncStats, SyncError>
where
    F: FnMut(&Document, &DocumentStatus),
{
    let provider_id = provider_id.trim();
    if provider_id.is_empty() || provider_id.contains('/') {
        return Err(SyncError::InvalidProvider {
            provider_id: provider_id.to_string(),
        });
    }

    let folder_path = provider_folder_path(&options.folder_root, provider_id);
    info!(%folder_path, "searching documents");

    let documents = source
        .search(&RequestOptions::search(folder_path_query(&folder_path)))
        .await
        .map_err(|source| SyncError::Search {
            folder_path: folder_path.clone(),
            source,
        })?;

    let mut stats = SyncStats {
        found: documents.len(),
        ..SyncStats::default()
    };
    info!(count = stats.found, "documents found");

    for doc in &documents {
        log_document_metadata(doc);

        if options.list_only {
            stats.listed += 1;
            on_document(doc, &DocumentStatus::Listed);
            continue;
        }

        match process_document(source, materializer, doc).await {
            Ok(outcome) => {
                stats.record(&outcome);
                on_document(doc, &DocumentStatus::Done(outcome));
            }
            Err(e) if options.keep_going && !e.is_unauthenticated() => {
                error!(error = %e, "document failed; continuing");
                stats.failed += 1;
                on_document(doc, &DocumentStatus::Failed(e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        found = stats.found,
        written = stats.written,
        replaced = stats.replaced,
        skipped = stats.skipped,
        no_content = stats.no_content,
        failed = stats.failed,
        "sync complete"
    );
    Ok(stats)
}

/// Skips the download when the local copy is already current; otherwise
/// opens the stream and hands it to the materializer.
///
/// A document whose local path cannot be planned only fails when it
/// actually has a file to write.
async fn process_document(
    source: &dyn DocumentSource,
    materializer: &Materializer,
    doc: &Document,
) -> Result<MaterializeOutcome, SyncError> {
    let materialize_err = |source: MaterializeError| SyncError::Materialize {
        revision_id: doc.id,
        filename: doc.filename.clone(),
        source,
    };

    let local = match materializer.target_path(doc) {
        Ok(target) => materializer
            .inspect(&target, doc.file_size)
            .await
            .map(|state| (target, state)),
        Err(e) => Err(e),
    };

    match local {
        Ok((target, LocalState::Current)) => {
            debug!(path = %target.file.display(), "local copy current; not opening stream");
            Ok(MaterializeOutcome::Skipped { path: target.file })
        }
        Ok(_) => {
            let stream = open_stream(source, doc).await?;
            materializer
                .materialize(doc, stream)
                .await
                .map_err(materialize_err)
        }
        Err(local_error) => match open_stream(source, doc).await? {
            None => {
                debug!(error = %local_error, "no attached file; local path not needed");
                Ok(MaterializeOutcome::NoContent)
            }
            Some(_) => Err(materialize_err(local_error)),
        },
    }
}

async fn open_stream(
    source: &dyn DocumentSource,
    doc: &Document,
) -> Result<Option<ByteStream>, SyncError> {
    source
        .open_file(doc.id)
        .await
        .map_err(|source| SyncError::Fetch {
            revision_id: doc.id,
            filename: doc.filename.clone(),
            source,
        })
}

fn log_document_metadata(doc: &Document) {
    debug!(
        document_id = %doc.document_id,
        revision_id = %doc.id,
        folder_id = %doc.folder_id,
        folder_path = %doc.folder_path,
        file_id = ?doc.file_id,
        filename = %doc.filename,
        extension = %doc.extension,
        content_type = %doc.content_type,
        create_date = %doc.create_date,
        modify_date = %doc.modify_date,
        revision = %doc.revision,
        file_size = doc.file_size,
        "document metadata"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_folder_path_default_root() {
        assert_eq!(
            provider_folder_path(DEFAULT_FOLDER_ROOT, "PROV-001670"),
            "/Provider Licensing/Providers/PROV-001670"
        );
    }

    #[test]
    fn test_provider_folder_path_trims_trailing_slash() {
        assert_eq!(provider_folder_path("/Vendors/", "V-1"), "/Vendors/V-1");
    }

    #[test]
    fn test_stats_record_counts_outcomes() {
        let mut stats = SyncStats::default();
        stats.record(&MaterializeOutcome::NoContent);
        stats.record(&MaterializeOutcome::Skipped { path: "a".into() });
        stats.record(&MaterializeOutcome::Written {
            path: "b".into(),
            bytes: 1,
            replaced: true,
        });
        stats.record(&MaterializeOutcome::Written {
            path: "c".into(),
            bytes: 1,
            replaced: false,
        });
        assert_eq!(stats.no_content, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.written, 2);
        assert_eq!(stats.replaced, 1);
    }
}
