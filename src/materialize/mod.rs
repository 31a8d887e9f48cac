//! Local materialization of remote documents.
//!
//! Given a [`Document`] and an optional byte stream, the [`Materializer`]
//! makes sure exactly one correctly-sized file exists at the document's
//! derived local path:
//!
//! - no stream: nothing to do, no filesystem mutation
//! - file present with the declared size: skip
//! - file present with another size: delete, then write
//! - file absent: create missing directories, then write
//!
//! A failed copy removes the partial file so the next run starts clean. The
//! materializer never retries.
//!
//! # Example
//!
//! ```no_run
//! use vaultfetch_core::api::Document;
//! use vaultfetch_core::materialize::{ByteStream, Materializer};
//!
//! # async fn example(doc: Document, stream: Option<ByteStream>) -> Result<(), Box<dyn std::error::Error>> {
//! let materializer = Materializer::new("/srv/mirror");
//! let outcome = materializer.materialize(&doc, stream).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod error;
mod path;

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use crate::api::Document;

pub use error::MaterializeError;
pub use path::{DEFAULT_MAX_PATH_LEN, TargetPath, plan_target_path};

/// Chunked file content, as produced by the vault file endpoint.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// What [`Materializer::materialize`] did for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// The revision has no attached file; nothing was touched.
    NoContent,
    /// A file with the declared size already existed.
    Skipped {
        /// Existing file.
        path: PathBuf,
    },
    /// The stream was written to disk.
    Written {
        /// Written file.
        path: PathBuf,
        /// Bytes copied from the stream.
        bytes: u64,
        /// Whether a stale file of another size was deleted first.
        replaced: bool,
    },
}

/// State of the local copy before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalState {
    /// Nothing exists at the target path.
    Absent,
    /// A file with the declared size exists.
    Current,
    /// A file exists with a different size.
    Stale {
        /// Size of the existing file.
        len: u64,
    },
}

/// Writes documents under a local root that mirrors the remote folder tree.
#[derive(Debug, Clone)]
pub struct Materializer {
    local_root: PathBuf,
    max_path_len: usize,
}

impl Materializer {
    /// Creates a materializer rooted at `local_root` with the default
    /// path-length limit.
    #[must_use]
    pub fn new(local_root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            max_path_len: DEFAULT_MAX_PATH_LEN,
        }
    }

    /// Overrides the path-length limit.
    #[must_use]
    pub fn with_max_path_len(mut self, max_path_len: usize) -> Self {
        self.max_path_len = max_path_len;
        self
    }

    /// Local root directory.
    #[must_use]
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Derives the local path for `doc`.
    ///
    /// # Errors
    ///
    /// See [`plan_target_path`].
    pub fn target_path(&self, doc: &Document) -> Result<TargetPath, MaterializeError> {
        plan_target_path(
            &self.local_root,
            &doc.folder_path,
            &doc.filename,
            self.max_path_len,
        )
    }

    /// Compares the local copy at `target` with the declared size.
    ///
    /// # Errors
    ///
    /// [`MaterializeError::Io`] if the path cannot be inspected or is not a
    /// regular file.
    pub async fn inspect(
        &self,
        target: &TargetPath,
        declared_size: u64,
    ) -> Result<LocalState, MaterializeError> {
        match tokio::fs::metadata(&target.file).await {
            Ok(meta) if meta.is_file() => {
                if meta.len() == declared_size {
                    Ok(LocalState::Current)
                } else {
                    Ok(LocalState::Stale { len: meta.len() })
                }
            }
            Ok(_) => Err(MaterializeError::io(
                &target.file,
                io::Error::new(io::ErrorKind::AlreadyExists, "target exists and is not a file"),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(LocalState::Absent),
            Err(e) => Err(MaterializeError::io(&target.file, e)),
        }
    }

    /// Ensures one file of the declared size exists for `doc`.
    ///
    /// # Errors
    ///
    /// Path planning errors, and [`MaterializeError::Io`] /
    /// [`MaterializeError::Stream`] from the copy. A failed copy leaves no
    /// file behind.
    #[instrument(skip(self, doc, stream), fields(revision_id = %doc.id, filename = %doc.filename))]
    pub async fn materialize<S>(
        &self,
        doc: &Document,
        stream: Option<S>,
    ) -> Result<MaterializeOutcome, MaterializeError>
    where
        S: Stream<Item = io::Result<Bytes>> + Unpin,
    {
        let Some(stream) = stream else {
            debug!("no attached file; nothing to materialize");
            return Ok(MaterializeOutcome::NoContent);
        };

        let target = self.target_path(doc)?;
        if target.shortened {
            warn!(
                folder_path = %doc.folder_path,
                path = %target.file.display(),
                "path shortened to fit the length limit"
            );
        }

        let replaced = match self.inspect(&target, doc.file_size).await? {
            LocalState::Current => {
                debug!(path = %target.file.display(), "already downloaded; skipping");
                return Ok(MaterializeOutcome::Skipped { path: target.file });
            }
            LocalState::Stale { len } => {
                info!(
                    path = %target.file.display(),
                    local_bytes = len,
                    declared_bytes = doc.file_size,
                    "size mismatch; replacing stale file"
                );
                tokio::fs::remove_file(&target.file)
                    .await
                    .map_err(|e| MaterializeError::io(&target.file, e))?;
                true
            }
            LocalState::Absent => false,
        };

        tokio::fs::create_dir_all(&target.directory)
            .await
            .map_err(|e| MaterializeError::io(&target.directory, e))?;

        let mut file = File::create(&target.file)
            .await
            .map_err(|e| MaterializeError::io(&target.file, e))?;

        let stream_result = stream_to_file(&mut file, stream, &target.file).await;
        drop(file);

        let bytes = match stream_result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %target.file.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&target.file).await;
                return Err(e);
            }
        };

        if bytes != doc.file_size {
            warn!(
                path = %target.file.display(),
                bytes,
                declared_bytes = doc.file_size,
                "written size differs from declared size"
            );
        }

        info!(path = %target.file.display(), bytes, replaced, "document written");

        Ok(MaterializeOutcome::Written {
            path: target.file,
            bytes,
            replaced,
        })
    }
}

/// Copies the stream into `file`, returning bytes written.
async fn stream_to_file<S>(file: &mut File, mut stream: S, path: &Path) -> Result<u64, MaterializeError>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    let mut writer = BufWriter::new(file);
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| MaterializeError::stream(path, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| MaterializeError::io(path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| MaterializeError::io(path, e))?;

    Ok(bytes_written)
}
