//! Document fixtures, in-memory byte streams and a scripted document source.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use serde_json::{Value, json};
use uuid::Uuid;
use vaultfetch_core::api::{ApiError, Document, DocumentSource, RequestOptions};
use vaultfetch_core::materialize::ByteStream;

pub const PROVIDER_FOLDER: &str = "/Provider Licensing/Providers/PROV-001670";

/// Vault-shaped JSON for one document revision.
pub fn document_json(n: u128, folder_path: &str, filename: &str, file_size: u64) -> Value {
    json!({
        "documentId": Uuid::from_u128(0x1000 + n),
        "id": Uuid::from_u128(0x2000 + n),
        "folderId": Uuid::from_u128(0x3000),
        "folderPath": folder_path,
        "fileId": Uuid::from_u128(0x4000 + n),
        "fileName": filename,
        "extension": filename.rsplit('.').next().unwrap_or_default(),
        "contentType": "application/pdf",
        "createDate": "2024-03-01T09:30:00Z",
        "modifyDate": "2024-03-02T10:45:00.123",
        "revision": 1,
        "fileSize": file_size,
    })
}

pub fn document(n: u128, folder_path: &str, filename: &str, file_size: u64) -> Document {
    serde_json::from_value(document_json(n, folder_path, filename, file_size))
        .expect("fixture document should deserialize")
}

/// Stream yielding `len` bytes of `fill` in 4 KiB chunks.
pub fn byte_stream(len: usize, fill: u8) -> ByteStream {
    let chunks: Vec<io::Result<Bytes>> = vec![fill; len]
        .chunks(4096)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    stream::iter(chunks).boxed()
}

/// Stream that yields `prefix` and then fails.
pub fn failing_stream(prefix: &[u8]) -> ByteStream {
    let items: Vec<io::Result<Bytes>> = vec![
        Ok(Bytes::copy_from_slice(prefix)),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
    ];
    stream::iter(items).boxed()
}

/// What [`FakeSource::open_file`] returns for a revision.
pub enum FakeFile {
    Bytes(Vec<u8>),
    Missing,
    Fail(fn() -> ApiError),
}

/// In-memory [`DocumentSource`] that records which revisions were opened.
#[derive(Default)]
pub struct FakeSource {
    pub documents: Vec<Document>,
    pub files: HashMap<Uuid, FakeFile>,
    pub search_error: Option<fn() -> ApiError>,
    pub searches: Mutex<Vec<String>>,
    pub opened: Mutex<Vec<Uuid>>,
}

impl FakeSource {
    pub fn with_document(mut self, doc: Document, file: FakeFile) -> Self {
        self.files.insert(doc.id, file);
        self.documents.push(doc);
        self
    }

    pub fn opened(&self) -> Vec<Uuid> {
        self.opened.lock().expect("lock").clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().expect("lock").clone()
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn search(&self, options: &RequestOptions) -> Result<Vec<Document>, ApiError> {
        self.searches.lock().expect("lock").push(options.query.clone());
        if let Some(make_error) = self.search_error {
            return Err(make_error());
        }
        Ok(self.documents.clone())
    }

    async fn open_file(&self, revision_id: Uuid) -> Result<Option<ByteStream>, ApiError> {
        self.opened.lock().expect("lock").push(revision_id);
        match self.files.get(&revision_id) {
            Some(FakeFile::Bytes(content)) => {
                let chunk: io::Result<Bytes> = Ok(Bytes::from(content.clone()));
                Ok(Some(stream::iter(vec![chunk]).boxed()))
            }
            Some(FakeFile::Fail(make_error)) => Err(make_error()),
            Some(FakeFile::Missing) | None => Ok(None),
        }
    }
}
