//! Streaming access to a revision's attached file.

use futures_util::{StreamExt, TryStreamExt};
use reqwest::Response;

use crate::materialize::ByteStream;

/// An open HTTP body for one file revision.
///
/// The body is consumed at most once via [`FileStream::into_byte_stream`];
/// dropping an unconsumed `FileStream` closes the connection.
#[derive(Debug)]
pub struct FileStream {
    url: String,
    response: Response,
}

impl FileStream {
    pub(crate) fn new(url: impl Into<String>, response: Response) -> Self {
        Self {
            url: url.into(),
            response,
        }
    }

    /// URL the stream was opened from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Length announced by the server, when present.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// MIME type announced by the server, when present.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Converts the body into a chunk stream; transport errors surface as
    /// `std::io::Error` so the materializer treats them like read failures.
    #[must_use]
    pub fn into_byte_stream(self) -> ByteStream {
        self.response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed()
    }
}
