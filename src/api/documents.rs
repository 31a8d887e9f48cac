//! Document records returned by the vault search endpoint.
//!
//! A [`Document`] describes one revision of a logical document: `document_id`
//! is stable across revisions, `id` identifies this revision and is what the
//! file endpoint expects.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One document revision as returned by `GET documents?expand=true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Revision-neutral id; always refers to the latest revision.
    pub document_id: Uuid,
    /// Revision-specific id, used to fetch this revision's file.
    pub id: Uuid,
    /// Id of the folder holding the document.
    pub folder_id: Uuid,
    /// Slash-delimited remote folder, e.g. `/Provider Licensing/Providers/PROV-001670`.
    pub folder_path: String,
    /// Id of the file attached to this revision.
    #[serde(default)]
    pub file_id: Option<Uuid>,
    /// File name including extension.
    #[serde(rename = "fileName", alias = "filename")]
    pub filename: String,
    /// Extension without the leading dot.
    #[serde(default)]
    pub extension: String,
    /// MIME type such as `application/pdf`.
    #[serde(default)]
    pub content_type: String,
    /// Creation time of revision 1.
    #[serde(deserialize_with = "deserialize_vault_datetime")]
    pub create_date: DateTime<Utc>,
    /// Creation time of this revision.
    #[serde(deserialize_with = "deserialize_vault_datetime")]
    pub modify_date: DateTime<Utc>,
    /// User-defined revision label; numeric by default but not required to be.
    #[serde(deserialize_with = "deserialize_label")]
    pub revision: String,
    /// Declared byte length of the attached file.
    #[serde(default)]
    pub file_size: u64,
}

/// Search parameters for `GET documents`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// OData-like filter, e.g. `[folderPath] eq '/a/b'`.
    pub query: String,
    /// Ask the server to inline related metadata.
    pub expand: bool,
    /// Zero-based index of the first result.
    pub offset: Option<u32>,
    /// Maximum results per page.
    pub limit: Option<u32>,
}

impl RequestOptions {
    /// Options for an expanded search with the given filter.
    #[must_use]
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            expand: true,
            ..Self::default()
        }
    }

    /// Returns a copy positioned at one result page.
    #[must_use]
    pub fn page(&self, offset: u32, limit: u32) -> Self {
        Self {
            offset: Some(offset),
            limit: Some(limit),
            ..self.clone()
        }
    }

    /// Query-string pairs in the order the server documents them.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if !self.query.is_empty() {
            pairs.push(("q", self.query.clone()));
        }
        if self.expand {
            pairs.push(("expand", "true".to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// Builds `[folderPath] eq '<path>'`, doubling embedded single quotes.
#[must_use]
pub fn folder_path_query(folder_path: &str) -> String {
    format!("[folderPath] eq '{}'", folder_path.replace('\'', "''"))
}

// ==================== Response envelope ====================

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub meta: Meta,
    #[serde(default)]
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Meta {
    pub status: u16,
    #[serde(default)]
    pub status_msg: String,
    #[serde(default)]
    pub errors: Vec<MetaError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetaError {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Meta {
    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `statusMsg` followed by any listed error messages.
    pub(crate) fn describe(&self) -> String {
        let mut parts = vec![self.status_msg.clone()];
        parts.extend(
            self.errors
                .iter()
                .filter_map(|e| e.message.clone().or_else(|| e.reason.clone())),
        );
        parts.retain(|p| !p.is_empty());
        if parts.is_empty() {
            "no status message".to_string()
        } else {
            parts.join("; ")
        }
    }
}

// ==================== Lenient field decoding ====================

/// Accepts RFC 3339 timestamps and the offset-less form the vault emits
/// (`2019-03-04T15:22:10.953`), the latter read as UTC.
fn deserialize_vault_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_vault_datetime(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

pub(crate) fn parse_vault_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Label {
    Text(String),
    Number(i64),
}

fn deserialize_label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Label::deserialize(deserializer)? {
        Label::Text(text) => text,
        Label::Number(number) => number.to_string(),
    })
}
