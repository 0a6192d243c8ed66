//! Request DTOs for the Discovery V2 API.
//!
//! # Design
//! Every optional field is an `Option` skipped during serialization, so an
//! unset parameter never reaches the wire as `null` and the server applies
//! its own default. Responses are not modelled here; callers get raw JSON in
//! a `DetailedResponse`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// JSON body of the `query` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    /// Collections to query. All collections in the project when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_language_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Fields in the document hierarchy to return.
    #[serde(rename = "return", skip_serializing_if = "Option::is_none")]
    pub return_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    /// Comma-separated sort fields, each optionally prefixed with `-`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spelling_suggestions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_results: Option<QueryLargeTableResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_refinements: Option<QueryLargeSuggestedRefinements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passages: Option<QueryLargePassages>,
}

/// Table retrieval settings for a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryLargeTableResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// Suggested refinement settings for a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryLargeSuggestedRefinements {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// Passage retrieval settings for a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryLargePassages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_document: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_per_document: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characters: Option<u32>,
}

/// Optional query-string parameters of `get_autocompletion`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutocompletionOptions {
    /// Sent comma-joined.
    pub collection_ids: Option<Vec<String>>,
    pub field: Option<String>,
    pub count: Option<u32>,
}

/// Optional query-string parameters of `query_notices`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticesOptions {
    pub filter: Option<String>,
    pub query: Option<String>,
    pub natural_language_query: Option<String>,
    pub count: Option<u32>,
    pub offset: Option<u32>,
}

/// Source of the `file` part of a document upload.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentContent {
    /// Raw document bytes.
    Bytes(Vec<u8>),
    /// A file on disk, read when the request is built. Its file name is the
    /// default upload filename.
    Path(PathBuf),
    /// A JSON value, uploaded as its serialized text.
    Json(serde_json::Value),
}

impl DocumentContent {
    /// Wrap any serializable value as a JSON document.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(DocumentContent::Json(serde_json::to_value(value)?))
    }
}

impl From<Vec<u8>> for DocumentContent {
    fn from(bytes: Vec<u8>) -> Self {
        DocumentContent::Bytes(bytes)
    }
}

impl From<&str> for DocumentContent {
    fn from(text: &str) -> Self {
        DocumentContent::Bytes(text.as_bytes().to_vec())
    }
}

impl From<PathBuf> for DocumentContent {
    fn from(path: PathBuf) -> Self {
        DocumentContent::Path(path)
    }
}

/// Multipart payload of `add_document` and `update_document`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpload {
    pub file: Option<DocumentContent>,
    pub filename: Option<String>,
    /// Defaults to `application/octet-stream`, letting the server sniff.
    pub file_content_type: Option<String>,
    /// JSON metadata as text, at most 1 MB.
    pub metadata: Option<String>,
    /// Sent as `X-Watson-Discovery-Force`; `true` bypasses the check that
    /// stops data being shared between collections.
    pub force: Option<bool>,
}

impl DocumentUpload {
    pub fn new(file: impl Into<DocumentContent>) -> Self {
        Self {
            file: Some(file.into()),
            ..Self::default()
        }
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.file_content_type = Some(content_type.into());
        self
    }

    pub fn metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }
}

/// JSON body of `create_training_query` and `update_training_query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingQuery {
    pub natural_language_query: String,
    pub examples: Vec<TrainingExample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// A labeled document for a training query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingExample {
    pub document_id: String,
    pub collection_id: String,
    pub relevance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

impl TrainingExample {
    pub fn new(document_id: &str, collection_id: &str, relevance: i64) -> Self {
        Self {
            document_id: document_id.to_string(),
            collection_id: collection_id.to_string(),
            relevance,
            created: None,
            updated: None,
        }
    }
}
