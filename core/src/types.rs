//! Request inputs and decoded responses for the Colore API.
//!
//! # Design
//! Optional parameters are `Option`/empty `Vec` and are left out of the
//! request entirely when unset. Upload content is passed separately as
//! `Content` so a caller can hand over either a buffer or a reader.

use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the movable pointer to a document's latest version.
pub const CURRENT: &str = "current";

/// Upload content: an in-memory buffer or a readable stream.
pub enum Content<'a> {
    Bytes(&'a [u8]),
    Reader(&'a mut dyn Read),
}

impl<'a> Content<'a> {
    pub fn reader<R: Read>(reader: &'a mut R) -> Self {
        Content::Reader(reader)
    }
}

impl std::fmt::Debug for Content<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Content::Bytes(bytes) => write!(f, "Content::Bytes({} bytes)", bytes.len()),
            Content::Reader(_) => write!(f, "Content::Reader"),
        }
    }
}

impl<'a> From<&'a [u8]> for Content<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Content::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Content<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Content::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for Content<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Content::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for Content<'a> {
    fn from(text: &'a str) -> Self {
        Content::Bytes(text.as_bytes())
    }
}

/// Inputs for storing a new document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDocument {
    pub doc_id: String,
    /// Only the final path component is sent.
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Conversions to run once the file is stored, e.g. `ocr`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl CreateDocument {
    pub fn new(doc_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            filename: filename.into(),
            ..Self::default()
        }
    }
}

/// Inputs for storing a new version of an existing document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDocument {
    pub doc_id: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl UpdateDocument {
    pub fn new(doc_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            filename: filename.into(),
            ..Self::default()
        }
    }
}

/// Inputs for an asynchronous conversion of a stored version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub doc_id: String,
    pub filename: String,
    pub action: String,
    #[serde(default = "current_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl ConversionRequest {
    pub fn new(
        doc_id: impl Into<String>,
        filename: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            filename: filename.into(),
            action: action.into(),
            version: current_version(),
            callback_url: None,
        }
    }
}

fn current_version() -> String {
    CURRENT.to_string()
}

/// Decoded JSON response: status, description, and operation-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: u16,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Path of the stored file, returned by create and update.
    pub fn path(&self) -> Option<&str> {
        self.get_str("path")
    }

    pub fn title(&self) -> Option<&str> {
        self.get_str("title")
    }

    pub fn current_version(&self) -> Option<&str> {
        self.get_str("current_version")
    }

    pub fn versions(&self) -> Option<&Value> {
        self.get("versions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_keeps_extra_fields() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"status":200,"description":"Information retrieved","title":"Sample document","current_version":"v001","versions":{"v001":{}}}"#,
        )
        .unwrap();
        assert_eq!(envelope.status, 200);
        assert_eq!(envelope.description, "Information retrieved");
        assert_eq!(envelope.title(), Some("Sample document"));
        assert_eq!(envelope.current_version(), Some("v001"));
        assert!(envelope.versions().unwrap().is_object());
        assert_eq!(envelope.path(), None);
    }

    #[test]
    fn envelope_requires_status() {
        let result: Result<Envelope, _> = serde_json::from_str(r#"{"description":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn conversion_request_defaults_to_current() {
        let request = ConversionRequest::new("doc", "a.jpg", "ocr");
        assert_eq!(request.version, CURRENT);
        let parsed: ConversionRequest =
            serde_json::from_str(r#"{"doc_id":"d","filename":"f","action":"ocr"}"#).unwrap();
        assert_eq!(parsed.version, CURRENT);
    }

    #[test]
    fn create_document_optional_fields_default_empty() {
        let doc: CreateDocument =
            serde_json::from_str(r#"{"doc_id":"d","filename":"f.jpg"}"#).unwrap();
        assert_eq!(doc, CreateDocument::new("d", "f.jpg"));
        assert!(doc.actions.is_empty());
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("title").is_none());
        assert!(json.get("actions").is_none());
    }
}
