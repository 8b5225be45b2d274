//! HTTP request and response values exchanged with a `Transport`.
//!
//! # Design
//! `ColoreClient::build_*` methods describe each call as plain data and the
//! `parse_*` side consumes plain data, so request construction and response
//! decoding are testable without a network. The transport in between is the
//! only piece that performs I/O.
//!
//! Every request declares up front what kind of payload it expects back
//! (`Expect`). Decoding branches on that declaration, never on the response's
//! content type: binary endpoints must hand back their bytes untouched.

use std::path::PathBuf;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Head,
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Head => "HEAD",
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Payload kind a call site expects on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Only the status matters; the body is discarded.
    Nothing,
    /// The body is a JSON envelope.
    Json,
    /// The body is returned byte for byte.
    Binary,
}

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    Multipart(MultipartBody),
}

/// A `multipart/form-data` upload: ordered text fields plus one file on disk.
///
/// Field names may repeat (`actions[]`). The transport encodes the form and
/// streams the file from `path` with its length known up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub file: FileUpload,
}

/// The file part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Form field name.
    pub field: String,
    /// Filename sent in the part's `Content-Disposition`.
    pub filename: String,
    pub content_type: String,
    pub path: PathBuf,
    pub len: u64,
}

/// An HTTP request described as plain data.
///
/// `url` is absolute (base URI already joined). `query` holds the parameters
/// for calls that carry no upload; uploads carry theirs as multipart fields.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub expect: Expect,
}

impl HttpRequest {
    /// The multipart body, when this request uploads a file.
    pub fn multipart(&self) -> Option<&MultipartBody> {
        match &self.body {
            RequestBody::Multipart(form) => Some(form),
            RequestBody::Empty => None,
        }
    }
}

/// An HTTP response described as plain data.
///
/// Produced by a `Transport` after executing an `HttpRequest`. The body is
/// raw bytes; whether it is JSON is decided by the request's `Expect`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, with invalid UTF-8 replaced. Used for diagnostics.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
