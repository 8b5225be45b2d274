//! Request builder, dispatcher and response parser for the Colore API.
//!
//! # Design
//! `ColoreClient` holds only its configuration and a `Transport`; nothing
//! changes between calls. Each operation is split the same way:
//! - a `build_*` method produces an `HttpRequest` as plain data,
//! - the transport performs the single round trip,
//! - a `parse_*` method turns the `HttpResponse` into a result, handing
//!   non-2xx responses to the error mapper.
//!
//! Uploads are first staged into a `StagedFile`, which lives until the
//! operation returns and removes itself on every exit path.

use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{self, ColoreError, Result};
use crate::http::{Expect, FileUpload, HttpMethod, HttpRequest, HttpResponse, MultipartBody, RequestBody};
use crate::staging::StagedFile;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Content, ConversionRequest, CreateDocument, Envelope, UpdateDocument, CURRENT};

/// Language sent with `convert` unless another is given.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Characters left unescaped in path segments; space becomes `%20`.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

/// Generate a random document id (a version 4 UUID).
pub fn generate_doc_id() -> String {
    Uuid::new_v4().to_string()
}

/// Client for a Colore document store, scoped to one application namespace.
#[derive(Debug, Clone)]
pub struct ColoreClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl ColoreClient<UreqTransport> {
    /// Client using the default blocking transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> ColoreClient<T> {
    pub fn with_transport(mut config: ClientConfig, transport: T) -> Result<Self> {
        config.base_uri = config.base_uri.trim_end_matches('/').to_string();
        config.validate()?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn app(&self) -> &str {
        &self.config.app
    }

    pub fn base_uri(&self) -> &str {
        &self.config.base_uri
    }

    pub fn backtrace(&self) -> bool {
        self.config.backtrace
    }

    /// Generate a random document id. See [`generate_doc_id`].
    pub fn generate_doc_id(&self) -> String {
        generate_doc_id()
    }

    /// Path of the current version of a stored file.
    ///
    /// `"/document/{app}/{doc_id}/current/{basename}"`; directory components of
    /// `filename` are dropped. Useful for serving files directly from a proxy.
    pub fn path_for(&self, doc_id: &str, filename: &str) -> String {
        self.path_for_version(doc_id, filename, CURRENT)
    }

    /// Path of a specific version of a stored file.
    pub fn path_for_version(&self, doc_id: &str, filename: &str, version: &str) -> String {
        format!(
            "{}/{}/{}",
            self.document_path(doc_id),
            encode(version),
            encode(basename(filename))
        )
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Check the service answers. Fails with `Unavailable` when it cannot be reached.
    pub fn ping(&self) -> Result<bool> {
        let response = self.dispatch(self.build_ping())?;
        self.parse_ping(response)
    }

    /// Store a new document. Fails with a client error if `doc_id` already exists.
    pub fn create_document<'c>(
        &self,
        doc: &CreateDocument,
        content: impl Into<Content<'c>>,
    ) -> Result<Envelope> {
        let staged = StagedFile::stage(content.into(), Some(doc.filename.as_str()))?;
        let request = self.build_create_document(doc, &staged);
        let response = self.dispatch(request)?;
        self.parse_json(response)
    }

    /// Store a new version of an existing document.
    pub fn update_document<'c>(
        &self,
        doc: &UpdateDocument,
        content: impl Into<Content<'c>>,
    ) -> Result<Envelope> {
        let staged = StagedFile::stage(content.into(), Some(doc.filename.as_str()))?;
        let request = self.build_update_document(doc, &staged);
        let response = self.dispatch(request)?;
        self.parse_json(response)
    }

    pub fn update_title(&self, doc_id: &str, title: &str) -> Result<Envelope> {
        let response = self.dispatch(self.build_update_title(doc_id, title))?;
        self.parse_json(response)
    }

    /// Ask the service to run a conversion in the background. Returns once accepted.
    pub fn request_conversion(&self, request: &ConversionRequest) -> Result<Envelope> {
        let response = self.dispatch(self.build_request_conversion(request))?;
        self.parse_json(response)
    }

    /// Delete a document and all of its versions.
    pub fn delete_document(&self, doc_id: &str) -> Result<Envelope> {
        let response = self.dispatch(self.build_delete_document(doc_id))?;
        self.parse_json(response)
    }

    /// Delete one version. The current version cannot be deleted.
    pub fn delete_version(&self, doc_id: &str, version: &str) -> Result<Envelope> {
        let response = self.dispatch(self.build_delete_version(doc_id, version))?;
        self.parse_json(response)
    }

    /// Fetch the current version's file contents.
    ///
    /// This loads the service; prefer serving [`path_for`](Self::path_for)
    /// through a proxy where possible.
    pub fn get_document(&self, doc_id: &str, filename: &str) -> Result<Vec<u8>> {
        self.get_document_version(doc_id, filename, CURRENT)
    }

    pub fn get_document_version(
        &self,
        doc_id: &str,
        filename: &str,
        version: &str,
    ) -> Result<Vec<u8>> {
        let response = self.dispatch(self.build_get_document(doc_id, filename, version))?;
        self.parse_binary(response)
    }

    pub fn get_document_info(&self, doc_id: &str) -> Result<Envelope> {
        let response = self.dispatch(self.build_get_document_info(doc_id))?;
        self.parse_json(response)
    }

    /// Convert arbitrary content in the foreground and return the output.
    pub fn convert<'c>(&self, content: impl Into<Content<'c>>, action: &str) -> Result<Vec<u8>> {
        self.convert_with_language(content, action, DEFAULT_LANGUAGE)
    }

    /// Like [`convert`](Self::convert) with an explicit language (used by OCR).
    pub fn convert_with_language<'c>(
        &self,
        content: impl Into<Content<'c>>,
        action: &str,
        language: &str,
    ) -> Result<Vec<u8>> {
        let staged = StagedFile::stage(content.into(), None)?;
        let request = self.build_convert(&staged, action, language);
        let response = self.dispatch(request)?;
        self.parse_binary(response)
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    pub fn build_ping(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Head,
            url: self.url("/"),
            headers: self.headers(),
            query: Vec::new(),
            body: RequestBody::Empty,
            expect: Expect::Nothing,
        }
    }

    pub fn build_create_document(&self, doc: &CreateDocument, staged: &StagedFile) -> HttpRequest {
        let mut fields = Vec::new();
        if let Some(title) = &doc.title {
            fields.push(field("title", title));
        }
        fields.extend(doc.actions.iter().map(|action| field("actions[]", action)));
        if let Some(author) = &doc.author {
            fields.push(field("author", author));
        }
        if let Some(callback_url) = &doc.callback_url {
            fields.push(field("callback_url", callback_url));
        }

        let filename = basename(&doc.filename);
        let path = format!("{}/{}", self.document_path(&doc.doc_id), encode(filename));
        self.upload(HttpMethod::Put, &path, fields, staged, filename, Expect::Json)
    }

    pub fn build_update_document(&self, doc: &UpdateDocument, staged: &StagedFile) -> HttpRequest {
        let mut fields: Vec<_> = doc
            .actions
            .iter()
            .map(|action| field("actions[]", action))
            .collect();
        if let Some(author) = &doc.author {
            fields.push(field("author", author));
        }
        if let Some(callback_url) = &doc.callback_url {
            fields.push(field("callback_url", callback_url));
        }

        let filename = basename(&doc.filename);
        let path = format!("{}/{}", self.document_path(&doc.doc_id), encode(filename));
        self.upload(HttpMethod::Post, &path, fields, staged, filename, Expect::Json)
    }

    pub fn build_update_title(&self, doc_id: &str, title: &str) -> HttpRequest {
        let path = format!("{}/title/{}", self.document_path(doc_id), encode(title));
        self.plain(HttpMethod::Post, &path, Vec::new(), Expect::Json)
    }

    pub fn build_request_conversion(&self, request: &ConversionRequest) -> HttpRequest {
        let path = format!(
            "{}/{}",
            self.path_for_version(&request.doc_id, &request.filename, &request.version),
            encode(&request.action)
        );
        let mut params = Vec::new();
        if let Some(callback_url) = &request.callback_url {
            params.push(field("callback_url", callback_url));
        }
        self.plain(HttpMethod::Post, &path, params, Expect::Json)
    }

    pub fn build_delete_document(&self, doc_id: &str) -> HttpRequest {
        self.plain(
            HttpMethod::Delete,
            &self.document_path(doc_id),
            Vec::new(),
            Expect::Json,
        )
    }

    pub fn build_delete_version(&self, doc_id: &str, version: &str) -> HttpRequest {
        let path = format!("{}/{}", self.document_path(doc_id), encode(version));
        self.plain(HttpMethod::Delete, &path, Vec::new(), Expect::Json)
    }

    pub fn build_get_document(&self, doc_id: &str, filename: &str, version: &str) -> HttpRequest {
        let path = self.path_for_version(doc_id, filename, version);
        self.plain(HttpMethod::Get, &path, Vec::new(), Expect::Binary)
    }

    pub fn build_get_document_info(&self, doc_id: &str) -> HttpRequest {
        self.plain(
            HttpMethod::Get,
            &self.document_path(doc_id),
            Vec::new(),
            Expect::Json,
        )
    }

    pub fn build_convert(&self, staged: &StagedFile, action: &str, language: &str) -> HttpRequest {
        let mut fields = vec![field("action", action)];
        if !language.is_empty() {
            fields.push(field("language", language));
        }
        let filename = staged.file_name();
        self.upload(HttpMethod::Post, "/convert", fields, staged, &filename, Expect::Binary)
    }

    // -----------------------------------------------------------------------
    // Response parsers
    // -----------------------------------------------------------------------

    pub fn parse_ping(&self, response: HttpResponse) -> Result<bool> {
        check_status(&response)?;
        Ok(true)
    }

    pub fn parse_json(&self, response: HttpResponse) -> Result<Envelope> {
        check_status(&response)?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub fn parse_binary(&self, response: HttpResponse) -> Result<Vec<u8>> {
        check_status(&response)?;
        Ok(response.body)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Execute one request, tracing what goes out and what comes back.
    fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse> {
        let expect = request.expect;
        let method = request.method.as_str();
        let url = request.url.clone();
        debug!(method, url = %url, "send request");
        match request.multipart() {
            Some(upload) => debug!(params = ?upload.fields, "  multipart params"),
            None => debug!(params = ?request.query, "  params"),
        }

        let response = match self.transport.execute(request) {
            Ok(response) => response,
            Err(ColoreError::Unavailable) => {
                warn!(method, url = %url, "Colore is unavailable");
                return Err(ColoreError::Unavailable);
            }
            Err(e) => return Err(e),
        };

        if !response.is_success() {
            debug!(status = response.status, "  received error");
            return Ok(response);
        }
        match expect {
            Expect::Json => debug!(status = response.status, body = %response.body_text(), "  received"),
            Expect::Binary => debug!(status = response.status, "  received [BINARY {} bytes]", response.body.len()),
            Expect::Nothing => debug!(status = response.status, "  received"),
        }
        Ok(response)
    }

    fn document_path(&self, doc_id: &str) -> String {
        format!("/document/{}/{}", encode(&self.config.app), encode(doc_id))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_uri, path)
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![("user-agent".to_string(), self.config.user_agent.clone())]
    }

    fn plain(
        &self,
        method: HttpMethod,
        path: &str,
        mut query: Vec<(String, String)>,
        expect: Expect,
    ) -> HttpRequest {
        if self.config.backtrace {
            query.push(("backtrace".to_string(), "true".to_string()));
        }
        HttpRequest {
            method,
            url: self.url(path),
            headers: self.headers(),
            query,
            body: RequestBody::Empty,
            expect,
        }
    }

    /// Multipart request carrying `fields` and the staged file as part `file`.
    fn upload(
        &self,
        method: HttpMethod,
        path: &str,
        mut fields: Vec<(String, String)>,
        staged: &StagedFile,
        filename: &str,
        expect: Expect,
    ) -> HttpRequest {
        if self.config.backtrace {
            fields.push(field("backtrace", "true"));
        }
        let file = FileUpload {
            field: "file".to_string(),
            filename: filename.to_string(),
            content_type: staged.content_type().to_string(),
            path: staged.path().to_path_buf(),
            len: staged.len(),
        };
        HttpRequest {
            method,
            url: self.url(path),
            headers: self.headers(),
            query: Vec::new(),
            body: RequestBody::Multipart(MultipartBody { fields, file }),
            expect,
        }
    }
}

fn field(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

/// Hand non-2xx responses to the error mapper.
fn check_status(response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(error::from_response(response))
}

fn basename(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filename)
}

fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}
