//! In-memory stand-in for the Colore document service.
//!
//! Serves the same routes, status codes and error bodies as the real service
//! so the client can be exercised end to end without one.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

pub const CURRENT: &str = "current";

pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Text the mock OCR engine "reads" from every image.
pub const OCR_TEXT: &str = "THE QUICK BROWN FOX JUMPS OVER THE LAZY DOG\n";

/// One stored revision of a document.
#[derive(Clone, Debug, Serialize)]
pub struct Version {
    pub filename: String,
    pub content_type: String,
    pub author: Option<String>,
    pub actions: Vec<String>,
    pub conversions: Vec<String>,
    #[serde(skip)]
    pub content: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct Document {
    pub title: Option<String>,
    pub versions: BTreeMap<String, Version>,
    pub current: String,
    next_version: u32,
}

impl Document {
    fn new(title: Option<String>) -> Self {
        Self {
            title,
            versions: BTreeMap::new(),
            current: String::new(),
            next_version: 1,
        }
    }

    fn add_version(&mut self, version: Version) -> String {
        let label = format!("v{:03}", self.next_version);
        self.next_version += 1;
        self.versions.insert(label.clone(), version);
        self.current = label.clone();
        label
    }

    fn resolve(&self, label: &str) -> Option<(&str, &Version)> {
        let label = if label == CURRENT { self.current.as_str() } else { label };
        self.versions.get_key_value(label).map(|(k, v)| (k.as_str(), v))
    }
}

/// Documents keyed by `(app, doc_id)`.
pub type Db = Arc<RwLock<HashMap<(String, String), Document>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/", get(root))
        .route("/convert", post(convert))
        .route(
            "/document/{app}/{doc_id}",
            get(document_info).delete(delete_document),
        )
        .route(
            "/document/{app}/{doc_id}/{name}",
            put(create_document).post(update_document).delete(delete_version),
        )
        .route("/document/{app}/{doc_id}/title/{title}", post(update_title))
        .route("/document/{app}/{doc_id}/{name}/{filename}", get(get_file))
        .route(
            "/document/{app}/{doc_id}/{name}/{filename}/{action}",
            post(request_conversion),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Error response in the service's shape.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    description: String,
    backtrace: Option<Vec<String>>,
}

impl ApiFailure {
    fn new(status: StatusCode, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
            backtrace: None,
        }
    }

    fn bad_request(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, description)
    }

    fn document_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Document not found")
    }

    fn version_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Version not found")
    }

    fn with_backtrace(mut self, enabled: bool, location: &str) -> Self {
        if enabled {
            self.backtrace = Some(vec![format!("mock-server: {location}")]);
        }
        self
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let mut body = json!({
            "status": self.status.as_u16(),
            "description": self.description,
        });
        if let Some(backtrace) = self.backtrace {
            body["backtrace"] = json!(backtrace);
        }
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiFailure>;

#[derive(Debug, Default, Deserialize)]
pub struct Params {
    pub backtrace: Option<String>,
    pub callback_url: Option<String>,
}

impl Params {
    fn backtrace(&self) -> bool {
        is_true(self.backtrace.as_deref())
    }
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value, Some("true") | Some("1"))
}

fn envelope(status: StatusCode, description: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "status": status.as_u16(), "description": description })),
    )
}

fn document_path(app: &str, doc_id: &str, version: &str, filename: &str) -> String {
    format!("/document/{app}/{doc_id}/{version}/{filename}")
}

// ---------------------------------------------------------------------------
// Multipart uploads
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct UploadedFile {
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct Upload {
    fields: HashMap<String, Vec<String>>,
    file: Option<UploadedFile>,
}

impl Upload {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    fn actions(&self) -> Vec<String> {
        self.fields.get("actions[]").cloned().unwrap_or_default()
    }

    fn backtrace(&self) -> bool {
        is_true(self.field("backtrace"))
    }

    fn take_file(&mut self) -> ApiResult<UploadedFile> {
        let backtrace = self.backtrace();
        self.file
            .take()
            .ok_or_else(|| ApiFailure::bad_request("No file provided").with_backtrace(backtrace, "upload"))
    }
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut upload = Upload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiFailure::bad_request(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiFailure::bad_request(e.to_string()))?;
            upload.file = Some(UploadedFile {
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiFailure::bad_request(e.to_string()))?;
            upload.fields.entry(name).or_default().push(value);
        }
    }
    Ok(upload)
}

/// Content type from magic bytes, then "is it text", then opaque.
pub fn detect_mime(bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    if std::str::from_utf8(bytes).is_ok() {
        "text/plain".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

/// Run a foreground conversion, or `None` when no task handles the pairing.
pub fn run_task(action: &str, mime_type: &str, content: &[u8]) -> Option<(&'static str, Vec<u8>)> {
    match action {
        "ocr_text" if mime_type.starts_with("image/") => {
            Some(("text/plain", OCR_TEXT.as_bytes().to_vec()))
        }
        "upcase" if mime_type == "text/plain" => Some((
            "text/plain",
            String::from_utf8_lossy(content).to_uppercase().into_bytes(),
        )),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn root() -> &'static str {
    "Colore mock server"
}

async fn create_document(
    State(db): State<Db>,
    Path((app, doc_id, filename)): Path<(String, String, String)>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut upload = read_upload(multipart).await?;
    let backtrace = upload.backtrace();
    let file = upload.take_file()?;

    let mut docs = db.write().await;
    let key = (app.clone(), doc_id.clone());
    if docs.contains_key(&key) {
        return Err(ApiFailure::new(
            StatusCode::CONFLICT,
            "A document with this doc_id already exists",
        )
        .with_backtrace(backtrace, "create_document"));
    }

    let mut document = Document::new(upload.field("title").map(str::to_string));
    document.add_version(new_version(&upload, filename.clone(), file));
    docs.insert(key, document);
    debug!(%app, %doc_id, %filename, "document stored");

    Ok(stored(&app, &doc_id, &filename))
}

async fn update_document(
    State(db): State<Db>,
    Path((app, doc_id, filename)): Path<(String, String, String)>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut upload = read_upload(multipart).await?;
    let backtrace = upload.backtrace();
    let file = upload.take_file()?;

    let mut docs = db.write().await;
    let document = docs
        .get_mut(&(app.clone(), doc_id.clone()))
        .ok_or_else(|| ApiFailure::document_not_found().with_backtrace(backtrace, "update_document"))?;
    let label = document.add_version(new_version(&upload, filename.clone(), file));
    debug!(%app, %doc_id, %label, "version stored");

    Ok(stored(&app, &doc_id, &filename))
}

fn new_version(upload: &Upload, filename: String, file: UploadedFile) -> Version {
    let content_type = file
        .content_type
        .unwrap_or_else(|| detect_mime(&file.bytes));
    Version {
        filename,
        content_type,
        author: upload.field("author").map(str::to_string),
        actions: upload.actions(),
        conversions: Vec::new(),
        content: file.bytes,
    }
}

fn stored(app: &str, doc_id: &str, filename: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CREATED,
        Json(json!({
            "status": 201,
            "description": "Document stored",
            "app": app,
            "doc_id": doc_id,
            "path": document_path(app, doc_id, CURRENT, filename),
        })),
    )
}

async fn update_title(
    State(db): State<Db>,
    Path((app, doc_id, title)): Path<(String, String, String)>,
    Query(params): Query<Params>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut docs = db.write().await;
    let document = docs
        .get_mut(&(app, doc_id))
        .ok_or_else(|| ApiFailure::document_not_found().with_backtrace(params.backtrace(), "update_title"))?;
    document.title = Some(title);
    Ok(envelope(StatusCode::OK, "Title updated"))
}

async fn request_conversion(
    State(db): State<Db>,
    Path((app, doc_id, version, filename, action)): Path<(String, String, String, String, String)>,
    Query(params): Query<Params>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let backtrace = params.backtrace();
    let mut docs = db.write().await;
    let document = docs
        .get_mut(&(app, doc_id))
        .ok_or_else(|| ApiFailure::document_not_found().with_backtrace(backtrace, "request_conversion"))?;
    let label = document
        .resolve(&version)
        .map(|(label, _)| label.to_string())
        .ok_or_else(|| ApiFailure::version_not_found().with_backtrace(backtrace, "request_conversion"))?;
    let target = document
        .versions
        .get_mut(&label)
        .ok_or_else(ApiFailure::version_not_found)?;
    if target.filename != filename {
        return Err(ApiFailure::new(StatusCode::NOT_FOUND, "File not found")
            .with_backtrace(backtrace, "request_conversion"));
    }
    target.conversions.push(action.clone());
    debug!(%label, %action, callback_url = ?params.callback_url, "conversion requested");
    Ok(envelope(StatusCode::ACCEPTED, "Conversion initiated"))
}

async fn delete_document(
    State(db): State<Db>,
    Path((app, doc_id)): Path<(String, String)>,
    Query(params): Query<Params>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    db.write()
        .await
        .remove(&(app, doc_id))
        .ok_or_else(|| ApiFailure::document_not_found().with_backtrace(params.backtrace(), "delete_document"))?;
    Ok(envelope(StatusCode::OK, "Document deleted"))
}

async fn delete_version(
    State(db): State<Db>,
    Path((app, doc_id, version)): Path<(String, String, String)>,
    Query(params): Query<Params>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let backtrace = params.backtrace();
    let mut docs = db.write().await;
    let document = docs
        .get_mut(&(app, doc_id))
        .ok_or_else(|| ApiFailure::document_not_found().with_backtrace(backtrace, "delete_version"))?;
    if version == CURRENT || version == document.current {
        return Err(ApiFailure::bad_request(
            "Version is current, change current version first",
        )
        .with_backtrace(backtrace, "delete_version"));
    }
    document
        .versions
        .remove(&version)
        .ok_or_else(|| ApiFailure::version_not_found().with_backtrace(backtrace, "delete_version"))?;
    Ok(envelope(StatusCode::OK, "Version deleted"))
}

async fn get_file(
    State(db): State<Db>,
    Path((app, doc_id, version, filename)): Path<(String, String, String, String)>,
    Query(params): Query<Params>,
) -> ApiResult<Response> {
    let backtrace = params.backtrace();
    let docs = db.read().await;
    let document = docs
        .get(&(app, doc_id))
        .ok_or_else(|| ApiFailure::document_not_found().with_backtrace(backtrace, "get_file"))?;
    let (_, target) = document
        .resolve(&version)
        .ok_or_else(|| ApiFailure::version_not_found().with_backtrace(backtrace, "get_file"))?;
    if target.filename != filename {
        return Err(ApiFailure::new(StatusCode::NOT_FOUND, "File not found").with_backtrace(backtrace, "get_file"));
    }
    Ok((
        [(header::CONTENT_TYPE, target.content_type.clone())],
        target.content.clone(),
    )
        .into_response())
}

async fn document_info(
    State(db): State<Db>,
    Path((app, doc_id)): Path<(String, String)>,
    Query(params): Query<Params>,
) -> ApiResult<Json<Value>> {
    let docs = db.read().await;
    let document = docs
        .get(&(app.clone(), doc_id.clone()))
        .ok_or_else(|| ApiFailure::document_not_found().with_backtrace(params.backtrace(), "document_info"))?;

    let versions: serde_json::Map<String, Value> = document
        .versions
        .iter()
        .map(|(label, version)| {
            let mut entry = json!(version);
            entry["path"] = json!(document_path(&app, &doc_id, label, &version.filename));
            (label.clone(), entry)
        })
        .collect();

    Ok(Json(json!({
        "status": 200,
        "description": "Information retrieved",
        "app": app,
        "doc_id": doc_id,
        "title": document.title,
        "current_version": document.current,
        "versions": versions,
    })))
}

async fn convert(multipart: Multipart) -> ApiResult<Response> {
    let mut upload = read_upload(multipart).await?;
    let backtrace = upload.backtrace();
    let file = upload.take_file()?;
    let action = upload
        .field("action")
        .ok_or_else(|| ApiFailure::bad_request("Missing parameter: action").with_backtrace(backtrace, "convert"))?;

    let mime_type = detect_mime(&file.bytes);
    let (content_type, output) = run_task(action, &mime_type, &file.bytes).ok_or_else(|| {
        ApiFailure::bad_request(format!(
            "No task found for action: '{action}', mime_type: '{mime_type}'"
        ))
        .with_backtrace(backtrace, "convert")
    })?;
    debug!(%action, %mime_type, language = ?upload.field("language"), "converted");

    Ok(([(header::CONTENT_TYPE, content_type)], output).into_response())
}
