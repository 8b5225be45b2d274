//! Executes `HttpRequest` values over the network.
//!
//! `ColoreClient` is generic over `Transport`; `UreqTransport` is the default
//! blocking implementation. Non-2xx statuses come back as data so the client's
//! error mapper can classify them. Only failing to reach the service at all is
//! turned into an error here.
//!
//! Uploads are encoded with ureq's multipart `Form`. The file part streams
//! from disk and every other part is sized, so the body goes out with a
//! `Content-Length` rather than chunked.

use std::io::{self, Read};

use ureq::typestate::{WithBody, WithoutBody};
use ureq::unversioned::multipart::{Form, Part};
use ureq::{RequestBuilder, Timeout};

use crate::error::{ColoreError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, MultipartBody, RequestBody};

/// Performs one HTTP round trip.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            query,
            body,
            ..
        } = request;

        let response = match method {
            HttpMethod::Head => without_body(self.agent.head(&url), &headers, &query),
            HttpMethod::Get => without_body(self.agent.get(&url), &headers, &query),
            HttpMethod::Delete => without_body(self.agent.delete(&url), &headers, &query),
            HttpMethod::Post => with_body(self.agent.post(&url), &headers, &query, body),
            HttpMethod::Put => with_body(self.agent.put(&url), &headers, &query, body),
        }?;
        read_response(response)
    }
}

fn decorate<B>(
    mut builder: RequestBuilder<B>,
    headers: &[(String, String)],
    query: &[(String, String)],
) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (key, value) in query {
        builder = builder.query(key, value);
    }
    builder
}

fn without_body(
    builder: RequestBuilder<WithoutBody>,
    headers: &[(String, String)],
    query: &[(String, String)],
) -> Result<ureq::http::Response<ureq::Body>> {
    decorate(builder, headers, query).call().map_err(map_ureq_error)
}

fn with_body(
    builder: RequestBuilder<WithBody>,
    headers: &[(String, String)],
    query: &[(String, String)],
    body: RequestBody,
) -> Result<ureq::http::Response<ureq::Body>> {
    let builder = decorate(builder, headers, query);
    match body {
        RequestBody::Empty => builder.send_empty().map_err(map_ureq_error),
        RequestBody::Multipart(upload) => {
            let form = multipart_form(&upload)?;
            builder.send(form).map_err(map_ureq_error)
        }
    }
}

fn multipart_form(upload: &MultipartBody) -> Result<Form<'_>> {
    let file = &upload.file;
    let part = Part::file(&file.path)?
        .file_name(&file.filename)
        .mime_str(&file.content_type)
        .map_err(|e| {
            ColoreError::Transport(format!("invalid content type '{}': {e}", file.content_type))
        })?;
    let form = upload
        .fields
        .iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value));
    Ok(form.part(&file.field, part))
}

fn read_response(response: ureq::http::Response<ureq::Body>) -> Result<HttpResponse> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    let mut body = Vec::new();
    response
        .into_body()
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|e| ColoreError::Transport(format!("failed to read response body: {e}")))?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn map_ureq_error(err: ureq::Error) -> ColoreError {
    match err {
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => ColoreError::Unavailable,
        ureq::Error::Timeout(Timeout::Resolve | Timeout::Connect) => ColoreError::Unavailable,
        ureq::Error::Io(ref io) if is_connect_failure(io.kind()) => ColoreError::Unavailable,
        other => ColoreError::Transport(other.to_string()),
    }
}

fn is_connect_failure(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Expect, FileUpload};

    fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn refused_connection_is_unavailable() {
        let request = HttpRequest {
            method: HttpMethod::Head,
            url: format!("http://127.0.0.1:{}/", unused_port()),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            expect: Expect::Nothing,
        };
        let err = UreqTransport::new().execute(request).unwrap_err();
        assert!(matches!(err, ColoreError::Unavailable), "got {err:?}");
    }

    #[test]
    fn connect_failure_kinds() {
        assert!(is_connect_failure(io::ErrorKind::ConnectionRefused));
        assert!(!is_connect_failure(io::ErrorKind::NotFound));
    }

    #[test]
    fn connection_failed_maps_to_unavailable() {
        assert!(matches!(
            map_ureq_error(ureq::Error::ConnectionFailed),
            ColoreError::Unavailable
        ));
        assert!(matches!(
            map_ureq_error(ureq::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused))),
            ColoreError::Unavailable
        ));
    }

    #[test]
    fn connect_timeout_maps_to_unavailable() {
        assert!(matches!(
            map_ureq_error(ureq::Error::Timeout(Timeout::Connect)),
            ColoreError::Unavailable
        ));
        assert!(matches!(
            map_ureq_error(ureq::Error::Timeout(Timeout::Resolve)),
            ColoreError::Unavailable
        ));
        assert!(matches!(
            map_ureq_error(ureq::Error::Timeout(Timeout::RecvResponse)),
            ColoreError::Transport(_)
        ));
    }

    #[test]
    fn multipart_form_keeps_fields_and_file_part() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged");
        std::fs::write(&path, b"hello").unwrap();
        let upload = MultipartBody {
            fields: vec![
                ("actions[]".to_string(), "ocr".to_string()),
                ("actions[]".to_string(), "ocr_text".to_string()),
            ],
            file: FileUpload {
                field: "file".to_string(),
                filename: "notes.txt".to_string(),
                content_type: "text/plain".to_string(),
                path,
                len: 5,
            },
        };

        let mut body = String::new();
        multipart_form(&upload).unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body.matches("name=\"actions[]\"").count(), 2);
        assert!(body.contains("name=\"file\"; filename=\"notes.txt\""));
        assert!(body.contains("Content-Type: text/plain"));
        assert!(body.contains("\r\n\r\nhello\r\n"));
    }

    #[test]
    fn missing_staged_file_is_io_error() {
        let upload = MultipartBody {
            fields: Vec::new(),
            file: FileUpload {
                field: "file".to_string(),
                filename: "gone.txt".to_string(),
                content_type: "text/plain".to_string(),
                path: std::path::PathBuf::from("/nonexistent/colore/staged"),
                len: 0,
            },
        };
        assert!(matches!(multipart_form(&upload), Err(ColoreError::Io(_))));
    }

    #[test]
    fn other_io_errors_are_transport_errors() {
        let err = map_ureq_error(ureq::Error::Io(io::Error::new(io::ErrorKind::Other, "boom")));
        assert!(matches!(err, ColoreError::Transport(_)));
    }
}
