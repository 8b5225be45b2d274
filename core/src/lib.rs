//! Blocking client for the Colore document storage and conversion service.
//!
//! # Overview
//! Documents are stored under an application namespace, versioned by the
//! service (`v001`, `v002`, ... with `current` pointing at the newest), and can
//! be converted in the background or on the fly. Every operation is one HTTP
//! round trip that either succeeds completely or returns a typed error.
//!
//! # Design
//! - `ColoreClient` holds only its `ClientConfig` and a `Transport`.
//! - Each operation is split into `build_*` (request as data) and `parse_*`
//!   (response to result); `UreqTransport` performs the I/O in between.
//! - Upload content is streamed into a `StagedFile` that is removed when the
//!   call returns.
//! - Failures are `ColoreError::Unavailable`, `Client` (4xx) or `Server`, plus
//!   local failures (I/O, JSON, configuration).
//! - Requests and responses are traced at `debug` level via `tracing`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod staging;
pub mod transport;
pub mod types;

pub use client::{generate_doc_id, ColoreClient, DEFAULT_LANGUAGE};
pub use config::ClientConfig;
pub use error::{ApiError, ColoreError, Result, ServiceBacktrace};
pub use http::{
    Expect, FileUpload, HttpMethod, HttpRequest, HttpResponse, MultipartBody, RequestBody,
};
pub use staging::StagedFile;
pub use transport::{Transport, UreqTransport};
pub use types::{Content, ConversionRequest, CreateDocument, Envelope, UpdateDocument, CURRENT};
