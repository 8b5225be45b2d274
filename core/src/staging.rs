//! Scoped temporary files for uploads.
//!
//! Upload content is copied into a temporary file on disk rather than held in
//! memory, so a caller can hand over a reader for a very large file. The file
//! lives exactly as long as the `StagedFile` value and is removed when it is
//! dropped, whether the upload succeeded or not.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::types::Content;

const OCTET_STREAM: &str = "application/octet-stream";

/// Upload content staged in a temporary file.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    len: u64,
    content_type: String,
}

impl StagedFile {
    /// Copy `content` into a fresh temporary file.
    ///
    /// The part content type is sniffed from the staged bytes, falling back to
    /// the extension of `filename` and then to `application/octet-stream`.
    pub fn stage(content: Content<'_>, filename: Option<&str>) -> io::Result<Self> {
        let mut file = tempfile::Builder::new().prefix("colore").tempfile()?;
        let len = match content {
            Content::Bytes(bytes) => {
                file.write_all(bytes)?;
                bytes.len() as u64
            }
            Content::Reader(reader) => io::copy(reader, &mut file)?,
        };
        file.flush()?;

        let content_type = sniff_content_type(file.path(), filename);
        debug!(path = ?file.path(), bytes = len, content_type = %content_type, "staged upload");

        Ok(Self {
            file,
            len,
            content_type,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Name of the temporary file itself, used when no filename is supplied.
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string())
    }
}

fn sniff_content_type(path: &Path, filename: Option<&str>) -> String {
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return kind.mime_type().to_string();
    }
    filename
        .and_then(|name| mime_guess::from_path(name).first())
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}
