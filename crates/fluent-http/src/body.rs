//! Request body encoding
//!
//! Every body variant is buffer-backed, so the encoded bytes double as the
//! replay source when the transport has to resend the body on a redirect.

use crate::error::{HttpError, HttpResult};
use bytes::{BufMut, Bytes, BytesMut};
use std::path::{Path, PathBuf};

/// `application/json` with UTF-8 charset
pub const JSON: &str = "application/json;charset=UTF-8";
/// `application/x-www-form-urlencoded` with UTF-8 charset
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded;charset=UTF-8";
/// `text/plain` with UTF-8 charset
pub const TEXT_PLAIN: &str = "text/plain;charset=UTF-8";

const OCTET_STREAM: &str = "application/octet-stream";

/// Request body types
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body
    #[default]
    None,
    /// Form data, encoded as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// JSON text, sent verbatim
    Json(String),
    /// Plain text, sent verbatim
    Text(String),
    /// Raw bytes with an explicit content type
    Bytes { content_type: String, data: Bytes },
    /// A single file uploaded as `multipart/form-data`
    Multipart { field: String, path: PathBuf },
}

/// Bytes ready for the wire plus the metadata derived from them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub bytes: Bytes,
    pub content_type: String,
}

impl EncodedBody {
    /// Content length of the encoded body
    pub fn content_length(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl Body {
    /// Encode the body. Returns `Ok(None)` for [`Body::None`].
    pub fn encode(&self) -> HttpResult<Option<EncodedBody>> {
        let encoded = match self {
            Body::None => return Ok(None),
            Body::Form(pairs) => EncodedBody {
                bytes: Bytes::from(encode_form(pairs)),
                content_type: FORM_URLENCODED.to_string(),
            },
            Body::Json(text) => EncodedBody {
                bytes: Bytes::copy_from_slice(text.as_bytes()),
                content_type: JSON.to_string(),
            },
            Body::Text(text) => EncodedBody {
                bytes: Bytes::copy_from_slice(text.as_bytes()),
                content_type: TEXT_PLAIN.to_string(),
            },
            Body::Bytes { content_type, data } => EncodedBody {
                bytes: data.clone(),
                content_type: content_type.clone(),
            },
            Body::Multipart { field, path } => encode_file(field, path)?,
        };
        Ok(Some(encoded))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Body::None)
    }
}

/// Encode pairs as `application/x-www-form-urlencoded`, sorted by key.
pub fn encode_form(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in sorted {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Read `path` and wrap it in a single-part `multipart/form-data` body.
pub fn encode_file(field: &str, path: &Path) -> HttpResult<EncodedBody> {
    let content = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            HttpError::InvalidRequest(format!("{} does not name a file", path.display()))
        })?;

    let mut writer = MultipartWriter::new();
    writer.write_file(field, &file_name, &content);
    Ok(writer.finish())
}

/// Writes `multipart/form-data` sections into an in-memory buffer.
#[derive(Debug)]
struct MultipartWriter {
    boundary: String,
    buf: BytesMut,
}

impl MultipartWriter {
    fn new() -> Self {
        Self {
            boundary: uuid::Uuid::new_v4().simple().to_string(),
            buf: BytesMut::new(),
        }
    }

    fn write_file(&mut self, field: &str, file_name: &str, content: &[u8]) {
        let header = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            self.boundary,
            escape_quotes(field),
            escape_quotes(file_name),
            OCTET_STREAM,
        );
        self.buf.reserve(header.len() + content.len() + 2);
        self.buf.put_slice(header.as_bytes());
        self.buf.put_slice(content);
        self.buf.put_slice(b"\r\n");
    }

    /// Write the closing delimiter; the body is complete only after this.
    fn finish(mut self) -> EncodedBody {
        self.buf.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        EncodedBody {
            bytes: self.buf.freeze(),
            content_type: format!("multipart/form-data; boundary={}", self.boundary),
        }
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
