//! Wire-level request/response types and the transport seam.
//!
//! Requests are either JSON (analysis fetch, chatbot, lock cleanup) or
//! `multipart/form-data` (CSV upload). The server signals overload with HTTP 429
//! and a JSON body; a `code` equal to [`LOCK_SENTINEL`] means the per-user
//! analysis lock is held and an explicit unlock is required.
//!
//! [`classify`] is the only place where response bodies are inspected for
//! error shapes.

use std::future::Future;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{RequestError, TransportError};

/// `code` value the server uses for "analysis lock already held".
pub const LOCK_SENTINEL: &str = "LOCK_EXISTS";

/// HTTP method of a dashboard request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// One field of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    /// A plain text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// A file field.
    File {
        /// Field name.
        name: String,
        /// File name sent in the part's content disposition.
        file_name: String,
        /// MIME type of the file.
        content_type: String,
        /// File contents.
        bytes: Vec<u8>,
    },
}

impl FormPart {
    /// A text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A file field.
    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self::File {
            name: name.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// The field name.
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// Body of an outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// A JSON document.
    Json(Value),
    /// A `multipart/form-data` form.
    Multipart(Vec<FormPart>),
}

/// An outbound HTTP request, reusable across attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Body.
    pub body: RequestBody,
}

impl HttpRequest {
    /// A `GET` request without a body.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// A `POST` request with a JSON body.
    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Json(body),
        }
    }

    /// A `POST` request with a multipart form.
    pub fn post_multipart(url: impl Into<String>, parts: Vec<FormPart>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Multipart(parts),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A raw HTTP response as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A response with a raw body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one HTTP request. Retries, timeouts and cancellation are handled by
/// the caller; an implementation makes exactly one attempt per call.
pub trait Transport {
    /// Dispatch `request` and return the raw response.
    fn send(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> {
        (**self).send(request)
    }
}

/// Error-ish fields the server may put in a JSON body.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    error: Option<String>,
    message: Option<String>,
    user_id: Option<Value>,
}

impl ErrorBody {
    fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    fn text(&self) -> Option<String> {
        self.error.clone().or_else(|| self.message.clone())
    }
}

fn owner_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a raw response into a JSON payload or a typed error.
///
/// - 2xx: the body must be JSON; a top-level `error` string turns it into
///   [`RequestError::ServerError`].
/// - 429 with `code == "LOCK_EXISTS"`: [`RequestError::ResourceLocked`].
/// - 429 otherwise: [`RequestError::ServerBusy`].
/// - anything else: [`RequestError::ServerError`].
///
/// # Examples
///
/// ```rust
/// use sentiview::wire::{classify, HttpResponse};
/// use sentiview::RequestError;
/// use serde_json::json;
///
/// let locked = HttpResponse::json(429, &json!({"code": "LOCK_EXISTS", "user_id": 42}));
/// assert_eq!(
///     classify(&locked),
///     Err(RequestError::ResourceLocked { owner_id: Some("42".into()), message: None })
/// );
///
/// let ok = HttpResponse::json(200, &json!({"title": "Pemilu"}));
/// assert_eq!(classify(&ok).unwrap()["title"], "Pemilu");
/// ```
pub fn classify(response: &HttpResponse) -> Result<Value, RequestError> {
    if response.is_success() {
        let value: Value =
            serde_json::from_slice(&response.body).map_err(|e| RequestError::InvalidPayload {
                message: e.to_string(),
            })?;
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(RequestError::ServerError {
                status: response.status,
                message: message.to_string(),
            });
        }
        return Ok(value);
    }

    let body = ErrorBody::parse(&response.body);
    match response.status {
        429 if body.code.as_deref() == Some(LOCK_SENTINEL) => Err(RequestError::ResourceLocked {
            owner_id: body.user_id.as_ref().and_then(owner_id),
            message: body.text(),
        }),
        429 => Err(RequestError::ServerBusy {
            message: body.text(),
        }),
        status => Err(RequestError::ServerError {
            status,
            message: body
                .text()
                .unwrap_or_else(|| format!("HTTP status {}", status)),
        }),
    }
}
