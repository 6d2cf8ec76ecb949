//! HTTP Transport
//!
//! HTTP client interface and implementations used by the signed request consumer.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{NetworkError, ProtocolError, SocialAuthError};

/// Default upper bound for response bodies (4 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL, including any query string.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: RequestBody,
}

impl HttpRequest {
    /// Create a request without headers or body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Text body, if any.
    pub fn body_text(&self) -> Option<&str> {
        match &self.body {
            RequestBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// HTTP method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Request body.
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Pre-encoded body (form-encoded, JSON or XML); content type is set by header.
    Text(String),
    /// `multipart/form-data` body.
    Multipart(MultipartForm),
}

/// Multipart form with plain fields and an optional file.
#[derive(Clone, Debug, Default)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub file: Option<FilePart>,
}

/// File part of a multipart upload.
#[derive(Clone)]
pub struct FilePart {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("field_name", &self.field_name)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Status text.
    pub status_text: String,
    /// Response headers (lowercase names).
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SocialAuthError>;
}

/// Default reqwest-based HTTP transport.
///
/// No timeout is applied unless one is set with [`ReqwestHttpTransport::with_timeout`].
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    max_response_size: usize,
}

impl ReqwestHttpTransport {
    /// Create new transport with default settings.
    pub fn new() -> Result<Self, SocialAuthError> {
        Self::with_options(None, DEFAULT_MAX_RESPONSE_SIZE)
    }

    /// Create transport with a request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, SocialAuthError> {
        Self::with_options(Some(timeout), DEFAULT_MAX_RESPONSE_SIZE)
    }

    /// Create transport with custom options.
    pub fn with_options(
        timeout: Option<Duration>,
        max_response_size: usize,
    ) -> Result<Self, SocialAuthError> {
        // Redirects from token endpoints are protocol errors, never followed.
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            SocialAuthError::Network(NetworkError::ClientInit {
                message: e.to_string(),
            })
        })?;

        Ok(Self {
            client,
            max_response_size,
        })
    }

    fn multipart_form(
        url: &str,
        form: MultipartForm,
    ) -> Result<reqwest::multipart::Form, SocialAuthError> {
        let mut multipart = reqwest::multipart::Form::new();
        for (name, value) in form.fields {
            multipart = multipart.text(name, value);
        }
        if let Some(file) = form.file {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|e| {
                    SocialAuthError::Network(NetworkError::InvalidRequest {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
                })?;
            multipart = multipart.part(file.field_name, part);
        }
        Ok(multipart)
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SocialAuthError> {
        // OAuth2 query placement puts the access token in the URL.
        let url = strip_query(&request.url);

        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        req_builder = match request.body {
            RequestBody::Empty => req_builder,
            RequestBody::Text(body) => req_builder.body(body),
            RequestBody::Multipart(form) => {
                req_builder.multipart(Self::multipart_form(&url, form)?)
            }
        };

        let mut response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SocialAuthError::Network(NetworkError::Timeout { url: url.clone() })
            } else {
                SocialAuthError::Network(NetworkError::ConnectionFailed {
                    url: url.clone(),
                    message: e.without_url().to_string(),
                })
            }
        })?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();

        if (300..400).contains(&status) {
            let location = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(SocialAuthError::Protocol(ProtocolError::UnexpectedRedirect {
                location,
            }));
        }

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string().to_lowercase(), v.to_string());
            }
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_response_size {
                return Err(SocialAuthError::Protocol(ProtocolError::ResponseTooLarge {
                    size: len as usize,
                }));
            }
        }

        // Chunked bodies carry no length up front; stop once the limit is passed.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            SocialAuthError::Protocol(ProtocolError::InvalidResponse {
                url: url.clone(),
                message: e.without_url().to_string(),
            })
        })? {
            if bytes.len() + chunk.len() > self.max_response_size {
                return Err(SocialAuthError::Protocol(ProtocolError::ResponseTooLarge {
                    size: bytes.len() + chunk.len(),
                }));
            }
            bytes.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(HttpResponse {
            status,
            status_text,
            headers,
            body,
        })
    }
}

/// `url` without its query string or fragment.
pub fn strip_query(url: &str) -> String {
    url.split(['?', '#']).next().unwrap_or(url).to_string()
}

/// Mock HTTP transport for testing.
///
/// Responses are returned in the order they were queued.
#[derive(Default)]
pub struct MockHttpTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    request_history: Mutex<Vec<HttpRequest>>,
    default_response: Mutex<Option<HttpResponse>>,
}

impl MockHttpTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// Queue a response with a raw body.
    pub fn queue_text_response(&self, status: u16, content_type: &str, body: &str) -> &Self {
        self.queue_response(HttpResponse {
            status,
            status_text: if status == 200 { "OK" } else { "Error" }.to_string(),
            headers: [("content-type".to_string(), content_type.to_string())]
                .into_iter()
                .collect(),
            body: body.to_string(),
        })
    }

    /// Queue a JSON response.
    pub fn queue_json_response<T: serde::Serialize>(&self, status: u16, body: &T) -> &Self {
        let body = serde_json::to_string(body).unwrap();
        self.queue_text_response(status, "application/json", &body)
    }

    /// Queue a form-encoded response.
    pub fn queue_form_response(&self, status: u16, body: &str) -> &Self {
        self.queue_text_response(status, "application/x-www-form-urlencoded", body)
    }

    /// Set default response when queue is empty.
    pub fn set_default_response(&self, response: HttpResponse) -> &Self {
        *self.default_response.lock().unwrap() = Some(response);
        self
    }

    /// Get request history.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.request_history.lock().unwrap().clone()
    }

    /// Get last request.
    pub fn get_last_request(&self) -> Option<HttpRequest> {
        self.request_history.lock().unwrap().last().cloned()
    }

    /// Clear request history.
    pub fn clear_history(&self) {
        self.request_history.lock().unwrap().clear();
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SocialAuthError> {
        let url = strip_query(&request.url);
        self.request_history.lock().unwrap().push(request);

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.default_response.lock().unwrap().clone());

        response.ok_or_else(|| {
            SocialAuthError::Network(NetworkError::ConnectionFailed {
                url,
                message: "No mock response available".to_string(),
            })
        })
    }
}

/// Create mock HTTP transport for testing.
pub fn create_mock_transport() -> MockHttpTransport {
    MockHttpTransport::new()
}
