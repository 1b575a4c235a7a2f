//! Host HTTP response written by server-side dispatch.

use std::collections::HashMap;

/// An outbound HTTP response.
///
/// Mirrors a streaming host response: once a body chunk has been written the
/// headers count as sent, and once ended nothing more may be written.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
    headers_sent: bool,
    finished: bool,
    destroyed: bool,
}

impl Response {
    /// Creates a new response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            headers_sent: false,
            finished: false,
            destroyed: false,
        }
    }

    /// Creates a 200 OK response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Creates a finished response with HTML content.
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        let mut res = Self::new(status);
        res.set_header("Content-Type", "text/html; charset=utf-8");
        res.end(body.into().into_bytes());
        res
    }

    /// Creates a finished 404 Not Found response.
    pub fn not_found() -> Self {
        let mut res = Self::new(404);
        res.end(b"Not Found".to_vec());
        res
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Sets a header. Ignored once headers are sent.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        if !self.headers_sent {
            self.headers.insert(key.into(), value.into());
        }
        self
    }

    /// Gets a header value.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        let key_lower = key.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == key_lower)
            .map(|(_, v)| v.as_str())
    }

    /// Writes a body chunk, flushing the headers.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) {
        if self.finished {
            return;
        }
        self.headers_sent = true;
        self.body.extend_from_slice(chunk.as_ref());
    }

    /// Writes a final chunk and finishes the response.
    pub fn end(&mut self, chunk: impl AsRef<[u8]>) {
        if self.finished {
            return;
        }
        self.write(chunk);
        self.finished = true;
    }

    /// Terminates the underlying connection without a complete response.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.finished = true;
    }

    /// Returns true once any part of the body was written.
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// Returns true once the response was ended or destroyed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns true if the connection was terminated.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Returns the body as a string.
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Returns the status text for the current status code.
    pub fn status_text(&self) -> &'static str {
        match self.status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            422 => "Unprocessable Entity",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}
