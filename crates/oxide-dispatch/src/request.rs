//! Host HTTP request as seen by the router.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DispatchError;

/// Request methods the router distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    /// Answered like `Get` but always with an empty body.
    Head,
    Options,
}

impl Method {
    const ALL: [Self; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
    ];

    /// Returns the method as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl FromStr for Method {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DispatchError::InvalidArgument(format!("unknown method {s:?}")))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound HTTP request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// URL as received, before any rewriting by earlier handlers.
    pub original_url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Vec<u8>,
}

impl Request {
    /// Creates a new request.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            original_url: url.into(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a HEAD request.
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Gets a header value.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        // Case-insensitive header lookup
        let key_lower = key.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == key_lower)
            .map(|(_, v)| v.as_str())
    }

    /// Parses the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("head".parse::<Method>().unwrap(), Method::Head);
        assert!("INVALID".parse::<Method>().is_err());
    }

    #[test]
    fn test_request_builder() {
        let req = Request::get("/items/5")
            .header("Content-Type", "application/json")
            .body(r#"{"a": 1}"#);

        assert_eq!(req.method, Method::Get);
        assert_eq!(req.original_url, "/items/5");
        assert_eq!(req.get_header("content-type"), Some("application/json"));
        let body: serde_json::Value = req.json().unwrap();
        assert_eq!(body["a"], 1);
    }
}
