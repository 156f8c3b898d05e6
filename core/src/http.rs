//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests are plain data built by `SesameClient::build_*`. Responses carry
//! their body as a `ResponseBody`, a reader that owns the network resource.
//! The body is drained and closed in one idempotent step that `Drop` also
//! runs, so every exit path releases it exactly once without explicit close
//! calls at each branch.

use std::fmt;
use std::io::{self, Cursor, Read};

/// HTTP method for a request. The vendor API is read-only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute and already carries any query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Query string after `?`, if any.
    pub fn query(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, q)| q)
    }
}

/// Owned response body. Closing drains what is left and drops the reader.
pub struct ResponseBody {
    reader: Option<Box<dyn Read + Send>>,
}

impl ResponseBody {
    pub fn new<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            reader: Some(Box::new(reader)),
        }
    }

    pub fn empty() -> Self {
        Self::new(io::empty())
    }

    /// Read the remaining bytes without closing.
    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Drain and release the underlying reader. Later calls are no-ops.
    pub fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            let _ = io::copy(&mut reader, &mut io::sink());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl From<String> for ResponseBody {
    fn from(body: String) -> Self {
        Self::new(Cursor::new(body.into_bytes()))
    }
}

impl From<&str> for ResponseBody {
    fn from(body: &str) -> Self {
        Self::from(body.to_string())
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(body: Vec<u8>) -> Self {
        Self::new(Cursor::new(body))
    }
}

/// An HTTP response whose body is still an open resource.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<ResponseBody>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}
