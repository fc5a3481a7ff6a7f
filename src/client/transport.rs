//! The resource-mutation transport contract.
//!
//! The core does not own an HTTP stack; it consumes this trait. A non-2xx
//! response surfaces as a `TransportError` carrying the status and the
//! structured body, which is all the classifiers need.

use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    pub data: Option<Value>,
    pub params: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            data: None,
            params: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>, data: Value) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            data: Some(data),
            params: Vec::new(),
        }
    }
}

/// One logical request/response round-trip. Implementations carry their own
/// fixed request timeout; an exceeded timeout is reported as status 0.
pub trait ResourceTransport {
    fn request(&self, req: TransportRequest) -> Result<Value, TransportError>;
}

impl<T: ResourceTransport + ?Sized> ResourceTransport for &T {
    fn request(&self, req: TransportRequest) -> Result<Value, TransportError> {
        (**self).request(req)
    }
}

/// A rejected round-trip: status 0 means the request never completed
/// (network failure or timeout), anything else is the server's status.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("transport error (status {status}): {body}")]
pub struct TransportError {
    pub status: u16,
    pub body: Value,
}

impl TransportError {
    pub fn network(reason: &str) -> Self {
        Self {
            status: 0,
            body: serde_json::json!({ "detail": reason }),
        }
    }

    /// The documented structured code, if the body carries one.
    pub fn code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }

    pub fn detail(&self) -> Option<&str> {
        self.body.get("detail").and_then(Value::as_str)
    }
}
