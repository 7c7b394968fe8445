//! Immutable request description
//!
//! An [`ApiRequest`] is built once and never mutated. The 401 handler derives
//! a retry copy with [`ApiRequest::as_retry`], so "already retried" is a
//! property of the value rather than a flag patched onto shared state.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    retry_count: u8,
}

impl ApiRequest {
    /// Request for `path`, relative to the client's base URL
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retry_count: 0,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize any body into JSON
    pub fn with_body<T: Serialize>(self, body: &T) -> Result<Self, serde_json::Error> {
        Ok(self.with_json(serde_json::to_value(body)?))
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Copy of this request marked as a retry
    pub fn as_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn is_retry(&self) -> bool {
        self.retry_count > 0
    }

    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}
