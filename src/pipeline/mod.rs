// Request pipeline module - request context, per-exchange state and the
// explicit filter chain the host drives for every response.

pub mod chain;
pub mod exchange;
pub mod sink;

pub use chain::{BodyFilter, Chunk, Downstream, FilterChain, Next, Outcome, ResponseHead};
pub use exchange::{Exchange, StageSlots};
pub use sink::CollectingSink;

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Request context that holds the information about an HTTP request the
/// response filters may consult while the response flows through the chain
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    headers: HashMap<String, String>,
    query_params: HashMap<String, String>,
    variables: HashMap<String, String>,
    timestamp: u64,
}

impl RequestContext {
    /// Create a new RequestContext from HTTP request information
    /// Automatically generates a unique request ID (UUID v4) and captures current timestamp
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path,
            headers: HashMap::new(),
            query_params: HashMap::new(),
            variables: HashMap::new(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }

    /// Create a RequestContext from a request target such as `/a.jpg?dark=20`
    ///
    /// The query string is split into arguments; values are percent-decoded.
    pub fn from_target(method: &str, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let mut ctx = Self::new(method.to_string(), path.to_string());
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(s)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            };
            ctx.query_params.insert(decode(key), decode(value));
        }
        ctx
    }

    /// Get the unique request ID
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Get the HTTP method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get a request header by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get a query argument by name
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Get a host-provided variable by name
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Get the request timestamp (Unix epoch seconds)
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn set_query_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query_params.insert(name.into(), value.into());
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }
}
