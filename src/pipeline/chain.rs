//! Explicit response filter chain.
//!
//! The host builds one [`FilterChain`] at startup and drives it for every
//! response: once with the response header, then once per body chunk in
//! arrival order. Each [`BodyFilter`] receives a [`Next`] handle for the rest
//! of the chain; the terminal [`Downstream`] is the transport.
//!
//! A stage may hold back the header (and body) while it buffers, as long as
//! it eventually forwards exactly one header and one body through `Next`.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use std::sync::Arc;

use super::Exchange;
use crate::error::FilterError;

/// Response status line and headers as seen by the filters.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }

    /// Declared body length; `None` when absent or unparseable.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn set_content_length(&mut self, len: usize) {
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn set_content_type(&mut self, content_type: &'static str) {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
}

/// One piece of response body; `last` marks the end of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Bytes,
    pub last: bool,
}

impl Chunk {
    pub fn new(data: impl Into<Bytes>, last: bool) -> Self {
        Self {
            data: data.into(),
            last,
        }
    }

    /// A body piece with more to follow.
    pub fn data(data: impl Into<Bytes>) -> Self {
        Self::new(data, false)
    }

    /// The final body piece.
    pub fn last(data: impl Into<Bytes>) -> Self {
        Self::new(data, true)
    }

    /// An empty end-of-body marker.
    pub fn eos() -> Self {
        Self::new(Bytes::new(), true)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of one filter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Data or end-of-stream went downstream (or had nothing to forward)
    Forwarded,
    /// Input was buffered without forward progress; hold the exchange open
    /// until more body arrives
    Pending,
}

/// Terminal stage: the transport that receives the final header and body.
pub trait Downstream {
    fn send_header(&mut self, head: ResponseHead) -> Result<(), FilterError>;

    /// `None` is a flush request without data.
    fn send_body(&mut self, chunk: Option<Chunk>) -> Result<(), FilterError>;
}

/// A response filter stage.
pub trait BodyFilter: Send + Sync {
    fn name(&self) -> &'static str;

    fn header(
        &self,
        exchange: &mut Exchange,
        head: ResponseHead,
        mut next: Next<'_>,
    ) -> Result<Outcome, FilterError> {
        next.header(exchange, head)
    }

    fn body(
        &self,
        exchange: &mut Exchange,
        chunk: Option<Chunk>,
        mut next: Next<'_>,
    ) -> Result<Outcome, FilterError> {
        next.body(exchange, chunk)
    }
}

/// Handle to the remainder of the chain after the current stage.
pub struct Next<'a> {
    rest: &'a [Arc<dyn BodyFilter>],
    sink: &'a mut dyn Downstream,
}

impl<'a> Next<'a> {
    pub fn header(&mut self, exchange: &mut Exchange, head: ResponseHead) -> Result<Outcome, FilterError> {
        match self.rest.split_first() {
            Some((stage, rest)) => stage.header(
                exchange,
                head,
                Next {
                    rest,
                    sink: &mut *self.sink,
                },
            ),
            None => {
                self.sink.send_header(head)?;
                Ok(Outcome::Forwarded)
            }
        }
    }

    pub fn body(&mut self, exchange: &mut Exchange, chunk: Option<Chunk>) -> Result<Outcome, FilterError> {
        match self.rest.split_first() {
            Some((stage, rest)) => stage.body(
                exchange,
                chunk,
                Next {
                    rest,
                    sink: &mut *self.sink,
                },
            ),
            None => {
                self.sink.send_body(chunk)?;
                Ok(Outcome::Forwarded)
            }
        }
    }
}

/// Ordered list of filter stages, built once and shared by reference.
#[derive(Clone, Default)]
pub struct FilterChain {
    stages: Vec<Arc<dyn BodyFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage; stages see the response in insertion order.
    pub fn with(mut self, stage: Arc<dyn BodyFilter>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn header(
        &self,
        exchange: &mut Exchange,
        head: ResponseHead,
        sink: &mut dyn Downstream,
    ) -> Result<Outcome, FilterError> {
        Next {
            rest: &self.stages,
            sink,
        }
        .header(exchange, head)
    }

    pub fn body(
        &self,
        exchange: &mut Exchange,
        chunk: Option<Chunk>,
        sink: &mut dyn Downstream,
    ) -> Result<Outcome, FilterError> {
        Next {
            rest: &self.stages,
            sink,
        }
        .body(exchange, chunk)
    }

    /// Drive a whole response through the chain: header, then every chunk.
    ///
    /// Returns the outcome of the last invocation; stops at the first error.
    pub fn run<I>(
        &self,
        exchange: &mut Exchange,
        head: ResponseHead,
        chunks: I,
        sink: &mut dyn Downstream,
    ) -> Result<Outcome, FilterError>
    where
        I: IntoIterator<Item = Chunk>,
    {
        let mut outcome = self.header(exchange, head, sink)?;
        for chunk in chunks {
            outcome = self.body(exchange, Some(chunk), sink)?;
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("stages", &self.stage_names())
            .finish()
    }
}
