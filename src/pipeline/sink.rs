//! In-memory downstream used by the CLI and the tests.

use super::chain::{Chunk, Downstream, ResponseHead};
use crate::error::FilterError;

/// Downstream that collects the emitted header and body.
///
/// It enforces the transport contract: one header, body only after the
/// header, nothing after the end-of-body marker.
#[derive(Debug, Default)]
pub struct CollectingSink {
    head: Option<ResponseHead>,
    body: Vec<u8>,
    body_calls: usize,
    end_markers: usize,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Number of body invocations that reached the sink, flushes included.
    pub fn body_calls(&self) -> usize {
        self.body_calls
    }

    /// Number of end-of-body markers received (at most one).
    pub fn end_markers(&self) -> usize {
        self.end_markers
    }

    pub fn is_complete(&self) -> bool {
        self.end_markers == 1
    }
}

impl Downstream for CollectingSink {
    fn send_header(&mut self, head: ResponseHead) -> Result<(), FilterError> {
        if self.head.is_some() {
            return Err(FilterError::Downstream("header already sent".to_string()));
        }
        self.head = Some(head);
        Ok(())
    }

    fn send_body(&mut self, chunk: Option<Chunk>) -> Result<(), FilterError> {
        self.body_calls += 1;
        let Some(chunk) = chunk else {
            return Ok(());
        };

        if self.head.is_none() {
            return Err(FilterError::Downstream("body sent before header".to_string()));
        }
        if self.end_markers > 0 {
            return Err(FilterError::Downstream(
                "body sent after end of stream".to_string(),
            ));
        }

        self.body.extend_from_slice(&chunk.data);
        if chunk.last {
            self.end_markers += 1;
        }
        Ok(())
    }
}
