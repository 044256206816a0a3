//! Output decision and output buffer lifecycle.
//!
//! The decision is made once per request: the modified payload when the
//! transformation succeeded, otherwise the original payload (graceful
//! routes) or an error. Whichever body is chosen becomes the request's
//! [`OutputBuffer`], which is released exactly once by the exchange's
//! teardown, whether the response completed or was aborted.

use bytes::Bytes;
use http::header::{ACCEPT_RANGES, REFRESH};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::constants::OUTPUT_CONTENT_TYPE;
use crate::error::FilterError;
use crate::pipeline::ResponseHead;
use crate::transform::TransformError;

/// Counts output buffer allocations and releases.
#[derive(Debug, Default)]
pub struct BufferLedger {
    allocated: AtomicU64,
    released: AtomicU64,
}

impl BufferLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Acquire)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Acquire)
    }

    /// Buffers produced but not yet released
    pub fn outstanding(&self) -> u64 {
        self.allocated().saturating_sub(self.released())
    }
}

/// Which payload the response carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Modified,
    Original,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Modified => "modified",
            Decision::Original => "original",
        }
    }
}

/// Choose the body for the response.
///
/// Returns an error only when processing failed on a route without
/// graceful fallback.
pub fn decide(
    result: Result<Vec<u8>, TransformError>,
    original: Vec<u8>,
    graceful: bool,
) -> Result<(Decision, Vec<u8>), FilterError> {
    match result {
        Ok(modified) => Ok((Decision::Modified, modified)),
        Err(_) if graceful => Ok((Decision::Original, original)),
        Err(e) => Err(FilterError::Unsupported(e)),
    }
}

/// Rewrite the held header for the chosen body.
///
/// The body is served whole: range support is withdrawn and any `Refresh`
/// header is dropped.
pub fn finalize_head(head: &mut ResponseHead, body_len: usize) {
    head.headers.remove(ACCEPT_RANGES);
    head.headers.remove(REFRESH);
    head.set_content_type(OUTPUT_CONTENT_TYPE);
    head.set_content_length(body_len);
}

/// The single body produced for a request.
pub struct OutputBuffer {
    data: Bytes,
    decision: Decision,
    ledger: Arc<BufferLedger>,
}

impl OutputBuffer {
    pub fn new(data: Vec<u8>, decision: Decision, ledger: Arc<BufferLedger>) -> Self {
        ledger.allocated.fetch_add(1, Ordering::AcqRel);
        Self {
            data: Bytes::from(data),
            decision,
            ledger,
        }
    }

    /// A cheap handle to the bytes for sending downstream
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }
}

impl Drop for OutputBuffer {
    fn drop(&mut self) {
        self.ledger.released.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(len = self.data.len(), decision = self.decision.as_str(), "Output buffer released");
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("len", &self.data.len())
            .field("decision", &self.decision)
            .finish()
    }
}
