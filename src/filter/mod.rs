//! Streaming JPEG body filter.
//!
//! [`JpegFilter`] is a [`BodyFilter`] stage. For every response on a route
//! with transformation enabled it holds the header back, sniffs the first
//! body chunk, accumulates a JPEG payload up to the route's buffer limit,
//! runs the route's effect chain once and emits exactly one replacement
//! body with an exact `Content-Length`. Anything that is not a JPEG is
//! forwarded untouched.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use http::StatusCode;
//! use jpeg_body_filter::filter::JpegFilter;
//! use jpeg_body_filter::pipeline::{
//!     Chunk, CollectingSink, Exchange, FilterChain, RequestContext, ResponseHead,
//! };
//! use jpeg_body_filter::transform::TransformSettings;
//!
//! let filter = Arc::new(JpegFilter::with_settings(TransformSettings::default()));
//! let chain = FilterChain::new().with(filter);
//!
//! let mut exchange = Exchange::new(RequestContext::from_target("GET", "/notes.txt"));
//! let mut sink = CollectingSink::new();
//! let body = Chunk::last(&b"plain text, not an image"[..]);
//! chain
//!     .run(&mut exchange, ResponseHead::new(StatusCode::OK), [body], &mut sink)
//!     .unwrap();
//!
//! assert_eq!(sink.body(), b"plain text, not an image");
//! ```

pub mod ingest;
pub mod output;
pub mod phase;
pub mod sniff;

pub use ingest::IngestBuffer;
pub use output::{decide, finalize_head, BufferLedger, Decision, OutputBuffer};
pub use phase::Phase;
pub use sniff::{sniff, Signature};

use http::StatusCode;
use std::sync::Arc;

use crate::config::{CompiledConfig, FilterHandle};
use crate::constants::MULTIPART_REPLACE;
use crate::error::FilterError;
use crate::pipeline::{BodyFilter, Chunk, Exchange, Next, Outcome, ResponseHead};
use crate::transform::{process_payload, TransformSettings};

/// Per-request filter state, kept in the exchange's stage slots.
struct RequestState {
    phase: Phase,
    settings: Arc<TransformSettings>,
    /// Header held until the body decision
    head: Option<ResponseHead>,
    ingest: Option<IngestBuffer>,
    capacity: usize,
    skip: bool,
    eos_sent: bool,
}

impl RequestState {
    fn engaged(settings: Arc<TransformSettings>, head: ResponseHead, capacity: usize) -> Self {
        Self {
            phase: Phase::Start,
            settings,
            head: Some(head),
            ingest: None,
            capacity,
            skip: false,
            eos_sent: false,
        }
    }

    /// The header was already forwarded; everything passes through.
    fn skipped(settings: Arc<TransformSettings>) -> Self {
        Self {
            phase: Phase::Pass,
            settings,
            head: None,
            ingest: None,
            capacity: 0,
            skip: true,
            eos_sent: false,
        }
    }

    fn advance(&mut self, next: Phase) -> Result<(), FilterError> {
        if !self.phase.can_transition_to(next) {
            return Err(FilterError::protocol(
                self.phase,
                format!("illegal transition to {}", next),
            ));
        }
        if self.phase != next {
            tracing::trace!(from = %self.phase, to = %next, "Phase transition");
        }
        if next.is_absorbing() {
            self.ingest = None;
        }
        self.phase = next;
        Ok(())
    }
}

/// The JPEG transformation stage.
pub struct JpegFilter {
    handle: FilterHandle,
    ledger: Arc<BufferLedger>,
}

impl JpegFilter {
    pub fn new(handle: FilterHandle) -> Self {
        Self {
            handle,
            ledger: BufferLedger::new(),
        }
    }

    /// A filter applying `settings` to every path.
    pub fn with_settings(settings: TransformSettings) -> Self {
        Self::new(FilterHandle::new(CompiledConfig::single(settings)))
    }

    pub fn handle(&self) -> &FilterHandle {
        &self.handle
    }

    /// Output buffer accounting shared by all requests through this filter
    pub fn ledger(&self) -> &Arc<BufferLedger> {
        &self.ledger
    }

    /// Current phase of the request carried by `exchange`, if the filter
    /// engaged on it.
    pub fn phase(exchange: &Exchange) -> Option<Phase> {
        exchange.slots().get::<RequestState>().map(|state| state.phase)
    }

    /// Whether the filter decided at header time to leave the response alone.
    pub fn is_skipped(exchange: &Exchange) -> bool {
        exchange
            .slots()
            .get::<RequestState>()
            .map(|state| state.skip)
            .unwrap_or(false)
    }

    fn skip(
        &self,
        exchange: &mut Exchange,
        settings: Arc<TransformSettings>,
        head: ResponseHead,
        next: &mut Next<'_>,
        reason: &'static str,
    ) -> Result<Outcome, FilterError> {
        tracing::debug!(
            request_id = %exchange.request_id(),
            path = %exchange.context().path(),
            reason = reason,
            "Skipping JPEG processing"
        );
        exchange.slots_mut().insert(RequestState::skipped(settings));
        next.header(exchange, head)
    }

    fn step(
        &self,
        state: &mut RequestState,
        exchange: &mut Exchange,
        chunk: Option<Chunk>,
        next: &mut Next<'_>,
    ) -> Result<Outcome, FilterError> {
        match state.phase {
            Phase::Start => self.start(state, exchange, chunk, next),
            Phase::Read => self.read(state, exchange, chunk, next),
            Phase::Process => Err(FilterError::protocol(
                Phase::Process,
                "body received after processing failed",
            )),
            Phase::Pass => self.pass(state, exchange, chunk, next),
            Phase::Done => self.done(state, exchange, chunk, next),
        }
    }

    fn start(
        &self,
        state: &mut RequestState,
        exchange: &mut Exchange,
        chunk: Option<Chunk>,
        next: &mut Next<'_>,
    ) -> Result<Outcome, FilterError> {
        let chunk = match chunk {
            Some(chunk) if !chunk.is_empty() || chunk.last => chunk,
            _ => return Ok(Outcome::Pending),
        };

        let signature = sniff(&chunk.data);
        if !signature.is_jpeg() {
            tracing::debug!(
                request_id = %exchange.request_id(),
                signature = ?signature,
                len = chunk.len(),
                "Body is not a recognized JPEG, passing through"
            );
            state.advance(Phase::Pass)?;
            if let Some(head) = state.head.take() {
                next.header(exchange, head)?;
            }
            return self.pass(state, exchange, Some(chunk), next);
        }

        state.ingest = Some(IngestBuffer::with_capacity(state.capacity)?);
        state.advance(Phase::Read)?;
        self.read(state, exchange, Some(chunk), next)
    }

    fn read(
        &self,
        state: &mut RequestState,
        exchange: &mut Exchange,
        chunk: Option<Chunk>,
        next: &mut Next<'_>,
    ) -> Result<Outcome, FilterError> {
        let Some(chunk) = chunk else {
            return Ok(Outcome::Pending);
        };
        state.advance(Phase::Read)?;

        let ingest = state
            .ingest
            .as_mut()
            .ok_or_else(|| FilterError::protocol(Phase::Read, "accumulator missing"))?;
        if let Err(e) = ingest.append(&chunk.data) {
            tracing::warn!(
                request_id = %exchange.request_id(),
                len = chunk.len(),
                accepted = ingest.len(),
                capacity = ingest.capacity(),
                error = %e,
                "Rejecting payload"
            );
            return Err(e);
        }

        if !chunk.last {
            return Ok(Outcome::Pending);
        }

        state.advance(Phase::Process)?;
        self.process(state, exchange, next)
    }

    fn process(
        &self,
        state: &mut RequestState,
        exchange: &mut Exchange,
        next: &mut Next<'_>,
    ) -> Result<Outcome, FilterError> {
        let payload = state
            .ingest
            .take()
            .map(IngestBuffer::into_inner)
            .unwrap_or_default();
        let input_len = payload.len();

        let result = process_payload(&payload, &state.settings, exchange.context());
        if let Err(e) = &result {
            tracing::warn!(
                request_id = %exchange.request_id(),
                path = %exchange.context().path(),
                graceful = state.settings.graceful,
                error = %e,
                "JPEG processing failed"
            );
        }
        let (decision, body) = decide(result, payload, state.settings.graceful)?;
        state.advance(Phase::Pass)?;

        let mut head = state
            .head
            .take()
            .ok_or_else(|| FilterError::protocol(Phase::Process, "response header missing"))?;

        let output = OutputBuffer::new(body, decision, Arc::clone(&self.ledger));
        let bytes = output.bytes();
        exchange.slots_mut().insert(output);
        exchange.on_teardown(|slots| {
            slots.remove::<OutputBuffer>();
        });

        finalize_head(&mut head, bytes.len());
        tracing::info!(
            request_id = %exchange.request_id(),
            path = %exchange.context().path(),
            decision = decision.as_str(),
            input_len = input_len,
            output_len = bytes.len(),
            "JPEG body emitted"
        );

        next.header(exchange, head)?;
        self.pass(state, exchange, Some(Chunk::last(bytes)), next)
    }

    fn pass(
        &self,
        state: &mut RequestState,
        exchange: &mut Exchange,
        chunk: Option<Chunk>,
        next: &mut Next<'_>,
    ) -> Result<Outcome, FilterError> {
        state.advance(Phase::Pass)?;
        let last = chunk.as_ref().map(|c| c.last).unwrap_or(false);
        let outcome = next.body(exchange, chunk)?;
        if last {
            state.eos_sent = true;
            state.advance(Phase::Done)?;
        }
        Ok(outcome)
    }

    fn done(
        &self,
        state: &mut RequestState,
        exchange: &mut Exchange,
        chunk: Option<Chunk>,
        next: &mut Next<'_>,
    ) -> Result<Outcome, FilterError> {
        if let Some(chunk) = chunk.as_ref().filter(|c| !c.is_empty()) {
            return Err(FilterError::protocol(
                Phase::Done,
                format!("{} bytes after end of body", chunk.len()),
            ));
        }
        state.advance(Phase::Done)?;
        if state.eos_sent {
            return Ok(Outcome::Forwarded);
        }
        state.eos_sent = true;
        next.body(exchange, Some(Chunk::eos()))
    }
}

impl BodyFilter for JpegFilter {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn header(
        &self,
        exchange: &mut Exchange,
        head: ResponseHead,
        mut next: Next<'_>,
    ) -> Result<Outcome, FilterError> {
        let config = self.handle.load();
        let Some(settings) = config.settings_for(exchange.context().path()) else {
            return next.header(exchange, head);
        };

        if head.status == StatusCode::NOT_MODIFIED {
            return self.skip(exchange, settings, head, &mut next, "not modified");
        }
        if !settings.enabled {
            return self.skip(exchange, settings, head, &mut next, "disabled");
        }

        if let Some(content_type) = head.content_type() {
            if content_type
                .trim_start()
                .to_ascii_lowercase()
                .starts_with(MULTIPART_REPLACE)
            {
                tracing::error!(
                    request_id = %exchange.request_id(),
                    content_type = content_type,
                    "Multipart response on a JPEG route"
                );
                return Err(FilterError::MultipartResponse(content_type.to_string()));
            }
        }

        let capacity = match head.content_length() {
            Some(declared) if declared > settings.buffer_size as u64 => {
                if settings.graceful {
                    return self.skip(exchange, settings, head, &mut next, "declared length exceeds buffer");
                }
                tracing::warn!(
                    request_id = %exchange.request_id(),
                    declared = declared,
                    capacity = settings.buffer_size,
                    "Declared length exceeds buffer"
                );
                return Err(FilterError::CapacityExceeded {
                    attempted: usize::try_from(declared).unwrap_or(usize::MAX),
                    capacity: settings.buffer_size,
                });
            }
            Some(declared) => declared as usize,
            None => settings.buffer_size,
        };

        exchange
            .slots_mut()
            .insert(RequestState::engaged(settings, head, capacity));
        Ok(Outcome::Pending)
    }

    fn body(
        &self,
        exchange: &mut Exchange,
        chunk: Option<Chunk>,
        mut next: Next<'_>,
    ) -> Result<Outcome, FilterError> {
        let Some(mut state) = exchange.slots_mut().remove::<RequestState>() else {
            return next.body(exchange, chunk);
        };
        let result = self.step(&mut state, exchange, chunk, &mut next);
        exchange.slots_mut().insert(state);
        result
    }
}

impl std::fmt::Debug for JpegFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JpegFilter")
            .field("handle", &self.handle)
            .field("ledger", &self.ledger)
            .finish()
    }
}
