//! Per-request processing phase.
//!
//! ```text
//! Start ──► Read ──► Process ──► Pass ──► Done
//!   │        ▲  │                 ▲
//!   │        └──┘                 │
//!   └─────────────────────────────┘  (not a JPEG / skipped)
//! ```
//!
//! `Read` loops on itself while chunks arrive; `Pass` loops while chunks are
//! forwarded; `Done` only accepts flushes. There are no backward edges.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for the first body chunk to sniff
    #[default]
    Start,
    /// Accumulating the payload
    Read,
    /// Transforming the complete payload
    Process,
    /// Forwarding whatever arrives, unchanged
    Pass,
    /// End of body forwarded
    Done,
}

impl Phase {
    /// The explicit transition table.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Start, Read)
                | (Start, Pass)
                | (Read, Read)
                | (Read, Process)
                | (Process, Pass)
                | (Pass, Pass)
                | (Pass, Done)
                | (Done, Done)
        )
    }

    /// `Pass` and `Done` never touch ingest or output state again.
    pub fn is_absorbing(self) -> bool {
        matches!(self, Phase::Pass | Phase::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Read => "read",
            Phase::Process => "process",
            Phase::Pass => "pass",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
