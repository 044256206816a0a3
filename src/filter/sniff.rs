//! Signature sniffing on the first body chunk.
//!
//! Only the first chunk is inspected. It must hold at least
//! [`SNIFF_LOOKAHEAD`] bytes; a shorter first chunk is reported as
//! unrecognized even if the payload is a JPEG split unluckily. That is a
//! known limitation: such responses pass through untouched.

use crate::constants::{JPEG_MAGIC, SNIFF_LOOKAHEAD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Jpeg,
    /// Fewer than the lookahead bytes were available
    TooShort,
    Unrecognized,
}

impl Signature {
    pub fn is_jpeg(&self) -> bool {
        matches!(self, Signature::Jpeg)
    }
}

pub fn sniff(first_chunk: &[u8]) -> Signature {
    if first_chunk.len() < SNIFF_LOOKAHEAD {
        return Signature::TooShort;
    }
    if first_chunk.starts_with(&JPEG_MAGIC) {
        Signature::Jpeg
    } else {
        Signature::Unrecognized
    }
}
