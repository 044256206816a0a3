// JPEG body filter library
// Streaming transformation of JPEG response bodies inside a response filter chain

pub mod config;
pub mod constants;
pub mod error;
pub mod filter;
pub mod logging;
pub mod overlay;
pub mod pipeline; // Filter chain, exchange state, downstream sink
pub mod router;
pub mod transform;

pub use error::FilterError;
pub use filter::JpegFilter;
