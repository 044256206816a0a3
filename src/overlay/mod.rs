//! Overlay (dropon) module for compositing a secondary image onto the
//! decoded payload.
//!
//! Overlays are configured per route as an ordered sequence of directives
//! inside the effect chain:
//!
//! ```yaml
//! effects:
//!   - type: dropon_align
//!     vertical: bottom
//!     horizontal: right
//!   - type: dropon_offset
//!     dy: "10"
//!     dx: "{{arg.margin}}"
//!   - type: dropon
//!     file: /etc/filter/logo.png
//!     mask: /etc/filter/logo-mask.png
//! ```
//!
//! Alignment and offset are resolved per request; the asset itself is loaded
//! once when the configuration is compiled.

pub mod asset;
pub mod compositor;
pub mod error;
pub mod position;

pub use asset::{BlendMode, OverlayAsset};
pub use compositor::composite;
pub use error::OverlayError;
pub use position::{
    calculate_anchor, Alignment, HorizontalAlign, ImageDimensions, Offset, PlacementPosition,
    VerticalAlign,
};
