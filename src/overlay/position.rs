//! Anchor calculation for overlay placement.
//!
//! An overlay is placed by an alignment pair (vertical top/center/bottom,
//! horizontal left/center/right) and an offset pair (dy, dx). Alignment picks
//! the reference edge inside the free space `image - overlay`; the offset then
//! moves the overlay away from that edge (towards the middle for top/left and
//! bottom/right, downwards/rightwards for center). Each coordinate is floored
//! at 0.
//!
//! # Example
//!
//! ```
//! use jpeg_body_filter::overlay::position::{
//!     calculate_anchor, Alignment, HorizontalAlign, ImageDimensions, Offset, VerticalAlign,
//! };
//!
//! let image = ImageDimensions { width: 800, height: 600 };
//! let overlay = ImageDimensions { width: 100, height: 50 };
//! let align = Alignment { vertical: VerticalAlign::Bottom, horizontal: HorizontalAlign::Right };
//!
//! let pos = calculate_anchor(align, Offset { dy: 10, dx: 10 }, &image, &overlay);
//! assert_eq!((pos.x, pos.y), (690, 540)); // 800 - 100 - 10, 600 - 50 - 10
//! ```

use std::str::FromStr;

/// Dimensions of an image or overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Top-left corner of a placed overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPosition {
    pub x: u32,
    pub y: u32,
}

impl PlacementPosition {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalAlign {
    Top,
    #[default]
    Center,
    Bottom,
}

impl FromStr for VerticalAlign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(VerticalAlign::Top),
            "center" => Ok(VerticalAlign::Center),
            "bottom" => Ok(VerticalAlign::Bottom),
            other => Err(format!("invalid vertical alignment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HorizontalAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl FromStr for HorizontalAlign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(HorizontalAlign::Left),
            "center" => Ok(HorizontalAlign::Center),
            "right" => Ok(HorizontalAlign::Right),
            other => Err(format!("invalid horizontal alignment '{}'", other)),
        }
    }
}

/// Alignment pair; defaults to center/center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Alignment {
    pub vertical: VerticalAlign,
    pub horizontal: HorizontalAlign,
}

/// Offset pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Offset {
    pub dy: i64,
    pub dx: i64,
}

#[derive(Clone, Copy)]
enum Edge {
    Near,
    Middle,
    Far,
}

fn axis(edge: Edge, image: u32, overlay: u32, offset: i64) -> u32 {
    let space = image as i64 - overlay as i64;
    let pos = match edge {
        Edge::Near => offset,
        Edge::Middle => (space / 2).saturating_add(offset),
        Edge::Far => space.saturating_sub(offset),
    };
    pos.clamp(0, u32::MAX as i64) as u32
}

/// Calculate where the overlay's top-left corner lands on the image.
pub fn calculate_anchor(
    alignment: Alignment,
    offset: Offset,
    image: &ImageDimensions,
    overlay: &ImageDimensions,
) -> PlacementPosition {
    let vertical = match alignment.vertical {
        VerticalAlign::Top => Edge::Near,
        VerticalAlign::Center => Edge::Middle,
        VerticalAlign::Bottom => Edge::Far,
    };
    let horizontal = match alignment.horizontal {
        HorizontalAlign::Left => Edge::Near,
        HorizontalAlign::Center => Edge::Middle,
        HorizontalAlign::Right => Edge::Far,
    };

    PlacementPosition::new(
        axis(horizontal, image.width, overlay.width, offset.dx),
        axis(vertical, image.height, overlay.height, offset.dy),
    )
}
