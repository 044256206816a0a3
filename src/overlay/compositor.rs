//! Overlay compositor.
//!
//! Blends an [`OverlayAsset`] onto the decoded base image at a precomputed
//! anchor. The base image is opaque (JPEG carries no alpha), so blending
//! reduces to a per-pixel linear mix weighted by the asset's blend mode and
//! opacity. Overlay pixels falling outside the base image are clipped.

use image::{Rgb, RgbImage, Rgba};

use super::asset::{BlendMode, OverlayAsset};
use super::position::PlacementPosition;

/// Blend `asset` onto `target` with its top-left corner at `position`.
pub fn composite(target: &mut RgbImage, asset: &OverlayAsset, position: PlacementPosition) {
    let overlay = asset.image();

    // Visible region, clamped to target bounds
    let x_end = (position.x as u64 + overlay.width() as u64).min(target.width() as u64) as u32;
    let y_end = (position.y as u64 + overlay.height() as u64).min(target.height() as u64) as u32;

    for ty in position.y..y_end {
        for tx in position.x..x_end {
            let ox = tx - position.x;
            let oy = ty - position.y;

            let weight = pixel_weight(asset, ox, oy);
            if weight <= 0.0 {
                continue;
            }

            let fg = overlay.get_pixel(ox, oy);
            let bg = *target.get_pixel(tx, ty);
            target.put_pixel(tx, ty, mix(bg, *fg, weight));
        }
    }
}

/// Weight of the overlay pixel at (x, y) in [0, 1].
fn pixel_weight(asset: &OverlayAsset, x: u32, y: u32) -> f32 {
    let coverage = match asset.blend() {
        BlendMode::Replace => 1.0,
        BlendMode::Alpha => asset.image().get_pixel(x, y)[3] as f32 / 255.0,
        BlendMode::Mask => asset
            .mask()
            .map(|mask| mask.get_pixel(x, y)[0] as f32 / 255.0)
            .unwrap_or(1.0),
    };
    (coverage * asset.opacity()).clamp(0.0, 1.0)
}

fn mix(background: Rgb<u8>, foreground: Rgba<u8>, weight: f32) -> Rgb<u8> {
    let channel = |fg: u8, bg: u8| -> u8 {
        let v = fg as f32 * weight + bg as f32 * (1.0 - weight);
        v.round().clamp(0.0, 255.0) as u8
    };

    Rgb([
        channel(foreground[0], background[0]),
        channel(foreground[1], background[1]),
        channel(foreground[2], background[2]),
    ])
}
