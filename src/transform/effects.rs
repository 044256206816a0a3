//! Built-in pixel effects.
//!
//! Color effects work in JFIF YCbCr space: luminance effects shift Y, tint
//! effects shift Cb/Cr, grayscale drops chroma. Values are clamped to the
//! 8-bit range after conversion back to RGB.

use image::{Rgb, RgbImage};

const R_Y: f32 = 0.299;
const G_Y: f32 = 0.587;
const B_Y: f32 = 0.114;

#[derive(Debug, Clone, Copy, PartialEq)]
struct YCbCr {
    y: f32,
    cb: f32,
    cr: f32,
}

fn to_ycbcr(p: &Rgb<u8>) -> YCbCr {
    let (r, g, b) = (p[0] as f32, p[1] as f32, p[2] as f32);
    YCbCr {
        y: R_Y * r + G_Y * g + B_Y * b,
        cb: 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b,
        cr: 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b,
    }
}

fn to_rgb(c: YCbCr) -> Rgb<u8> {
    let y = c.y.clamp(0.0, 255.0);
    let cb = c.cb.clamp(0.0, 255.0) - 128.0;
    let cr = c.cr.clamp(0.0, 255.0) - 128.0;
    let channel = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    Rgb([
        channel(y + 1.402 * cr),
        channel(y - 0.344_136 * cb - 0.714_136 * cr),
        channel(y + 1.772 * cb),
    ])
}

fn map_ycbcr(image: &mut RgbImage, f: impl Fn(YCbCr) -> YCbCr) {
    for pixel in image.pixels_mut() {
        *pixel = to_rgb(f(to_ycbcr(pixel)));
    }
}

/// Drop all chroma information.
pub fn grayscale(image: &mut RgbImage) {
    for pixel in image.pixels_mut() {
        let y = to_ycbcr(pixel).y.round().clamp(0.0, 255.0) as u8;
        *pixel = Rgb([y, y, y]);
    }
}

/// Shift luminance by `delta` (negative darkens).
pub fn luminance(image: &mut RgbImage, delta: i32) {
    if delta == 0 {
        return;
    }
    let delta = delta as f32;
    map_ycbcr(image, |c| YCbCr {
        y: c.y + delta,
        ..c
    });
}

/// Shift the blue-difference and red-difference chroma channels.
pub fn chroma(image: &mut RgbImage, delta_cb: i32, delta_cr: i32) {
    if delta_cb == 0 && delta_cr == 0 {
        return;
    }
    let (dcb, dcr) = (delta_cb as f32, delta_cr as f32);
    map_ycbcr(image, |c| YCbCr {
        cb: c.cb + dcb,
        cr: c.cr + dcr,
        ..c
    });
}

/// Replace every `block`×`block` tile with its average color.
pub fn pixelate(image: &mut RgbImage, block: u32) {
    let block = block.max(1);
    let (width, height) = image.dimensions();

    for by in (0..height).step_by(block as usize) {
        for bx in (0..width).step_by(block as usize) {
            let x_end = (bx + block).min(width);
            let y_end = (by + block).min(height);

            let mut sum = [0u64; 3];
            let mut count = 0u64;
            for y in by..y_end {
                for x in bx..x_end {
                    let p = image.get_pixel(x, y);
                    sum[0] += p[0] as u64;
                    sum[1] += p[1] as u64;
                    sum[2] += p[2] as u64;
                    count += 1;
                }
            }

            let avg = Rgb([
                ((sum[0] + count / 2) / count) as u8,
                ((sum[1] + count / 2) / count) as u8,
                ((sum[2] + count / 2) / count) as u8,
            ]);
            for y in by..y_end {
                for x in bx..x_end {
                    image.put_pixel(x, y, avg);
                }
            }
        }
    }
}
