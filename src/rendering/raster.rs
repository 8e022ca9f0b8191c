//! Rasterizer: executes a display list onto an RGBA canvas

use super::paint::PaintCommand;
use super::RenderOptions;
use crate::fonts::FontManager;
use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};
use std::collections::HashMap;
use std::sync::Arc;

/// Paint `commands` at `options.scale` device pixels per logical pixel.
pub fn rasterize(
    commands: &[PaintCommand],
    images: &HashMap<String, Arc<RgbaImage>>,
    fonts: &FontManager,
    options: &RenderOptions,
) -> Result<RgbaImage> {
    let (width, height) = options.output_size()?;
    let scale = options.scale;
    let background = options.background.unwrap_or(Rgba([0, 0, 0, 0]));
    let mut canvas = RgbaImage::from_pixel(width, height, background);

    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect {
                x,
                y,
                width,
                height,
                rgba,
            } => {
                let color = Rgba([rgba.0, rgba.1, rgba.2, rgba.3]);
                fill_rect(&mut canvas, scale_rect(*x, *y, *width, *height, scale), color);
            }
            PaintCommand::Image {
                x,
                y,
                width,
                height,
                url,
            } => {
                let pixels = images.get(url).ok_or_else(|| {
                    Error::RenderFailed(format!("image {} missing from the layout", url))
                })?;
                let (dx, dy, dw, dh) = scale_rect(*x, *y, *width, *height, scale);
                draw_image(&mut canvas, pixels, dx, dy, dw, dh);
            }
            PaintCommand::Text {
                x,
                y,
                size,
                rgba,
                text,
            } => {
                let color = Rgba([rgba.0, rgba.1, rgba.2, rgba.3]);
                fonts.draw(
                    &mut canvas,
                    text,
                    *x as f32 * scale,
                    *y as f32 * scale,
                    size * scale,
                    color,
                );
            }
        }
    }

    Ok(canvas)
}

/// Logical rect to device pixels as (x, y, width, height).
fn scale_rect(x: i32, y: i32, width: u32, height: u32, scale: f32) -> (i64, i64, u32, u32) {
    let x0 = (x as f32 * scale).round() as i64;
    let y0 = (y as f32 * scale).round() as i64;
    let x1 = ((x as f32 + width as f32) * scale).round() as i64;
    let y1 = ((y as f32 + height as f32) * scale).round() as i64;
    let extent = |from: i64, to: i64| u32::try_from((to - from).max(0)).unwrap_or(u32::MAX);
    (x0, y0, extent(x0, x1), extent(y0, y1))
}

fn fill_rect(canvas: &mut RgbaImage, rect: (i64, i64, u32, u32), color: Rgba<u8>) {
    let (x, y, w, h) = rect;
    let (cw, ch) = canvas.dimensions();
    let x0 = x.clamp(0, cw as i64) as u32;
    let y0 = y.clamp(0, ch as i64) as u32;
    let x1 = (x + w as i64).clamp(0, cw as i64) as u32;
    let y1 = (y + h as i64).clamp(0, ch as i64) as u32;
    for py in y0..y1 {
        for px in x0..x1 {
            let pixel = canvas.get_pixel_mut(px, py);
            if color[3] == 255 {
                *pixel = color;
            } else {
                pixel.blend(&color);
            }
        }
    }
}

/// Draw `pixels` scaled into the box at (`x`, `y`). Only the part of the
/// box inside the canvas is resampled.
fn draw_image(canvas: &mut RgbaImage, pixels: &RgbaImage, x: i64, y: i64, width: u32, height: u32) {
    let (sw, sh) = pixels.dimensions();
    if width == 0 || height == 0 || sw == 0 || sh == 0 {
        return;
    }
    let (cw, ch) = canvas.dimensions();
    let vx0 = x.clamp(0, cw as i64);
    let vy0 = y.clamp(0, ch as i64);
    let vx1 = (x + width as i64).clamp(0, cw as i64);
    let vy1 = (y + height as i64).clamp(0, ch as i64);
    if vx0 >= vx1 || vy0 >= vy1 {
        return;
    }
    let (vw, vh) = ((vx1 - vx0) as u32, (vy1 - vy0) as u32);

    if (vw, vh) == (width, height) {
        if pixels.dimensions() == (width, height) {
            imageops::overlay(canvas, pixels, vx0, vy0);
        } else {
            let resized = imageops::resize(pixels, width, height, FilterType::Triangle);
            imageops::overlay(canvas, &resized, vx0, vy0);
        }
        return;
    }

    // Source span covering the visible device span, widened to whole pixels.
    let span = |v0: i64, v1: i64, origin: i64, dest: u32, src: u32| {
        let ratio = src as f64 / dest as f64;
        let s0 = (((v0 - origin) as f64 * ratio).floor() as u32).min(src - 1);
        let s1 = (((v1 - origin) as f64 * ratio).ceil() as u32).clamp(s0 + 1, src);
        (s0, s1 - s0)
    };
    let (cx, crop_w) = span(vx0, vx1, x, width, sw);
    let (cy, crop_h) = span(vy0, vy1, y, height, sh);
    let visible = imageops::crop_imm(pixels, cx, cy, crop_w, crop_h);
    let resized = imageops::resize(&*visible, vw, vh, FilterType::Triangle);
    imageops::overlay(canvas, &resized, vx0, vy0);
}
