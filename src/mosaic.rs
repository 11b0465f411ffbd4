//! Activation mosaics
//!
//! Renders the channels of the first example of an `[N, H, W, C]` activation
//! as a grid of `H x W` tiles, `round(sqrt(C))` tiles across, each tile
//! followed by a `gap`-pixel black border on its right and bottom. Values are
//! coloured against the minimum and maximum of the whole tensor.

use crate::error::{AlexNetError, Result};
use crate::tensor::Tensor;
use std::path::{Path, PathBuf};

/// Mapping from a normalized scalar to a colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorScale {
    Greyscale,
    /// Blue, cyan, green, yellow, red across five equal bands.
    #[default]
    Heatmap,
}

/// RGBA image, 4 bytes per pixel, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl MosaicImage {
    /// RGBA bytes of pixel (x, y).
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

fn to_byte(channel: f32) -> u8 {
    (channel * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Colour for `value` given the range `[min_value, max_value]`.
///
/// Non-finite values are red; an empty range (`max <= min`) is white.
pub fn visualization_color(value: f32, scale: ColorScale, min_value: f32, max_value: f32) -> [u8; 3] {
    if !value.is_finite() {
        return [255, 0, 0];
    }
    if max_value <= min_value {
        return [255, 255, 255];
    }
    let dv = max_value - min_value;

    match scale {
        ColorScale::Greyscale => {
            let grey = to_byte((value - min_value) / dv);
            [grey, grey, grey]
        }
        ColorScale::Heatmap => {
            let (red, green, blue) = if value < min_value + 0.2 * dv {
                (0.0, 0.0, 0.5 + 2.5 * (value - min_value) / dv)
            } else if value < min_value + 0.4 * dv {
                (0.0, 5.0 * (value - min_value - 0.2 * dv) / dv, 1.0)
            } else if value < min_value + 0.6 * dv {
                (0.0, 1.0, 1.0 + 5.0 * (min_value + 0.4 * dv - value) / dv)
            } else if value < min_value + 0.8 * dv {
                (5.0 * (value - min_value - 0.6 * dv) / dv, 1.0, 0.0)
            } else {
                (1.0, 1.0 + 5.0 * (min_value + 0.8 * dv - value) / dv, 0.0)
            };
            [to_byte(red), to_byte(green), to_byte(blue)]
        }
    }
}

/// Tiles across and down for `channels` tiles.
pub fn mosaic_grid(channels: usize) -> (usize, usize) {
    if channels == 0 {
        return (0, 0);
    }
    let across = ((channels as f64).sqrt().round() as usize).max(1);
    (across, channels.div_ceil(across))
}

/// Lay out every channel of example 0 of a rank-4 tensor as a mosaic.
pub fn render_mosaic(tensor: &Tensor, gap: usize, scale: ColorScale) -> Result<MosaicImage> {
    if tensor.rank() != 4 {
        return Err(AlexNetError::RankMismatch {
            expected: 4,
            actual: tensor.rank(),
        });
    }
    let (height, width, channels) = (tensor.shape()[1], tensor.shape()[2], tensor.shape()[3]);
    let (across, down) = mosaic_grid(channels);
    let image_width = width * across + across * gap;
    let image_height = height * down + down * gap;

    let mut pixels = vec![0u8; image_width * image_height * 4];
    for px in pixels.chunks_exact_mut(4) {
        px[3] = 255;
    }
    if tensor.shape()[0] == 0 {
        return Ok(MosaicImage {
            width: image_width,
            height: image_height,
            pixels,
        });
    }

    let min_value = tensor.min();
    let max_value = tensor.max();
    let first = &tensor.data()[..height * width * channels];

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let (tile_x, tile_y) = (c % across, c / across);
                let out_x = tile_x * (width + gap) + x;
                let out_y = tile_y * (height + gap) + y;
                let value = first[(y * width + x) * channels + c];
                let [r, g, b] = visualization_color(value, scale, min_value, max_value);
                let i = (out_y * image_width + out_x) * 4;
                pixels[i..i + 4].copy_from_slice(&[r, g, b, 255]);
            }
        }
    }

    Ok(MosaicImage {
        width: image_width,
        height: image_height,
        pixels,
    })
}

/// Render a heatmap mosaic and write it to `directory/{prefix}_output.png`.
pub fn save_mosaic_png(tensor: &Tensor, prefix: &str, directory: &Path, gap: usize) -> Result<PathBuf> {
    tracing::info!(
        layer = prefix,
        min = tensor.min(),
        max = tensor.max(),
        mean = tensor.mean(),
        "saving layer output"
    );

    let mosaic = render_mosaic(tensor, gap, ColorScale::Heatmap)?;
    let path = directory.join(format!("{prefix}_output.png"));
    let pixel_count = mosaic.pixels.len();
    let image = image::RgbaImage::from_raw(mosaic.width as u32, mosaic.height as u32, mosaic.pixels)
        .ok_or(AlexNetError::ShapeMismatch {
            expected: mosaic.width * mosaic.height * 4,
            actual: pixel_count,
        })?;
    image.save(&path).map_err(|source| AlexNetError::Image {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
