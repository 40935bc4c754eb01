//! A raster RGBA8 preview of a graph, supplemented from the original's `NoiseImage` /
//! `RenderNoiseImage` (§4.11: "Supplemented from the original").

use crate::graph::{Graph, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Row-stride-aware RGBA8 raster. `stride` is always `width * 4` here; it is carried
/// explicitly (rather than recomputed) so callers writing directly into `pixels` match the
/// original's addressing convention.
#[derive(Debug, Clone)]
pub struct NoiseImage {
    width: u32,
    height: u32,
    stride: u32,
    pixels: Vec<Color>,
}

impl NoiseImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, stride: width * 4, pixels: vec![Color::default(); (width * height) as usize] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn row(&self, y: u32) -> &[Color] {
        let start = (y * self.width) as usize;
        &self.pixels[start..start + self.width as usize]
    }

    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let index = (y * self.width + x) as usize;
        self.pixels[index] = color;
    }

    pub fn memory_usage_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<Color>()
    }
}

/// Parameters for [`render_noise_image`]: samples `input` over a `width x height` grid with a
/// grid-space origin offset and a frequency multiplier, used by live-preview callers.
#[derive(Debug, Clone, Copy)]
pub struct NoiseImageDesc {
    pub width: u32,
    pub height: u32,
    pub x_offset: f64,
    pub y_offset: f64,
    pub freq_scale: f64,
}

impl Default for NoiseImageDesc {
    fn default() -> Self {
        Self { width: 256, height: 256, x_offset: 0.0, y_offset: 0.0, freq_scale: 1.0 }
    }
}

/// Maps a signed `[-1, 1]` noise value onto a grayscale RGBA8 pixel.
fn shade(value: f64) -> Color {
    let normalized = ((value * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8;
    Color { r: normalized, g: normalized, b: normalized, a: 255 }
}

pub fn render_noise_image(graph: &Graph, input: NodeId, desc: &NoiseImageDesc) -> NoiseImage {
    let mut image = NoiseImage::new(desc.width, desc.height);
    for y in 0..desc.height {
        for x in 0..desc.width {
            let gx = (x as f64 + desc.x_offset) * desc.freq_scale;
            let gy = (y as f64 + desc.y_offset) * desc.freq_scale;
            let value = graph.value(input, gx, gy);
            image.set(x, y, shade(value));
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    #[test]
    fn render_fills_every_pixel() {
        let mut graph = Graph::new();
        let root = graph.add(Node::Const(0.0));
        let image = render_noise_image(&graph, root, &NoiseImageDesc { width: 4, height: 4, ..Default::default() });
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 4);
        assert_eq!(image.get(0, 0), Color { r: 127, g: 127, b: 127, a: 255 });
    }
}
