use afterglow_common::Color;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Texel storage format of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetFormat {
    Rgba8Unorm,
    #[default]
    Rgba16Float,
    Rgba32Float,
    R32Float,
}

impl TargetFormat {
    pub fn bytes_per_texel(self) -> u64 {
        match self {
            Self::Rgba8Unorm | Self::R32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// Round a color to what the format can store.
    pub fn quantize(self, c: Color) -> Color {
        match self {
            Self::Rgba8Unorm => {
                let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() / 255.0;
                Color::rgba(q(c.r), q(c.g), q(c.b), q(c.a))
            }
            Self::R32Float => Color::rgba(c.r, 0.0, 0.0, 1.0),
            Self::Rgba16Float | Self::Rgba32Float => c,
        }
    }
}

/// Render target description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
    /// Attach a depth plane, cleared to 1.0.
    pub depth: bool,
}

impl TargetDesc {
    pub fn color(width: u32, height: u32, format: TargetFormat) -> Self {
        Self {
            width,
            height,
            format,
            depth: false,
        }
    }

    pub fn with_depth(mut self) -> Self {
        self.depth = true;
        self
    }

    /// Bytes a backend must reserve for this target.
    pub fn byte_size(&self) -> u64 {
        let texels = self.width as u64 * self.height as u64;
        let depth = if self.depth { 4 } else { 0 };
        texels * (self.format.bytes_per_texel() + depth)
    }
}

/// CPU-side image with optional depth.
///
/// Row 0 is the bottom row, so texel `(x, y)` sits at uv
/// `((x + 0.5) / w, (y + 0.5) / h)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
    depth: Option<Vec<f32>>,
}

impl ImageBuffer {
    pub fn new(width: u32, height: u32, fill: Color) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
            depth: None,
        }
    }

    pub fn with_depth(mut self) -> Self {
        self.depth = Some(vec![1.0; self.pixels.len()]);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn texel(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    pub fn set_texel(&mut self, x: u32, y: u32, c: Color) {
        let i = self.index(x, y);
        self.pixels[i] = c;
    }

    /// Depth at `(x, y)`, or None without a depth plane.
    pub fn depth(&self, x: u32, y: u32) -> Option<f32> {
        let i = self.index(x, y);
        self.depth.as_ref().map(|d| d[i])
    }

    pub fn set_depth(&mut self, x: u32, y: u32, z: f32) {
        let i = self.index(x, y);
        if let Some(d) = self.depth.as_mut() {
            d[i] = z;
        }
    }

    /// Fill every texel and reset depth to the far plane.
    pub fn fill(&mut self, c: Color) {
        self.pixels.fill(c);
        if let Some(d) = self.depth.as_mut() {
            d.fill(1.0);
        }
    }

    pub fn texel_center_uv(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }

    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn clamp_texel(&self, x: i64, y: i64) -> (u32, u32) {
        (
            x.clamp(0, self.width as i64 - 1) as u32,
            y.clamp(0, self.height as i64 - 1) as u32,
        )
    }

    fn nearest_texel(&self, uv: Vec2) -> (u32, u32) {
        self.clamp_texel(
            (uv.x * self.width as f32).floor() as i64,
            (uv.y * self.height as f32).floor() as i64,
        )
    }

    /// Nearest-neighbour lookup, clamped to the edge. Transparent black for
    /// an empty image.
    pub fn sample_nearest(&self, uv: Vec2) -> Color {
        if self.is_empty() {
            return Color::TRANSPARENT;
        }
        let (x, y) = self.nearest_texel(uv);
        self.texel(x, y)
    }

    /// Nearest-neighbour depth lookup; 1.0 without a depth plane.
    pub fn sample_depth(&self, uv: Vec2) -> f32 {
        if self.is_empty() {
            return 1.0;
        }
        let (x, y) = self.nearest_texel(uv);
        self.depth(x, y).unwrap_or(1.0)
    }

    /// Bilinear lookup, clamped to the edge.
    pub fn sample_bilinear(&self, uv: Vec2) -> Color {
        if self.is_empty() {
            return Color::TRANSPARENT;
        }
        let fx = uv.x * self.width as f32 - 0.5;
        let fy = uv.y * self.height as f32 - 0.5;
        let (x0, y0) = (fx.floor(), fy.floor());
        let (tx, ty) = (fx - x0, fy - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);
        let fetch = |x: i64, y: i64| {
            let (x, y) = self.clamp_texel(x, y);
            self.texel(x, y)
        };
        let bottom = fetch(x0, y0).lerp(fetch(x0 + 1, y0), tx);
        let top = fetch(x0, y0 + 1).lerp(fetch(x0 + 1, y0 + 1), tx);
        bottom.lerp(top, ty)
    }

    /// Mean of every texel.
    pub fn mean(&self) -> Color {
        if self.pixels.is_empty() {
            return Color::TRANSPARENT;
        }
        let n = self.pixels.len() as f32;
        let sum = self
            .pixels
            .iter()
            .fold(glam::Vec4::ZERO, |acc, c| acc + c.to_vec4());
        Color::from_vec4(sum / n)
    }

    /// Largest per-channel difference against another image of the same size.
    pub fn max_abs_diff(&self, other: &ImageBuffer) -> f32 {
        self.pixels
            .iter()
            .zip(&other.pixels)
            .map(|(a, b)| a.max_abs_diff(*b))
            .fold(0.0, f32::max)
    }

    /// Tightly packed 8-bit RGBA, top row first.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                let c = self.texel(x, y);
                out.extend_from_slice(&[to_byte(c.r), to_byte(c.g), to_byte(c.b), to_byte(c.a)]);
            }
        }
        out
    }
}
