use std::path::{Path, PathBuf};

use afterglow_common::Color;
use afterglow_render::ImageBuffer;
use anyhow::Context;
use serde::Serialize;

/// Write `img` as an 8-bit RGBA PNG, top row first.
pub fn write_png(path: &Path, img: &ImageBuffer) -> anyhow::Result<()> {
    let (w, h) = img.size();
    let rgba = image::RgbaImage::from_raw(w, h, img.to_rgba8())
        .context("image buffer does not match its dimensions")?;
    rgba.save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), width = w, height = h, "image written");
    Ok(())
}

/// Opaque copy with `rgb` replaced by `alpha` over white.
pub fn flatten_on_white(img: &ImageBuffer) -> ImageBuffer {
    let (w, h) = img.size();
    let mut out = ImageBuffer::new(w, h, Color::WHITE);
    for y in 0..h {
        for x in 0..w {
            let c = img.texel(x, y);
            let shade = Color::WHITE.lerp(Color::from_rgb_vec3(c.rgb_vec3(), 1.0), c.a);
            out.set_texel(x, y, Color { a: 1.0, ..shade });
        }
    }
    out
}

/// Grey ramp of a signed field: black at `-size`, mid grey on the edge,
/// white at `+size`.
pub fn sdf_preview(field: &ImageBuffer, size: f32) -> ImageBuffer {
    let (w, h) = field.size();
    let scale = if size > 0.0 { size } else { 1.0 };
    let mut out = ImageBuffer::new(w, h, Color::BLACK);
    for y in 0..h {
        for x in 0..w {
            let v = (0.5 + 0.5 * field.texel(x, y).r / scale).clamp(0.0, 1.0);
            out.set_texel(x, y, Color::rgb(v, v, v));
        }
    }
    out
}

/// Summary of one run, written with `--report`.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub command: &'static str,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub elapsed_ms: f64,
    /// Command-specific figures.
    pub stats: serde_json::Value,
}

impl Report {
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize report")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_keeps_size_and_orientation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let mut img = ImageBuffer::new(3, 2, Color::BLACK);
        // Bottom-left texel.
        img.set_texel(0, 0, Color::WHITE);
        write_png(&path, &img).unwrap();

        let read = image::open(&path).unwrap().to_rgba8();
        assert_eq!(read.dimensions(), (3, 2));
        assert_eq!(read.get_pixel(0, 1).0, [255, 255, 255, 255]);
        assert_eq!(read.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn flattening_blends_toward_white() {
        let img = ImageBuffer::new(1, 1, Color::rgba(0.0, 0.0, 0.0, 0.25));
        let c = flatten_on_white(&img).texel(0, 0);
        assert!((c.r - 0.75).abs() < 1e-6);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn sdf_preview_maps_edge_to_grey() {
        let mut field = ImageBuffer::new(3, 1, Color::BLACK);
        field.set_texel(0, 0, Color::rgba(-4.0, 0.0, 0.0, 1.0));
        field.set_texel(2, 0, Color::rgba(8.0, 0.0, 0.0, 1.0));
        let img = sdf_preview(&field, 4.0);
        assert_eq!(img.texel(0, 0).r, 0.0);
        assert_eq!(img.texel(1, 0).r, 0.5);
        assert_eq!(img.texel(2, 0).r, 1.0);
    }

    #[test]
    fn report_is_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = Report {
            command: "shadows",
            output: dir.path().join("shadows.png"),
            width: 16,
            height: 16,
            elapsed_ms: 1.5,
            stats: serde_json::json!({ "frames": 4 }),
        };
        report.write(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["command"], "shadows");
        assert_eq!(value["stats"]["frames"], 4);
    }
}
