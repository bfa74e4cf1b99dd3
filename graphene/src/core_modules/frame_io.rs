// Frame export: the extractor is an external process and only reads images
// from disk, so every triggering frame is written out as a PNG first.

use image::{ImageEncoder, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Writes an RGBA frame as PNG, replacing any previous file at `path`.
pub fn save_png(path: &Path, frame: &RgbaImage) -> Result<(), image::ImageError> {
    let output = BufWriter::new(File::create(path)?);
    let encoder = image::codecs::png::PngEncoder::new(output);
    encoder.write_image(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(())
}

/// Wraps a tightly packed RGBA buffer. Returns `None` when the length does not
/// match `width * height * 4`.
pub fn rgba_from_raw(width: u32, height: u32, buffer: Vec<u8>) -> Option<RgbaImage> {
    RgbaImage::from_raw(width, height, buffer)
}
