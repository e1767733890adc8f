//! PNG encoding for finished tiles.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

/// Write an image as PNG at maximum compression.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let encoder = PngEncoder::new_with_quality(BufWriter::new(file), CompressionType::Best, FilterType::Adaptive);
    encoder
        .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)
        .with_context(|| format!("encoding {}", path.display()))?;
    Ok(())
}

pub fn load_png(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(image.into_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(2, 1, Rgba([10, 20, 30, 40]));

        save_png(&img, &path).unwrap();
        assert_eq!(load_png(&path).unwrap(), img);
        assert!(load_png(&dir.path().join("missing.png")).is_err());
    }
}
