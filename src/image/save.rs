//! Image saving utilities.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};

use crate::error::{Error, Result};

/// Save an RGB image (format inferred from extension).
///
/// # Arguments
///
/// * `image` - Image to write
/// * `path` - Output file path
/// * `quality` - JPEG quality (1-100), ignored for other formats
///
/// # Errors
///
/// Returns an error if the image cannot be saved.
pub fn save_image<P: AsRef<Path>>(image: &RgbImage, path: P, quality: u8) -> Result<()> {
    write_image(DynamicImage::ImageRgb8(image.clone()), path.as_ref(), quality)
}

/// Save a single-channel mask image (format inferred from extension).
///
/// # Errors
///
/// Returns an error if the image cannot be saved.
pub fn save_mask<P: AsRef<Path>>(mask: &GrayImage, path: P, quality: u8) -> Result<()> {
    write_image(DynamicImage::ImageLuma8(mask.clone()), path.as_ref(), quality)
}

fn write_image(img: DynamicImage, path: &Path, quality: u8) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => {
            let mut output = BufWriter::new(File::create(path)?);
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            img.write_with_encoder(encoder)
                .map_err(|source| Error::ImageSave {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        _ => {
            img.save(path).map_err(|source| Error::ImageSave {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_save_png_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let img = RgbImage::from_pixel(16, 8, Rgb([200, 100, 50]));

        save_image(&img, &path, 95).unwrap();

        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back, img);
    }

    #[test]
    fn test_save_jpeg_respects_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.JPG");
        let img = RgbImage::from_pixel(16, 16, Rgb([128, 128, 128]));

        save_image(&img, &path, 90).unwrap();

        let format = image::ImageFormat::from_path(&path).unwrap();
        assert_eq!(format, image::ImageFormat::Jpeg);
        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (16, 16));
    }

    #[test]
    fn test_save_mask_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let mask = GrayImage::from_pixel(4, 3, Luma([255]));

        save_mask(&mask, &path, 95).unwrap();

        let back = image::open(&path).unwrap().to_luma8();
        assert_eq!(back, mask);
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("out.jpg");
        let img = RgbImage::new(2, 2);

        assert!(save_image(&img, &path, 95).is_err());
    }
}
