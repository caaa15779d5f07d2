//! Image loading utilities.

use std::path::Path;

use image::{GenericImageView, RgbImage};

use crate::error::{Error, Result};

/// Load an image from disk as an 8-bit RGB raster.
///
/// Images with an alpha channel or a single channel are converted to RGB.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let (width, height) = img.dimensions();
    tracing::debug!("Loaded {} ({width}x{height})", path.display());

    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, LumaA, Rgb};

    #[test]
    fn test_load_missing_file() {
        let err = load_image("definitely/not/here.png").unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
    }

    #[test]
    fn test_load_round_trip_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        RgbImage::from_pixel(7, 5, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.dimensions(), (7, 5));
        assert_eq!(loaded.get_pixel(3, 2), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_load_converts_gray_alpha_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        ImageBuffer::<LumaA<u8>, Vec<u8>>::from_pixel(4, 4, LumaA([90, 255]))
            .save(&path)
            .unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.get_pixel(0, 0), &Rgb([90, 90, 90]));
    }
}
