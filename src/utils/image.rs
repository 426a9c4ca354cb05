//! Image loading helpers.
//!
//! Every stage consumes 8-bit RGB images; these helpers decode any format the
//! `image` crate supports and convert it.

use crate::core::OCRError;
use crate::core::constants::DEFAULT_PARALLEL_THRESHOLD;
use image::RgbImage;
use rayon::prelude::*;
use std::path::Path;

/// Loads an image from a file path and converts it to RgbImage.
///
/// # Errors
///
/// Returns `OCRError::ImageLoad` if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> Result<RgbImage, OCRError> {
    Ok(image::open(path).map_err(OCRError::ImageLoad)?.to_rgb8())
}

/// Loads several images, in parallel above the default parallel threshold.
///
/// # Errors
///
/// Returns the first `OCRError::ImageLoad` encountered.
pub fn load_images<P: AsRef<Path> + Send + Sync>(paths: &[P]) -> Result<Vec<RgbImage>, OCRError> {
    if paths.len() > DEFAULT_PARALLEL_THRESHOLD {
        paths.par_iter().map(|p| load_image(p.as_ref())).collect()
    } else {
        paths.iter().map(|p| load_image(p.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_load_image_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.png");
        RgbImage::from_pixel(7, 3, Rgb([10, 20, 30])).save(&path).unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!(img.dimensions(), (7, 3));
        assert_eq!(img.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_grayscale_file_is_converted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(4, 2, image::Luma([90])).save(&path).unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!(img.get_pixel(3, 1), &Rgb([90, 90, 90]));
    }

    #[test]
    fn test_load_images_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (1..=6)
            .map(|w| {
                let path = dir.path().join(format!("{w}.png"));
                RgbImage::new(w, 2).save(&path).unwrap();
                path
            })
            .collect();
        let widths: Vec<u32> = load_images(&paths)
            .unwrap()
            .iter()
            .map(|img| img.width())
            .collect();
        assert_eq!(widths, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_missing_file_is_image_load_error() {
        let err = load_image(Path::new("/nonexistent/definitely/missing.png")).unwrap_err();
        assert!(matches!(err, OCRError::ImageLoad(_)));
    }
}
