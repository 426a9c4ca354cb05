use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate};

use super::DBPostProcess;

impl DBPostProcess {
    /// Dilates a binary bitmap with a 2×2 structuring element anchored at its
    /// bottom-right cell: a pixel turns on if it or its left, upper or
    /// upper-left neighbour is on.
    pub(super) fn dilate_mask(&self, bitmap: &GrayImage) -> GrayImage {
        let kernel = GrayImage::from_pixel(2, 2, Luma([255]));
        grayscale_dilate(bitmap, &Mask::from_image(&kernel, 1, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dilate_single_pixel_grows_down_right() {
        let post = DBPostProcess::default();
        let mut bitmap = GrayImage::new(4, 4);
        bitmap.put_pixel(1, 1, Luma([255]));
        let dilated = post.dilate_mask(&bitmap);
        let on: Vec<(u32, u32)> = dilated
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(on, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_dilate_empty_stays_empty() {
        let post = DBPostProcess::default();
        let dilated = post.dilate_mask(&GrayImage::new(3, 3));
        assert!(dilated.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_dilate_clips_at_border() {
        let post = DBPostProcess::default();
        let mut bitmap = GrayImage::new(3, 3);
        bitmap.put_pixel(2, 2, Luma([255]));
        let dilated = post.dilate_mask(&bitmap);
        let on = dilated.pixels().filter(|p| p[0] > 0).count();
        assert_eq!(on, 1);
        assert_eq!(dilated.get_pixel(2, 2)[0], 255);
    }
}
